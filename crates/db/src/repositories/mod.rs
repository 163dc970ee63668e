mod job_event_repo;
mod print_job_repo;

pub use job_event_repo::JobEventRepo;
pub use print_job_repo::PrintJobRepo;
