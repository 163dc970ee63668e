pub mod job_event;
pub mod print_job;
pub mod status;
