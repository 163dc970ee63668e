pub mod print_agent;
pub mod print_jobs;
