pub mod agent;
pub mod auth;
