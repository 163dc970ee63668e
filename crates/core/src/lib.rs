//! Domain logic for the print job queue.
//!
//! This crate has zero internal dependencies so the db layer, the API, and
//! any future CLI tooling can all share the state machine and error
//! taxonomy without pulling in sqlx or axum.

pub mod error;
pub mod print_queue;
pub mod types;
