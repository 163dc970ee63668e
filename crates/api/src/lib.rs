//! HTTP adapter for the print job queue.
//!
//! Thin axum layer over `parkprint_db::queue::QueueEngine`: producers
//! enqueue and inspect jobs, remote print agents poll for work and report
//! outcomes. All lifecycle rules live in the engine; handlers only
//! translate identities and HTTP shapes.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
