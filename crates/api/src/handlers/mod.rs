//! Request handlers.
//!
//! Handlers delegate to the pipeline services in [`AppState`](crate::state::AppState)
//! and map errors via [`AppError`](crate::error::AppError).

pub mod files;
pub mod receiver;
