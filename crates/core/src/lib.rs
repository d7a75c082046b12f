//! Domain logic for the gig moderation service.
//!
//! Nothing in this crate performs I/O; it is shared by the database,
//! pipeline, worker and API crates.

pub mod cache;
pub mod callback;
pub mod env;
pub mod error;
pub mod gig;
pub mod hashing;
pub mod init_data;
pub mod job;
pub mod poster;
pub mod public_id;
pub mod types;
