//! Gig moderation pipeline: records and their state machine, poster
//! ingestion, moderation messaging, callback handling and submission
//! intake.

pub mod callbacks;
pub mod commands;
pub mod config;
pub mod error;
pub mod fetch;
pub mod intake;
pub mod messenger;
pub mod moderators;
pub mod poster;
pub mod records;
pub mod services;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod updates;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use intake::{Submission, SubmissionPipeline, Submitter};
pub use services::{ServiceDeps, Services};
