//! Route tree.
//!
//! ```text
//! /health                                  service health
//!
//! /v1/receiver/webhook                     platform updates (always 200)
//! /v1/receiver/gig                         gig submission
//!
//! /public/files-proxy/{*key}               stored poster bytes
//! ```

pub mod health;
pub mod public;
pub mod receiver;
