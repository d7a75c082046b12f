//! Object storage for poster bytes.
//!
//! [`ObjectStore`] is the capability the pipeline and the poster proxy use.
//! [`S3Store`] talks to any S3-compatible service; [`MemoryStore`] keeps
//! objects in process and backs tests and local runs without a bucket.

pub mod config;
pub mod memory;
pub mod s3;
pub mod store;

use std::sync::Arc;

pub use config::StorageConfig;
pub use memory::MemoryStore;
pub use s3::S3Store;
pub use store::{ObjectStore, ObjectStoreError, StoredObject};

/// Build the configured store: S3 when a bucket is set, memory otherwise.
pub async fn build_store(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match &config.bucket {
        Some(bucket) => {
            tracing::info!(bucket = %bucket, endpoint = ?config.endpoint, "Using S3 object store");
            Arc::new(S3Store::connect(config, bucket).await)
        }
        None => {
            tracing::warn!("S3_BUCKET is not set, posters are kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    }
}
