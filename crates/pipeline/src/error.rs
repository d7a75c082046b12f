use gigs_cloud::ObjectStoreError;
use gigs_core::error::CoreError;
use gigs_telegram::BotApiError;

use crate::store::StoreError;

/// Errors surfaced by the orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Object storage error: {0}")]
    Storage(#[from] ObjectStoreError),

    #[error("Chat platform error: {0}")]
    Platform(#[from] BotApiError),
}

impl PipelineError {
    /// Caller-facing failures (bad input, missing gig, refused transition).
    /// Everything else is infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Core(
                CoreError::NotFound { .. }
                    | CoreError::Validation(_)
                    | CoreError::Conflict(_)
                    | CoreError::Unauthorized(_)
                    | CoreError::Forbidden(_)
            )
        )
    }
}
