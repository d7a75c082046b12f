//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the pipeline, which
//! publishes, and background subscribers such as calendar sync.

use chrono::{DateTime, Utc};
use gigs_core::types::{ChatId, DbId, EpochMillis};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub const GIG_SUBMITTED: &str = "gig.submitted";
pub const GIG_PUBLISHED: &str = "gig.published";
pub const GIG_REJECTED: &str = "gig.rejected";

// ---------------------------------------------------------------------------
// GigEvent
// ---------------------------------------------------------------------------

/// Something that happened to a gig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GigEvent {
    /// Dot-separated event name, e.g. `"gig.published"`.
    pub event_type: String,

    pub gig_id: Option<DbId>,

    /// Platform user that triggered the event (moderator or submitter).
    pub actor_user_id: Option<ChatId>,

    /// Event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl GigEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            gig_id: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_gig(mut self, gig_id: DbId) -> Self {
        self.gig_id = Some(gig_id);
        self
    }

    pub fn with_actor(mut self, user_id: ChatId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// `gig.published` carrying the published listing.
    pub fn published(gig_id: DbId, gig: &PublishedGig) -> Self {
        Self::new(GIG_PUBLISHED)
            .with_gig(gig_id)
            .with_payload(serde_json::to_value(gig).unwrap_or_default())
    }

    /// Decode the payload of a `gig.published` event.
    pub fn published_gig(&self) -> Option<PublishedGig> {
        if self.event_type != GIG_PUBLISHED {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Listing data carried by `gig.published`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedGig {
    pub public_id: String,
    pub title: String,
    pub date_ms: EpochMillis,
    pub end_date_ms: Option<EpochMillis>,
    pub venue: String,
    pub city: String,
    pub country: String,
    pub tickets_url: String,
    pub post_link: Option<String>,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out event bus.
pub struct EventBus {
    sender: broadcast::Sender<GigEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped when nobody listens.
    pub fn publish(&self, event: GigEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GigEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
