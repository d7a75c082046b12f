//! Moderator button presses.
//!
//! | data          | effect                                              | answer        |
//! |---------------|-----------------------------------------------------|---------------|
//! | `approve:<id>`| Pending → Approved → publish → Published            | `Done!`       |
//! | `reject:<id>` | Pending → Rejected, terminal marker on the message  | `Done!`       |
//! | `rejected:<id>`| none                                               | notice        |
//! | `status:<s>`  | none                                                | `Status is s` |
//! | anything else | none                                                | alert         |
//!
//! Every query gets exactly one answer, including when handling fails.
//!
//! A gig left `Approved` by a failed publish is published by the next
//! approve press. The post is recorded before the status moves, so a post
//! that already went out is never sent twice.

use std::sync::Arc;

use gigs_core::callback::CallbackAction;
use gigs_core::gig::{GigStatus, MessageRef, PostRef};
use gigs_core::types::{ChatId, DbId};
use gigs_db::models::gig::Gig;
use gigs_events::bus::{EventBus, GigEvent, PublishedGig, GIG_REJECTED};
use gigs_telegram::types::{CallbackAnswer, CallbackQuery};

use crate::error::PipelineError;
use crate::messenger::ModerationMessenger;
use crate::records::{GigRecords, TransitionOutcome};

pub const DONE: &str = "Done!";
pub const NO_REJECTED_ACTION: &str = "There's no action for Rejected yet.";
const GENERIC_FAILURE: &str = "Something went wrong, please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Reply {
    Notice(String),
    Alert(String),
}

impl Reply {
    fn notice(text: impl Into<String>) -> Self {
        Self::Notice(text.into())
    }

    fn alert(text: impl Into<String>) -> Self {
        Self::Alert(text.into())
    }

    fn into_answer(self, query_id: &str) -> CallbackAnswer {
        match self {
            Self::Notice(text) => CallbackAnswer::notice(query_id, text),
            Self::Alert(text) => CallbackAnswer::alert(query_id, text),
        }
    }
}

/// Listing data for `gig.published`.
pub fn published_listing(gig: &Gig, post: &PostRef) -> PublishedGig {
    PublishedGig {
        public_id: gig.public_id.clone(),
        title: gig.title.clone(),
        date_ms: gig.date_ms,
        end_date_ms: gig.end_date_ms,
        venue: gig.venue.clone(),
        city: gig.city.clone(),
        country: gig.country.clone(),
        tickets_url: gig.tickets_url.clone(),
        post_link: post.link(),
    }
}

pub struct CallbackRouter {
    records: GigRecords,
    messenger: Arc<ModerationMessenger>,
    bus: Arc<EventBus>,
}

impl CallbackRouter {
    pub fn new(records: GigRecords, messenger: Arc<ModerationMessenger>, bus: Arc<EventBus>) -> Self {
        Self {
            records,
            messenger,
            bus,
        }
    }

    /// Handle `query` and answer it. Returns the answer that was sent.
    pub async fn handle(&self, query: &CallbackQuery) -> CallbackAnswer {
        let reply = match self.dispatch(query).await {
            Ok(reply) => reply,
            Err(e) if e.is_client_error() => {
                tracing::warn!(query_id = %query.id, data = ?query.data, error = %e, "Callback refused");
                Reply::alert(e.to_string())
            }
            Err(e) => {
                tracing::error!(query_id = %query.id, data = ?query.data, error = %e, "Callback failed");
                Reply::alert(GENERIC_FAILURE)
            }
        };

        let answer = reply.into_answer(&query.id);
        if let Err(e) = self.messenger.platform().answer_callback_query(&answer).await {
            tracing::warn!(query_id = %query.id, error = %e, "Failed to answer callback query");
        }
        answer
    }

    async fn dispatch(&self, query: &CallbackQuery) -> Result<Reply, PipelineError> {
        let data = query.data.as_deref().unwrap_or_default();
        let source = query.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat.id,
            message_id: m.message_id,
        });
        let actor = query.from.id;

        match CallbackAction::parse(data)? {
            CallbackAction::Approve(id) => self.approve(id, source, actor).await,
            CallbackAction::Reject(id) => self.reject(id, source, actor).await,
            CallbackAction::Rejected(_) => Ok(Reply::notice(NO_REJECTED_ACTION)),
            CallbackAction::Status(status) => Ok(Reply::notice(format!("Status is {status}"))),
            CallbackAction::Unknown { action, .. } => {
                tracing::warn!(action = %action, "Unknown callback action");
                Ok(Reply::alert(format!("Unknown action '{action}'")))
            }
        }
    }

    async fn approve(
        &self,
        id: DbId,
        source: Option<MessageRef>,
        actor: ChatId,
    ) -> Result<Reply, PipelineError> {
        match self.records.find(id).await?.status() {
            GigStatus::Published => return Ok(Reply::notice("Already published")),
            GigStatus::Rejected => return Ok(Reply::alert("This gig was rejected")),
            _ => {}
        }

        let approved = match self.records.transition(id, GigStatus::Approved).await? {
            TransitionOutcome::Applied(gig) => gig,
            TransitionOutcome::AlreadyInState(gig) => {
                tracing::info!(
                    gig_id = id,
                    has_post = gig.post().is_some(),
                    "Resuming publish of approved gig"
                );
                gig
            }
        };

        let post = match approved.post() {
            Some(post) => post,
            None => match self.messenger.publish_main(&approved).await {
                Ok(post) => {
                    self.records.record_post(id, &post).await?;
                    post
                }
                Err(e) => {
                    tracing::error!(gig_id = id, error = %e, "Publishing failed, gig stays approved");
                    return Ok(Reply::alert(
                        "Publishing failed, the gig stays approved. Press approve to retry.",
                    ));
                }
            },
        };

        let published = self
            .records
            .transition(id, GigStatus::Published)
            .await?
            .into_gig();
        self.messenger
            .handle_post_publish(&published, source, &post)
            .await;

        self.bus.publish(
            GigEvent::published(id, &published_listing(&published, &post)).with_actor(actor),
        );
        Ok(Reply::notice(DONE))
    }

    async fn reject(
        &self,
        id: DbId,
        source: Option<MessageRef>,
        actor: ChatId,
    ) -> Result<Reply, PipelineError> {
        match self.records.transition(id, GigStatus::Rejected).await? {
            TransitionOutcome::Applied(gig) => {
                self.messenger.handle_post_reject(&gig, source).await;
                self.bus
                    .publish(GigEvent::new(GIG_REJECTED).with_gig(id).with_actor(actor));
                Ok(Reply::notice(DONE))
            }
            TransitionOutcome::AlreadyInState(gig) => {
                self.messenger.handle_post_reject(&gig, source).await;
                Ok(Reply::notice("Already rejected"))
            }
        }
    }
}
