//! Routing of verified webhook updates. Nothing here returns an error: the
//! webhook must acknowledge every delivery.

use std::sync::Arc;

use gigs_telegram::types::{Update, UpdateKind};
use gigs_telegram::ChatPlatform;

use crate::callbacks::CallbackRouter;
use crate::commands;

pub struct UpdateDispatcher {
    callbacks: Arc<CallbackRouter>,
    platform: Arc<dyn ChatPlatform>,
}

impl UpdateDispatcher {
    pub fn new(callbacks: Arc<CallbackRouter>, platform: Arc<dyn ChatPlatform>) -> Self {
        Self {
            callbacks,
            platform,
        }
    }

    pub async fn dispatch(&self, update: &Update) {
        match update.kind() {
            UpdateKind::CallbackQuery(query) => {
                self.callbacks.handle(query).await;
            }
            UpdateKind::Message(message) => {
                let Some(reply) = commands::reply_for(message) else {
                    return;
                };
                if let Err(e) = self.platform.send_message(&reply).await {
                    tracing::warn!(chat_id = reply.chat_id, error = %e, "Command reply failed");
                }
            }
            UpdateKind::Other => {
                tracing::debug!(update_id = update.update_id, "Ignoring update");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, PlatformCall};

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn commands_get_replies_and_callbacks_get_answers() {
        let harness = Harness::new();
        let updates = &harness.services.updates;

        updates
            .dispatch(&update(
                r#"{"update_id": 1, "message": {"message_id": 1, "chat": {"id": 9, "type": "private"}, "text": "/start"}}"#,
            ))
            .await;
        updates
            .dispatch(&update(
                r#"{"update_id": 2, "callback_query": {"id": "cb", "from": {"id": 77, "first_name": "Mod"}, "data": "status:pending"}}"#,
            ))
            .await;
        updates.dispatch(&update(r#"{"update_id": 3}"#)).await;

        let calls = harness.platform.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], PlatformCall::SendMessage(m) if m.chat_id == 9));
        assert!(matches!(&calls[1], PlatformCall::AnswerCallback(a) if a.callback_query_id == "cb"));
    }
}
