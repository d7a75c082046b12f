//! Outbound messages tied to a gig's lifecycle.
//!
//! Photos go out by preference: platform file id, then the public proxy
//! URL of the stored bytes, then the original external URL. When the
//! platform refuses to fetch a URL the bytes are uploaded instead, and when
//! that fails too the message goes out as text so the notification is
//! never lost.

use std::sync::Arc;

use gigs_cloud::ObjectStore;
use gigs_core::callback::CallbackAction;
use gigs_core::gig::{format_date_range, GigStatus, MessageRef, PostRef};
use gigs_core::poster::{public_proxy_url, FALLBACK_EXTENSION};
use gigs_core::types::ChatId;
use gigs_db::models::gig::Gig;
use gigs_telegram::photo::biggest_photo_file_id;
use gigs_telegram::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, Message, OutgoingMessage, PhotoInput,
};
use gigs_telegram::{BotApiError, ChatPlatform};

use crate::config::PipelineConfig;
use crate::fetch::PosterFetcher;

/// Escape text for HTML parse mode.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Label shown on a status button.
pub fn status_marker(status: GigStatus) -> String {
    let icon = match status {
        GigStatus::New => "🆕",
        GigStatus::Pending => "⏳",
        GigStatus::Approved => "👍",
        GigStatus::Published => "✅",
        GigStatus::Rejected => "❌",
    };
    format!("{icon} {}", status.label())
}

fn status_button(status: GigStatus) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(status_marker(status), CallbackAction::status(status).encode())
}

/// Approve / Reject buttons for a pending gig.
pub fn moderation_keyboard(gig_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::row(vec![
        InlineKeyboardButton::callback("✅ Approve", CallbackAction::Approve(gig_id).encode()),
        InlineKeyboardButton::callback("❌ Reject", CallbackAction::Reject(gig_id).encode()),
    ])
}

pub struct ModerationMessenger {
    platform: Arc<dyn ChatPlatform>,
    objects: Arc<dyn ObjectStore>,
    fetcher: Arc<dyn PosterFetcher>,
    config: PipelineConfig,
}

impl ModerationMessenger {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        objects: Arc<dyn ObjectStore>,
        fetcher: Arc<dyn PosterFetcher>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            platform,
            objects,
            fetcher,
            config,
        }
    }

    pub fn platform(&self) -> &Arc<dyn ChatPlatform> {
        &self.platform
    }

    pub fn moderation_chat_id(&self) -> ChatId {
        self.config.moderation_chat_id
    }

    /// Gig card: linked title, dates, venue and tickets.
    pub fn compose(&self, gig: &Gig) -> String {
        let title = escape_html(&gig.title);
        let heading = match &self.config.app_base_url {
            Some(url) => format!("<a href=\"{}\">{title}</a>", escape_html(url)),
            None => format!("<b>{title}</b>"),
        };
        format!(
            "{heading}\n\n🗓 {}\n📍 {}, {}\n\n🎫 {}",
            format_date_range(gig.date_ms, gig.end_date_ms),
            escape_html(&gig.venue),
            escape_html(&gig.city),
            escape_html(&gig.tickets_url),
        )
    }

    /// Best available photo for `gig`.
    pub async fn poster_input(&self, gig: &Gig) -> Option<PhotoInput> {
        if let Some(file_id) = &gig.poster_file_id {
            return Some(PhotoInput::FileId(file_id.clone()));
        }
        if let Some(key) = &gig.poster_bucket_path {
            let proxied = self
                .config
                .api_base_url
                .as_deref()
                .and_then(|base| public_proxy_url(base, key));
            if let Some(url) = proxied {
                return Some(PhotoInput::Url(url));
            }
        }
        if let Some(url) = &gig.poster_external_url {
            return Some(PhotoInput::Url(url.clone()));
        }
        // Stored bytes with no public URL to hand out.
        match &gig.poster_bucket_path {
            Some(_) => self.upload_from_store(gig).await,
            None => None,
        }
    }

    async fn upload_from_store(&self, gig: &Gig) -> Option<PhotoInput> {
        let key = gig.poster_bucket_path.as_deref()?;
        match self.objects.get(key).await {
            Ok(object) => Some(PhotoInput::Upload {
                bytes: object.bytes,
                filename: key
                    .rsplit('/')
                    .next()
                    .filter(|name| !name.is_empty())
                    .map_or_else(|| default_filename(gig), str::to_string),
                content_type: object
                    .content_type
                    .unwrap_or_else(|| "image/jpeg".to_string()),
            }),
            Err(e) => {
                tracing::warn!(gig_id = gig.id, key, error = %e, "Stored poster unreadable");
                None
            }
        }
    }

    /// Bytes to upload when the platform refused to fetch `url` itself.
    async fn download_for_upload(&self, gig: &Gig, url: &str) -> Option<PhotoInput> {
        if gig.poster_bucket_path.is_some() {
            if let Some(upload) = self.upload_from_store(gig).await {
                return Some(upload);
            }
        }
        match self.fetcher.fetch(url).await {
            Ok(fetched) => Some(PhotoInput::Upload {
                bytes: fetched.bytes,
                filename: fetched.filename.unwrap_or_else(|| default_filename(gig)),
                content_type: fetched.content_type,
            }),
            Err(e) => {
                tracing::warn!(gig_id = gig.id, url, error = %e, "Poster download for upload failed");
                None
            }
        }
    }

    /// Send `message` with the gig's poster, degrading to upload and then
    /// to text only.
    pub async fn send_with_fallback(
        &self,
        message: &OutgoingMessage,
        gig: &Gig,
    ) -> Result<Message, BotApiError> {
        let Some(photo) = self.poster_input(gig).await else {
            return self.platform.send_message(message).await;
        };

        let err = match self.platform.send_photo(message, &photo).await {
            Ok(sent) => return Ok(sent),
            Err(e) => e,
        };

        let PhotoInput::Url(url) = &photo else {
            tracing::warn!(gig_id = gig.id, kind = photo.kind(), error = %err, "Photo send failed, sending text");
            return self.send_text_only(message, gig, err).await;
        };
        if !err.is_unfetchable_url() {
            tracing::warn!(gig_id = gig.id, url = %url, error = %err, "Photo send failed, sending text");
            return self.send_text_only(message, gig, err).await;
        }

        tracing::info!(gig_id = gig.id, url = %url, "Platform could not fetch poster, uploading bytes");
        let Some(upload) = self.download_for_upload(gig, url).await else {
            return self.send_text_only(message, gig, err).await;
        };
        match self.platform.send_photo(message, &upload).await {
            Ok(sent) => Ok(sent),
            Err(upload_err) => {
                tracing::warn!(gig_id = gig.id, error = %upload_err, "Poster upload failed, sending text");
                self.send_text_only(message, gig, upload_err).await
            }
        }
    }

    async fn send_text_only(
        &self,
        message: &OutgoingMessage,
        gig: &Gig,
        cause: BotApiError,
    ) -> Result<Message, BotApiError> {
        self.platform.send_message(message).await.inspect_err(|e| {
            tracing::error!(gig_id = gig.id, error = %e, cause = %cause, "Text fallback failed");
        })
    }

    /// Post the gig with Approve / Reject buttons to the moderation chat.
    pub async fn send_to_moderation(&self, gig: &Gig) -> Result<Message, BotApiError> {
        let message = OutgoingMessage::html(self.config.moderation_chat_id, self.compose(gig))
            .with_markup(moderation_keyboard(gig.id));
        let sent = self.send_with_fallback(&message, gig).await?;
        tracing::info!(gig_id = gig.id, message_id = sent.message_id, "Gig sent to moderation");
        Ok(sent)
    }

    /// Publish the gig to the main channel.
    pub async fn publish_main(&self, gig: &Gig) -> Result<PostRef, BotApiError> {
        let message = OutgoingMessage::html(self.config.main_chat_id, self.compose(gig));
        let sent = self.send_with_fallback(&message, gig).await?;
        tracing::info!(gig_id = gig.id, message_id = sent.message_id, "Gig published");
        Ok(PostRef {
            message_id: sent.message_id,
            chat_id: sent.chat.id,
            file_id: sent
                .photo
                .as_deref()
                .and_then(biggest_photo_file_id)
                .map(str::to_string),
        })
    }

    /// DM the submitter a copy of the card with a label-only status button.
    ///
    /// Never sent into the moderation chat. Failures are logged and
    /// swallowed; the platform refuses DMs to users who never started the
    /// bot.
    pub async fn send_submission_feedback(
        &self,
        gig: &Gig,
        submitter_chat_id: ChatId,
    ) -> Option<MessageRef> {
        if submitter_chat_id == self.config.moderation_chat_id {
            return None;
        }
        let text = format!(
            "🙏 Thanks! Your gig is waiting for moderation.\n\n{}",
            self.compose(gig)
        );
        let message = OutgoingMessage::html(submitter_chat_id, text)
            .with_markup(InlineKeyboardMarkup::row(vec![status_button(GigStatus::Pending)]));
        match self.platform.send_message(&message).await {
            Ok(sent) => Some(MessageRef {
                chat_id: sent.chat.id,
                message_id: sent.message_id,
            }),
            Err(e) => {
                tracing::warn!(gig_id = gig.id, chat_id = submitter_chat_id, error = %e, "Submission feedback not delivered");
                None
            }
        }
    }

    /// Clear the moderation buttons and point the submitter at the post.
    pub async fn handle_post_publish(
        &self,
        gig: &Gig,
        moderation: Option<MessageRef>,
        post: &PostRef,
    ) {
        if let Some(target) = moderation.or_else(|| gig.moderation_message()) {
            self.edit_markup(gig, target, InlineKeyboardMarkup::empty()).await;
        }
        if let Some(feedback) = gig.feedback_message() {
            let button = match post.link() {
                Some(link) => InlineKeyboardButton::link("👀 View post", link),
                None => status_button(GigStatus::Published),
            };
            self.edit_markup(gig, feedback, InlineKeyboardMarkup::row(vec![button]))
                .await;
        }
    }

    /// Replace the moderation buttons with a terminal marker and tell the
    /// submitter.
    pub async fn handle_post_reject(&self, gig: &Gig, moderation: Option<MessageRef>) {
        if let Some(target) = moderation.or_else(|| gig.moderation_message()) {
            let marker = InlineKeyboardMarkup::row(vec![InlineKeyboardButton::callback(
                status_marker(GigStatus::Rejected),
                CallbackAction::Rejected(gig.id).encode(),
            )]);
            self.edit_markup(gig, target, marker).await;
        }
        if let Some(feedback) = gig.feedback_message() {
            self.edit_markup(
                gig,
                feedback,
                InlineKeyboardMarkup::row(vec![status_button(GigStatus::Rejected)]),
            )
            .await;
        }
    }

    /// Edit a keyboard. Unchanged or vanished messages count as done.
    async fn edit_markup(&self, gig: &Gig, target: MessageRef, markup: InlineKeyboardMarkup) {
        match self
            .platform
            .edit_reply_markup(target.chat_id, target.message_id, Some(&markup))
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_not_modified() || e.is_message_gone() => {
                tracing::debug!(gig_id = gig.id, message_id = target.message_id, "Keyboard already up to date");
            }
            Err(e) => {
                tracing::warn!(
                    gig_id = gig.id,
                    chat_id = target.chat_id,
                    message_id = target.message_id,
                    error = %e,
                    "Failed to edit keyboard"
                );
            }
        }
    }
}

fn default_filename(gig: &Gig) -> String {
    format!("poster{}.{FALLBACK_EXTENSION}", gig.id)
}
