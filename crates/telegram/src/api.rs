//! HTTP client for the Bot API.
//!
//! Every method is a `POST {base}/bot{token}/{method}`. Responses share the
//! `{"ok", "result", "error_code", "description"}` envelope whatever the HTTP
//! status, so errors are read from the body rather than the status line.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use gigs_core::types::ChatId;

use crate::config::BotConfig;
use crate::types::{
    CallbackAnswer, InlineKeyboardMarkup, Message, OutgoingMessage, PhotoInput,
};

/// Errors from the Bot API layer.
#[derive(Debug, thiserror::Error)]
pub enum BotApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The platform answered `ok: false`.
    #[error("Bot API error ({code}): {description}")]
    Api { code: i64, description: String },
}

impl BotApiError {
    fn description_contains(&self, needle: &str) -> bool {
        match self {
            Self::Api { description, .. } => description.to_ascii_lowercase().contains(needle),
            Self::Request(_) => false,
        }
    }

    /// The platform could not fetch a photo URL we handed it.
    pub fn is_unfetchable_url(&self) -> bool {
        matches!(self, Self::Api { code: 400, .. })
            && (self.description_contains("wrong type of the web page content")
                || self.description_contains("failed to get http url content")
                || self.description_contains("wrong file identifier/http url specified"))
    }

    /// An edit that would leave the message unchanged.
    pub fn is_not_modified(&self) -> bool {
        self.description_contains("message is not modified")
    }

    /// The target message no longer exists or cannot be edited.
    pub fn is_message_gone(&self) -> bool {
        self.description_contains("message to edit not found")
            || self.description_contains("message can't be edited")
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

/// HTTP client for one bot.
pub struct BotApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl BotApi {
    pub fn new(config: &BotConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, config: &BotConfig) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    pub async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, BotApiError> {
        let mut body = serde_json::json!({
            "chat_id": message.chat_id,
            "text": message.text,
        });
        Self::apply_formatting(&mut body, message);
        self.call_json("sendMessage", &body).await
    }

    /// Send a photo with `message.text` as its caption.
    pub async fn send_photo(
        &self,
        message: &OutgoingMessage,
        photo: &PhotoInput,
    ) -> Result<Message, BotApiError> {
        match photo {
            PhotoInput::FileId(reference) | PhotoInput::Url(reference) => {
                let mut body = serde_json::json!({
                    "chat_id": message.chat_id,
                    "photo": reference,
                    "caption": message.text,
                });
                Self::apply_formatting(&mut body, message);
                self.call_json("sendPhoto", &body).await
            }
            PhotoInput::Upload {
                bytes,
                filename,
                content_type,
            } => {
                let part = Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(content_type)?;
                let mut form = Form::new()
                    .text("chat_id", message.chat_id.to_string())
                    .text("caption", message.text.clone())
                    .part("photo", part);
                if let Some(mode) = message.parse_mode {
                    form = form.text("parse_mode", mode.as_str());
                }
                if let Some(markup) = &message.reply_markup {
                    let encoded = serde_json::to_string(markup).map_err(|e| BotApiError::Api {
                        code: 0,
                        description: format!("Failed to encode reply markup: {e}"),
                    })?;
                    form = form.text("reply_markup", encoded);
                }
                let response = self
                    .client
                    .post(self.method_url("sendPhoto"))
                    .multipart(form)
                    .send()
                    .await?;
                Self::parse_response(response).await
            }
        }
    }

    pub async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), BotApiError> {
        let mut body = serde_json::json!({
            "callback_query_id": answer.callback_query_id,
            "show_alert": answer.show_alert,
        });
        if let Some(text) = &answer.text {
            body["text"] = serde_json::Value::String(text.clone());
        }
        let _: bool = self.call_json("answerCallbackQuery", &body).await?;
        Ok(())
    }

    /// Replace a message's inline keyboard. `None` removes it.
    pub async fn edit_message_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), BotApiError> {
        let markup = markup.cloned().unwrap_or_default();
        let body = serde_json::json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "reply_markup": markup,
        });
        let _: serde_json::Value = self.call_json("editMessageReplyMarkup", &body).await?;
        Ok(())
    }

    // ---- private helpers ----

    fn apply_formatting(body: &mut serde_json::Value, message: &OutgoingMessage) {
        if let Some(mode) = message.parse_mode {
            body["parse_mode"] = serde_json::Value::String(mode.as_str().to_string());
        }
        if let Some(markup) = &message.reply_markup {
            body["reply_markup"] = serde_json::to_value(markup).unwrap_or_default();
        }
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, BotApiError> {
        tracing::debug!(method, "Calling Bot API");
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Decode the response envelope into its `result`.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BotApiError> {
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<ApiResponse<T>>(&text) {
            Ok(ApiResponse {
                ok: true,
                result: Some(result),
                ..
            }) => Ok(result),
            Ok(envelope) => Err(BotApiError::Api {
                code: envelope.error_code.unwrap_or(i64::from(status.as_u16())),
                description: envelope
                    .description
                    .unwrap_or_else(|| "missing result".to_string()),
            }),
            Err(_) => Err(BotApiError::Api {
                code: i64::from(status.as_u16()),
                description: text,
            }),
        }
    }
}
