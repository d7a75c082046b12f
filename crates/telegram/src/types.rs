//! Bot API wire types.
//!
//! Only the fields the moderation flow reads are modelled; unknown fields
//! are ignored on deserialization.

use gigs_core::types::ChatId;
use serde::{Deserialize, Serialize};

/// An inbound webhook update.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// The part of an update the service acts on.
#[derive(Debug, Clone, Copy)]
pub enum UpdateKind<'a> {
    Message(&'a Message),
    CallbackQuery(&'a CallbackQuery),
    /// Edited messages, channel posts and everything else.
    Other,
}

impl Update {
    pub fn kind(&self) -> UpdateKind<'_> {
        if let Some(query) = &self.callback_query {
            UpdateKind::CallbackQuery(query)
        } else if let Some(message) = &self.message {
            UpdateKind::Message(message)
        } else {
            UpdateKind::Other
        }
    }

    /// The user who triggered the update.
    pub fn actor(&self) -> Option<&User> {
        match self.kind() {
            UpdateKind::CallbackQuery(query) => Some(&query.from),
            UpdateKind::Message(message) => message.from.as_ref(),
            UpdateKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct User {
    pub id: ChatId,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Chat {
    pub id: ChatId,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

// ---------------------------------------------------------------------------
// Keyboards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// A keyboard with a single row.
    pub fn row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }

    /// A keyboard with no buttons; sending it clears existing buttons.
    pub fn empty() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Html => "HTML",
        }
    }
}

/// Text (or caption) to send to a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub parse_mode: Option<ParseMode>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
        }
    }

    pub fn html(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some(ParseMode::Html),
            ..Self::text(chat_id, text)
        }
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

/// How a photo is handed to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoInput {
    /// A file the platform already hosts.
    FileId(String),
    /// A URL the platform fetches itself.
    Url(String),
    /// Bytes uploaded as multipart.
    Upload {
        bytes: Vec<u8>,
        filename: String,
        content_type: String,
    },
}

impl PhotoInput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileId(_) => "file_id",
            Self::Url(_) => "url",
            Self::Upload { .. } => "upload",
        }
    }
}

/// Answer to a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    pub callback_query_id: String,
    pub text: Option<String>,
    pub show_alert: bool,
}

impl CallbackAnswer {
    pub fn notice(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            callback_query_id: id.into(),
            text: Some(text.into()),
            show_alert: false,
        }
    }

    pub fn alert(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            show_alert: true,
            ..Self::notice(id, text)
        }
    }
}
