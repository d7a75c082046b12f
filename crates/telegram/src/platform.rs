//! The outbound capabilities the moderation pipeline needs from a chat
//! platform. [`BotApi`] is the production implementation; tests substitute
//! a recording fake.

use async_trait::async_trait;
use gigs_core::types::ChatId;

use crate::api::{BotApi, BotApiError};
use crate::types::{CallbackAnswer, InlineKeyboardMarkup, Message, OutgoingMessage, PhotoInput};

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, BotApiError>;

    async fn send_photo(
        &self,
        message: &OutgoingMessage,
        photo: &PhotoInput,
    ) -> Result<Message, BotApiError>;

    async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), BotApiError>;

    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), BotApiError>;
}

#[async_trait]
impl ChatPlatform for BotApi {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<Message, BotApiError> {
        BotApi::send_message(self, message).await
    }

    async fn send_photo(
        &self,
        message: &OutgoingMessage,
        photo: &PhotoInput,
    ) -> Result<Message, BotApiError> {
        BotApi::send_photo(self, message, photo).await
    }

    async fn answer_callback_query(&self, answer: &CallbackAnswer) -> Result<(), BotApiError> {
        BotApi::answer_callback_query(self, answer).await
    }

    async fn edit_reply_markup(
        &self,
        chat_id: ChatId,
        message_id: i64,
        markup: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), BotApiError> {
        self.edit_message_reply_markup(chat_id, message_id, markup).await
    }
}
