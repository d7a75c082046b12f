//! Replies to bot commands sent to the webhook.

use gigs_telegram::types::{Message, OutgoingMessage};

pub const GREETING: &str = "Hi! I collect gig suggestions and pass them to the moderators. \
Use the app to suggest a gig.";
pub const UNKNOWN_COMMAND: &str = "I don't know that command";

/// Reply for a command message; plain text gets none.
pub fn reply_for(message: &Message) -> Option<OutgoingMessage> {
    let text = message.text.as_deref()?.trim();
    let command = text.strip_prefix('/')?.split_whitespace().next()?;
    // `/start@SomeBot` in group chats.
    let command = command.split('@').next().unwrap_or(command);

    let reply = match command {
        "start" => GREETING,
        _ => UNKNOWN_COMMAND,
    };
    Some(OutgoingMessage::text(message.chat.id, reply))
}
