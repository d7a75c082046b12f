//! Chat platform integration: Bot API wire types, HTTP client and the
//! [`ChatPlatform`] capability the moderation pipeline talks to.

pub mod api;
pub mod config;
pub mod photo;
pub mod platform;
pub mod types;

pub use api::{BotApi, BotApiError};
pub use config::BotConfig;
pub use platform::ChatPlatform;
