use std::time::Duration;

use gigs_core::env::{env_bool, env_opt};
use gigs_core::types::ChatId;

const DEFAULT_MODERATORS_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_POSTER_DOWNLOAD_TIMEOUT_SECS: u64 = 15;

/// Moderation pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chat where pending gigs wait for a decision.
    pub moderation_chat_id: ChatId,
    /// Public channel approved gigs are published to.
    pub main_chat_id: ChatId,
    /// Public site the gig title links to.
    pub app_base_url: Option<String>,
    /// Absolute base URL the poster proxy is reachable under.
    pub api_base_url: Option<String>,
    /// Serve a gig's external poster URL when its stored object is missing.
    pub external_poster_fallback: bool,
    pub moderators_cache_ttl: Duration,
    pub poster_download_timeout: Duration,
}

impl PipelineConfig {
    /// Config with the given chats and defaults for everything else.
    pub fn new(moderation_chat_id: ChatId, main_chat_id: ChatId) -> Self {
        Self {
            moderation_chat_id,
            main_chat_id,
            app_base_url: None,
            api_base_url: None,
            external_poster_fallback: true,
            moderators_cache_ttl: Duration::from_secs(DEFAULT_MODERATORS_CACHE_TTL_SECS),
            poster_download_timeout: Duration::from_secs(DEFAULT_POSTER_DOWNLOAD_TIMEOUT_SECS),
        }
    }

    /// Load pipeline configuration from environment variables.
    ///
    /// | Env Var                        | Default    |
    /// |--------------------------------|------------|
    /// | `DRAFT_CHANNEL_ID`             | (required) |
    /// | `MAIN_CHANNEL_ID`              | (required) |
    /// | `APP_BASE_URL`                 | unset      |
    /// | `APP_API_BASE_URL`             | unset      |
    /// | `EXTERNAL_POSTER_FALLBACK`     | `true`     |
    /// | `MODERATORS_CACHE_TTL_SECS`    | `60`       |
    /// | `POSTER_DOWNLOAD_TIMEOUT_SECS` | `15`       |
    pub fn from_env() -> Self {
        let moderation_chat_id: ChatId = std::env::var("DRAFT_CHANNEL_ID")
            .expect("DRAFT_CHANNEL_ID must be set")
            .parse()
            .expect("DRAFT_CHANNEL_ID must be a numeric chat id");

        let main_chat_id: ChatId = std::env::var("MAIN_CHANNEL_ID")
            .expect("MAIN_CHANNEL_ID must be set")
            .parse()
            .expect("MAIN_CHANNEL_ID must be a numeric chat id");

        let moderators_cache_ttl_secs: u64 = std::env::var("MODERATORS_CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_MODERATORS_CACHE_TTL_SECS.to_string())
            .parse()
            .expect("MODERATORS_CACHE_TTL_SECS must be a valid u64");

        let poster_download_timeout_secs: u64 = std::env::var("POSTER_DOWNLOAD_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_POSTER_DOWNLOAD_TIMEOUT_SECS.to_string())
            .parse()
            .expect("POSTER_DOWNLOAD_TIMEOUT_SECS must be a valid u64");

        Self {
            moderation_chat_id,
            main_chat_id,
            app_base_url: env_opt("APP_BASE_URL"),
            api_base_url: env_opt("APP_API_BASE_URL"),
            external_poster_fallback: env_bool("EXTERNAL_POSTER_FALLBACK", true),
            moderators_cache_ttl: Duration::from_secs(moderators_cache_ttl_secs),
            poster_download_timeout: Duration::from_secs(poster_download_timeout_secs),
        }
    }
}
