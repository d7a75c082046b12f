/// Default Bot API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

/// Bot credentials and endpoint.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token used for API calls and init-data verification.
    pub token: String,
    /// Shared secret the platform echoes in the webhook secret header.
    pub webhook_secret: String,
    pub api_base_url: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

impl BotConfig {
    /// Load bot configuration from environment variables.
    ///
    /// | Env Var            | Default                    |
    /// |--------------------|----------------------------|
    /// | `BOT_TOKEN`        | required                   |
    /// | `BOT_SECRET`       | required                   |
    /// | `BOT_API_BASE_URL` | `https://api.telegram.org` |
    pub fn from_env() -> Self {
        let token = std::env::var("BOT_TOKEN").expect("BOT_TOKEN must be set in the environment");
        assert!(!token.is_empty(), "BOT_TOKEN must not be empty");

        let webhook_secret =
            std::env::var("BOT_SECRET").expect("BOT_SECRET must be set in the environment");
        assert!(!webhook_secret.is_empty(), "BOT_SECRET must not be empty");

        let api_base_url = std::env::var("BOT_API_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_API_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        Self {
            token,
            webhook_secret,
            api_base_url,
        }
    }
}
