use gigs_core::env::{env_bool, env_opt};
use gigs_core::poster::{normalize_prefix, DEFAULT_POSTERS_PREFIX};

/// Object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    /// Bucket name; `None` selects the in-memory store.
    pub bucket: Option<String>,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Normalised key prefix for poster objects.
    pub posters_prefix: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("posters_prefix", &self.posters_prefix)
            .finish_non_exhaustive()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: "us-east-1".to_string(),
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
            posters_prefix: DEFAULT_POSTERS_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    /// Load storage configuration from environment variables.
    ///
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `S3_BUCKET`            | unset       |
    /// | `S3_REGION`            | `us-east-1` |
    /// | `S3_ENDPOINT`          | unset       |
    /// | `S3_FORCE_PATH_STYLE`  | `false`     |
    /// | `S3_ACCESS_KEY_ID`     | unset       |
    /// | `S3_SECRET_ACCESS_KEY` | unset       |
    /// | `S3_POSTERS_PREFIX`    | `gigs`      |
    pub fn from_env() -> Self {
        let posters_prefix = normalize_prefix(
            &std::env::var("S3_POSTERS_PREFIX").unwrap_or_else(|_| DEFAULT_POSTERS_PREFIX.into()),
        )
        .unwrap_or_else(|e| panic!("S3_POSTERS_PREFIX is invalid: {e}"));

        Self {
            bucket: env_opt("S3_BUCKET"),
            region: env_opt("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            endpoint: env_opt("S3_ENDPOINT"),
            force_path_style: env_bool("S3_FORCE_PATH_STYLE", false),
            access_key_id: env_opt("S3_ACCESS_KEY_ID"),
            secret_access_key: env_opt("S3_SECRET_ACCESS_KEY"),
            posters_prefix,
        }
    }
}
