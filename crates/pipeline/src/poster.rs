//! Poster ingestion and the read side of the public poster proxy.
//!
//! A poster arrives as uploaded bytes, a remote URL, or an already stored
//! object (queued jobs). Remote URLs are deduplicated by source: when a gig
//! already stored a download of the same URL its object is reused and
//! nothing is fetched.

use std::sync::Arc;

use base64::Engine;
use gigs_cloud::{ObjectStore, ObjectStoreError};
use gigs_core::error::CoreError;
use gigs_core::gig::{validate_http_url, GigFields, PosterAsset};
use gigs_core::poster::{
    essence, extension_for, is_image_content_type, poster_key, validate_storage_key,
    PosterKeyParts,
};
use gigs_core::types::EpochMillis;

use crate::error::PipelineError;
use crate::fetch::{FetchError, FetchedPoster, PosterFetcher};
use crate::store::GigStore;

/// `Cache-Control` max-age for stored objects.
pub const STORED_MAX_AGE_SECS: u32 = 3600;
/// `Cache-Control` max-age for the external fallback.
pub const FALLBACK_MAX_AGE_SECS: u32 = 300;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Where a submitted poster comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosterSource {
    Upload {
        bytes: Vec<u8>,
        filename: Option<String>,
        content_type: String,
    },
    Url(String),
    /// Resolved earlier by whoever enqueued the job.
    Stored {
        bucket_path: Option<String>,
        external_url: Option<String>,
    },
}

impl PosterSource {
    /// Poster named by loosely-typed fields: an inline `posterFile` data URL
    /// wins over `posterUrl`.
    pub fn from_fields(fields: &GigFields) -> Result<Option<Self>, CoreError> {
        if let Some(raw) = non_empty(&fields.poster_file) {
            return decode_data_url(raw).map(Some);
        }
        Ok(non_empty(&fields.poster_url).map(|url| Self::Url(url.to_string())))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Decode `data:image/<type>;base64,<payload>` into an upload.
pub fn decode_data_url(raw: &str) -> Result<PosterSource, CoreError> {
    let invalid = || CoreError::Validation("posterFile must be a base64 image data URL".to_string());

    let rest = raw.trim().strip_prefix("data:").ok_or_else(invalid)?;
    let (meta, payload) = rest.split_once(',').ok_or_else(invalid)?;
    let content_type = meta.strip_suffix(";base64").ok_or_else(invalid)?;
    if !is_image_content_type(content_type) {
        return Err(CoreError::Validation("posterFile must be an image".to_string()));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid())?;
    if bytes.is_empty() {
        return Err(invalid());
    }

    Ok(PosterSource::Upload {
        bytes,
        filename: None,
        content_type: essence(content_type),
    })
}

/// Gig fields the storage key is derived from.
#[derive(Debug, Clone, Copy)]
pub struct PosterContext<'a> {
    pub date_ms: EpochMillis,
    pub country: &'a str,
    pub city: &'a str,
    pub public_id: &'a str,
}

/// Poster bytes ready to be served by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedPoster {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub max_age_secs: u32,
}

pub struct PosterIngestion {
    objects: Arc<dyn ObjectStore>,
    gigs: Arc<dyn GigStore>,
    fetcher: Arc<dyn PosterFetcher>,
    prefix: String,
    external_fallback: bool,
}

impl PosterIngestion {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        gigs: Arc<dyn GigStore>,
        fetcher: Arc<dyn PosterFetcher>,
        prefix: impl Into<String>,
        external_fallback: bool,
    ) -> Self {
        Self {
            objects,
            gigs,
            fetcher,
            prefix: prefix.into(),
            external_fallback,
        }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Resolve `source` into a stored poster.
    ///
    /// Download and validation failures are [`CoreError::Validation`];
    /// storage failures propagate unchanged so the submission fails as a
    /// whole.
    pub async fn ingest(
        &self,
        source: PosterSource,
        ctx: PosterContext<'_>,
    ) -> Result<Option<PosterAsset>, PipelineError> {
        match source {
            PosterSource::Upload {
                bytes,
                filename,
                content_type,
            } => {
                if !is_image_content_type(&content_type) {
                    return Err(CoreError::Validation("Poster must be an image".to_string()).into());
                }
                if bytes.is_empty() {
                    return Err(CoreError::Validation("Poster file is empty".to_string()).into());
                }
                let key = self
                    .store_bytes(bytes, filename.as_deref(), &content_type, ctx)
                    .await?;
                Ok(Some(PosterAsset {
                    bucket_path: Some(key),
                    external_url: None,
                    file_id: None,
                }))
            }
            PosterSource::Url(url) => self.ingest_url(&url, ctx).await.map(Some),
            PosterSource::Stored {
                bucket_path: Some(bucket_path),
                external_url,
            } => {
                validate_storage_key(&bucket_path)?;
                Ok(Some(PosterAsset {
                    bucket_path: Some(bucket_path),
                    external_url,
                    file_id: None,
                }))
            }
            PosterSource::Stored {
                bucket_path: None,
                external_url: Some(url),
            } => self.ingest_url(&url, ctx).await.map(Some),
            PosterSource::Stored {
                bucket_path: None,
                external_url: None,
            } => Ok(None),
        }
    }

    async fn ingest_url(
        &self,
        raw_url: &str,
        ctx: PosterContext<'_>,
    ) -> Result<PosterAsset, PipelineError> {
        let url = validate_http_url(raw_url, "posterUrl")?;

        if let Some(existing) = self.gigs.find_by_external_poster_url(&url).await? {
            if let Some(bucket_path) = existing.poster_bucket_path {
                tracing::debug!(url = %url, key = %bucket_path, "Reusing stored poster");
                return Ok(PosterAsset {
                    bucket_path: Some(bucket_path),
                    external_url: Some(url),
                    file_id: None,
                });
            }
        }

        let FetchedPoster {
            bytes,
            content_type,
            filename,
        } = self.fetcher.fetch(&url).await.map_err(|e| match e {
            FetchError::NotAnImage(_) => {
                CoreError::Validation("posterUrl must point to an image".to_string())
            }
            other => CoreError::Validation(format!("Failed to download poster: {other}")),
        })?;

        let key = self
            .store_bytes(bytes, filename.as_deref(), &content_type, ctx)
            .await?;
        Ok(PosterAsset {
            bucket_path: Some(key),
            external_url: Some(url),
            file_id: None,
        })
    }

    async fn store_bytes(
        &self,
        bytes: Vec<u8>,
        filename: Option<&str>,
        content_type: &str,
        ctx: PosterContext<'_>,
    ) -> Result<String, PipelineError> {
        let extension = extension_for(filename, content_type);
        let key = poster_key(PosterKeyParts {
            prefix: &self.prefix,
            date_ms: ctx.date_ms,
            country: ctx.country,
            city: ctx.city,
            public_id: ctx.public_id,
            extension: &extension,
            content: &bytes,
        })?;
        let size = bytes.len();
        self.objects.put(&key, bytes, &essence(content_type)).await?;
        tracing::info!(key = %key, size, "Poster stored");
        Ok(key)
    }

    /// Bytes for the public proxy. `None` means 404.
    pub async fn open(&self, key: &str) -> Result<Option<ServedPoster>, PipelineError> {
        let key = key.trim_start_matches('/');
        if validate_storage_key(key).is_err() || !key.starts_with(&format!("{}/", self.prefix)) {
            return Ok(None);
        }

        match self.objects.get(key).await {
            Ok(object) => Ok(Some(ServedPoster {
                bytes: object.bytes,
                content_type: object
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                max_age_secs: STORED_MAX_AGE_SECS,
            })),
            Err(ObjectStoreError::NotFound(_)) if self.external_fallback => {
                self.open_external(key).await
            }
            Err(ObjectStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Serve the source URL of the gig that owns the missing object.
    async fn open_external(&self, key: &str) -> Result<Option<ServedPoster>, PipelineError> {
        let Some(url) = self
            .gigs
            .find_by_poster_bucket_path(key)
            .await?
            .and_then(|gig| gig.poster_external_url)
        else {
            return Ok(None);
        };

        match self.fetcher.fetch(&url).await {
            Ok(fetched) => {
                tracing::info!(key, url = %url, "Serving poster from external source");
                Ok(Some(ServedPoster {
                    bytes: fetched.bytes,
                    content_type: fetched.content_type,
                    max_age_secs: FALLBACK_MAX_AGE_SECS,
                }))
            }
            Err(e) => {
                tracing::warn!(key, url = %url, error = %e, "External poster fallback failed");
                Ok(None)
            }
        }
    }
}
