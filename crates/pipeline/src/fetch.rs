//! Downloading remote posters.

use std::time::Duration;

use async_trait::async_trait;
use gigs_core::poster::{essence, filename_from_url, is_image_content_type};

/// A downloaded poster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPoster {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Last path segment of the source URL, when it has one.
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("download timed out")]
    Timeout,

    #[error("remote server answered HTTP {0}")]
    HttpStatus(u16),

    #[error("content type '{0}' is not an image")]
    NotAnImage(String),

    #[error("request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait PosterFetcher: Send + Sync {
    /// Download `url`, refusing anything that is not an image.
    async fn fetch(&self, url: &str) -> Result<FetchedPoster, FetchError>;
}

/// [`PosterFetcher`] over HTTP with a bounded timeout.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl PosterFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPoster, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let response = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(essence)
            .unwrap_or_default();
        if !is_image_content_type(&content_type) {
            return Err(FetchError::NotAnImage(content_type));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Request(e.to_string())
            }
        })?;
        tracing::debug!(url, size = bytes.len(), content_type = %content_type, "Poster downloaded");

        Ok(FetchedPoster {
            bytes: bytes.to_vec(),
            content_type,
            filename: filename_from_url(url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn refuses_non_http_urls() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1));
        assert_matches!(fetcher.fetch("ftp://x.test/p.jpg").await, Err(FetchError::InvalidUrl(_)));
        assert_matches!(fetcher.fetch("not a url").await, Err(FetchError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_request_error() {
        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let result = fetcher.fetch("http://127.0.0.1:9/p.jpg").await;
        assert_matches!(result, Err(FetchError::Request(_) | FetchError::Timeout));
    }
}
