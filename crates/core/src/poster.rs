//! Poster storage key rules.
//!
//! Keys are deterministic in the poster bytes:
//! `<prefix>/<year>/<country>/<city>/<public-id>-<digest>.<ext>`. The digest
//! keeps two different posters apart when their public ids collide before
//! either gig is saved.

use crate::error::CoreError;
use crate::gig::year_of;
use crate::hashing::short_digest;
use crate::public_id::slugify;
use crate::types::EpochMillis;

/// Default key prefix for poster objects.
pub const DEFAULT_POSTERS_PREFIX: &str = "gigs";

/// Extension used when neither filename nor content type gives one.
pub const FALLBACK_EXTENSION: &str = "jpg";

/// Longest filename extension taken verbatim.
const MAX_EXTENSION_LEN: usize = 5;

/// Longest filename derived from a URL.
const MAX_FILENAME_LEN: usize = 200;

/// Route prefix of the public poster proxy.
pub const PROXY_ROUTE: &str = "public/files-proxy";

pub fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

/// Strip parameters (`; charset=...`) and normalise case.
pub fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match essence(content_type).as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

/// Pick the object extension from the filename, then the content type.
pub fn extension_for(filename: Option<&str>, content_type: &str) -> String {
    let from_name = filename
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        });

    match from_name {
        Some(ext) if ext == "jpeg" => "jpg".to_string(),
        Some(ext) => ext,
        None => extension_for_content_type(content_type)
            .unwrap_or(FALLBACK_EXTENSION)
            .to_string(),
    }
}

/// Normalise a configured prefix: trims slashes, rejects traversal.
pub fn normalize_prefix(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Ok(DEFAULT_POSTERS_PREFIX.to_string());
    }
    if trimmed.split('/').any(|seg| seg.is_empty() || seg == "..") {
        return Err(CoreError::Validation(format!(
            "Invalid posters prefix '{raw}'"
        )));
    }
    Ok(trimmed.to_string())
}

/// Reject empty keys and keys containing `..`.
pub fn validate_storage_key(key: &str) -> Result<(), CoreError> {
    let key = key.trim();
    if key.is_empty() || key.trim_matches('/').is_empty() {
        return Err(CoreError::Validation("Storage key is empty".to_string()));
    }
    if key.contains("..") {
        return Err(CoreError::Validation(format!(
            "Storage key '{key}' is not allowed"
        )));
    }
    Ok(())
}

/// Inputs for a deterministic poster key.
#[derive(Debug, Clone, Copy)]
pub struct PosterKeyParts<'a> {
    pub prefix: &'a str,
    pub date_ms: EpochMillis,
    pub country: &'a str,
    pub city: &'a str,
    pub public_id: &'a str,
    pub extension: &'a str,
    /// Poster bytes; only their digest enters the key.
    pub content: &'a [u8],
}

pub fn poster_key(parts: PosterKeyParts<'_>) -> Result<String, CoreError> {
    let city = slugify(parts.city);
    let city = if city.is_empty() { "unknown" } else { &city };
    let country = parts.country.trim().to_ascii_lowercase();
    let country = if country.is_empty() { "xx" } else { &country };
    let public_id = parts.public_id.trim();
    if public_id.is_empty() {
        return Err(CoreError::Validation("Poster key needs a public id".to_string()));
    }

    let key = format!(
        "{}/{}/{country}/{city}/{public_id}-{}.{}",
        parts.prefix.trim_matches('/'),
        year_of(parts.date_ms),
        short_digest(parts.content),
        parts.extension
    );
    validate_storage_key(&key)?;
    Ok(key)
}

/// Last path segment of a URL, percent-decoded and length-capped.
pub fn filename_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let decoded: String = url::form_urlencoded::parse(format!("n={last}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())?;
    let decoded = decoded.trim();
    if decoded.is_empty() {
        return None;
    }
    Some(decoded.chars().take(MAX_FILENAME_LEN).collect())
}

/// Absolute proxy URL for a stored key, encoding each path segment.
pub fn public_proxy_url(api_base_url: &str, key: &str) -> Option<String> {
    let mut url = url::Url::parse(api_base_url).ok()?;
    {
        let mut segments = url.path_segments_mut().ok()?;
        segments.pop_if_empty();
        for seg in PROXY_ROUTE.split('/') {
            segments.push(seg);
        }
        for seg in key.split('/').filter(|s| !s.is_empty()) {
            segments.push(seg);
        }
    }
    Some(url.to_string())
}
