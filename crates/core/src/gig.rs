//! Gig lifecycle status, transition rules and submission field validation.
//!
//! Every status write in the store goes through [`validate_transition`]
//! before it is attempted, and is then applied as a compare-and-swap on
//! the expected current status.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ChatId, DbId, EpochMillis};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Gig lifecycle status. Discriminants match the `gig_statuses` seed rows.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GigStatus {
    New = 1,
    Pending = 2,
    Approved = 3,
    Published = 4,
    Rejected = 5,
}

/// All statuses in lifecycle order.
pub const ALL_STATUSES: [GigStatus; 5] = [
    GigStatus::New,
    GigStatus::Pending,
    GigStatus::Approved,
    GigStatus::Published,
    GigStatus::Rejected,
];

impl GigStatus {
    /// Return the database status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Resolve a database status ID.
    pub fn from_id(id: i16) -> Option<Self> {
        ALL_STATUSES.into_iter().find(|s| s.id() == id)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Rejected => "rejected",
        }
    }

    /// Human label used on platform buttons and alerts.
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Published => "Published",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Rejected)
    }
}

impl std::fmt::Display for GigStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GigStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_STATUSES
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::Validation(format!("Unknown gig status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Status transitions
// ---------------------------------------------------------------------------

/// Returns the set of statuses that `from` may transition to.
///
/// Transition rules:
/// - `new`      -> `pending`
/// - `pending`  -> `approved`, `rejected`
/// - `approved` -> `published`
/// - `published`, `rejected` are terminal
pub fn valid_transitions(from: GigStatus) -> &'static [GigStatus] {
    match from {
        GigStatus::New => &[GigStatus::Pending],
        GigStatus::Pending => &[GigStatus::Approved, GigStatus::Rejected],
        GigStatus::Approved => &[GigStatus::Published],
        GigStatus::Published | GigStatus::Rejected => &[],
    }
}

/// Validate that a status transition from `current` to `next` is allowed.
pub fn validate_transition(current: GigStatus, next: GigStatus) -> Result<(), CoreError> {
    let allowed = valid_transitions(current);
    if allowed.contains(&next) {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!(
            "Cannot transition gig from '{current}' to '{next}'. Allowed transitions: {:?}",
            allowed.iter().map(|s| s.as_str()).collect::<Vec<_>>()
        )))
    }
}

/// Parse a gig identifier taken from callback data or a route.
pub fn parse_gig_id(raw: &str) -> Result<DbId, CoreError> {
    match raw.trim().parse::<DbId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(CoreError::Validation(format!("Invalid gig id '{raw}'"))),
    }
}

// ---------------------------------------------------------------------------
// Poster, post and feedback references
// ---------------------------------------------------------------------------

/// Every known representation of a gig poster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PosterAsset {
    /// Object-store key of the canonical bytes.
    pub bucket_path: Option<String>,
    /// Source URL the poster was downloaded from; the dedup key.
    pub external_url: Option<String>,
    /// Platform-native file reference once the platform hosts the image.
    pub file_id: Option<String>,
}

impl PosterAsset {
    pub fn is_empty(&self) -> bool {
        self.bucket_path.is_none() && self.external_url.is_none() && self.file_id.is_none()
    }

    /// A poster must resolve to stored bytes or a native file reference.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.bucket_path.is_some() || self.file_id.is_some() {
            Ok(())
        } else {
            Err(CoreError::Validation(
                "Poster has no stored path or platform file reference".to_string(),
            ))
        }
    }
}

/// The published post in the main channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub message_id: i64,
    pub chat_id: ChatId,
    pub file_id: Option<String>,
}

impl PostRef {
    /// Build a "view post" link for channel posts.
    ///
    /// Channel ids carry a `-100` prefix that the link form drops. Other
    /// chats have no stable public link.
    pub fn link(&self) -> Option<String> {
        let raw = self.chat_id.to_string();
        let internal = raw.strip_prefix("-100")?;
        if internal.is_empty() {
            return None;
        }
        Some(format!("https://t.me/c/{internal}/{}", self.message_id))
    }
}

/// A message sent to someone, addressed by chat and message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: i64,
}

// ---------------------------------------------------------------------------
// Submission fields
// ---------------------------------------------------------------------------

/// Maximum title length (characters).
pub const MAX_TITLE_LENGTH: usize = 200;

/// Loosely-typed gig fields as they arrive from a form, JSON body or job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GigFields {
    pub title: Option<String>,
    pub date: Option<String>,
    pub end_date: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub venue: Option<String>,
    pub tickets_url: Option<String>,
    pub poster_url: Option<String>,
    /// `data:` URL carrying inline poster bytes.
    pub poster_file: Option<String>,
}

/// Validated gig fields, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GigDraft {
    pub title: String,
    pub date_ms: EpochMillis,
    pub end_date_ms: Option<EpochMillis>,
    pub venue: String,
    pub city: String,
    /// Upper-case ISO 3166-1 alpha-2.
    pub country: String,
    pub tickets_url: String,
}

fn required(value: &Option<String>, field: &str) -> Result<String, CoreError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CoreError::Validation(format!("{field} is required"))),
    }
}

impl GigDraft {
    /// Validate raw fields. Reports the first missing or malformed field.
    pub fn from_fields(fields: &GigFields) -> Result<Self, CoreError> {
        let title = required(&fields.title, "title")?;
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(CoreError::Validation(format!(
                "title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
            )));
        }

        let date_ms = parse_gig_date(&required(&fields.date, "date")?)?;
        let end_date_ms = match fields.end_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let end = parse_gig_date(raw)?;
                if end < date_ms {
                    return Err(CoreError::Validation(
                        "endDate must not be before date".to_string(),
                    ));
                }
                Some(end)
            }
            _ => None,
        };

        let city = required(&fields.city, "city")?;
        let venue = required(&fields.venue, "venue")?;
        let country = validate_country(&required(&fields.country, "country")?)?;
        let tickets_url = validate_http_url(&required(&fields.tickets_url, "ticketsUrl")?, "ticketsUrl")?;

        Ok(Self {
            title,
            date_ms,
            end_date_ms,
            venue,
            city,
            country,
            tickets_url,
        })
    }
}

/// Normalise a two-letter country code to upper case.
pub fn validate_country(raw: &str) -> Result<String, CoreError> {
    let code = raw.trim();
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(CoreError::Validation(format!(
            "country must be a two-letter ISO code, got '{raw}'"
        )))
    }
}

/// Require an absolute http(s) URL.
pub fn validate_http_url(raw: &str, field: &str) -> Result<String, CoreError> {
    match url::Url::parse(raw.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(parsed.to_string())
        }
        _ => Err(CoreError::Validation(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a submitted date into epoch milliseconds (UTC).
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD`.
pub fn parse_gig_date(raw: &str) -> Result<EpochMillis, CoreError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.timestamp_millis());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp_millis());
        }
    }
    Err(CoreError::Validation(format!("Invalid date '{raw}'")))
}

fn to_utc(ms: EpochMillis) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// `YYYY-MM-DD` for the UTC calendar day of `ms`.
pub fn date_key(ms: EpochMillis) -> String {
    to_utc(ms)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "1970-01-01".to_string())
}

/// Four-digit year of `ms` (UTC).
pub fn year_of(ms: EpochMillis) -> String {
    to_utc(ms)
        .map(|dt| dt.format("%Y").to_string())
        .unwrap_or_else(|| "1970".to_string())
}

fn format_one(ms: EpochMillis) -> String {
    match to_utc(ms) {
        Some(dt) if dt.hour() == 0 && dt.minute() == 0 => dt.format("%-d %b %Y").to_string(),
        Some(dt) => dt.format("%-d %b %Y %H:%M").to_string(),
        None => String::new(),
    }
}

/// Display form used in messages: `23 Jan 2026` or `23 Jan 2026 – 25 Jan 2026`.
pub fn format_date_range(start: EpochMillis, end: Option<EpochMillis>) -> String {
    match end {
        Some(end) if end != start => format!("{} – {}", format_one(start), format_one(end)),
        _ => format_one(start),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn fields() -> GigFields {
        GigFields {
            title: Some("Foo Bar".into()),
            date: Some("2026-01-23".into()),
            city: Some("Valencia".into()),
            country: Some("es".into()),
            venue: Some("Loco Club".into()),
            tickets_url: Some("https://tickets.example.com/foo".into()),
            ..Default::default()
        }
    }

    // -- status --

    #[test]
    fn status_ids_round_trip() {
        for status in ALL_STATUSES {
            assert_eq!(GigStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(GigStatus::from_id(0), None);
        assert_eq!(GigStatus::from_id(6), None);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Pending".parse::<GigStatus>().unwrap(), GigStatus::Pending);
        assert!("archived".parse::<GigStatus>().is_err());
    }

    // -- transitions --

    #[test]
    fn happy_path_reaches_published() {
        assert!(validate_transition(GigStatus::New, GigStatus::Pending).is_ok());
        assert!(validate_transition(GigStatus::Pending, GigStatus::Approved).is_ok());
        assert!(validate_transition(GigStatus::Approved, GigStatus::Published).is_ok());
    }

    #[test]
    fn published_is_only_reachable_from_approved() {
        for from in ALL_STATUSES {
            let allowed = validate_transition(from, GigStatus::Published).is_ok();
            assert_eq!(allowed, from == GigStatus::Approved, "from {from}");
        }
    }

    #[test]
    fn reject_only_from_pending() {
        assert!(validate_transition(GigStatus::Pending, GigStatus::Rejected).is_ok());
        assert_matches!(
            validate_transition(GigStatus::Published, GigStatus::Rejected),
            Err(CoreError::Conflict(_))
        );
        assert!(validate_transition(GigStatus::New, GigStatus::Rejected).is_err());
    }

    #[test]
    fn nothing_returns_to_new_or_pending() {
        for from in ALL_STATUSES {
            assert!(validate_transition(from, GigStatus::New).is_err());
            if from != GigStatus::New {
                assert!(validate_transition(from, GigStatus::Pending).is_err());
            }
        }
    }

    #[test]
    fn terminal_statuses_have_no_transitions() {
        assert!(valid_transitions(GigStatus::Published).is_empty());
        assert!(valid_transitions(GigStatus::Rejected).is_empty());
    }

    // -- ids --

    #[test]
    fn gig_id_must_be_positive_integer() {
        assert_eq!(parse_gig_id("42").unwrap(), 42);
        assert_matches!(parse_gig_id("0"), Err(CoreError::Validation(_)));
        assert_matches!(parse_gig_id("-3"), Err(CoreError::Validation(_)));
        assert_matches!(parse_gig_id("abc"), Err(CoreError::Validation(_)));
        assert_matches!(parse_gig_id(""), Err(CoreError::Validation(_)));
    }

    // -- fields --

    #[test]
    fn valid_fields_produce_draft() {
        let draft = GigDraft::from_fields(&fields()).unwrap();
        assert_eq!(draft.title, "Foo Bar");
        assert_eq!(draft.country, "ES");
        assert_eq!(date_key(draft.date_ms), "2026-01-23");
        assert_eq!(draft.end_date_ms, None);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let mut f = fields();
        f.venue = Some("   ".into());
        let err = GigDraft::from_fields(&f).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("venue"));
    }

    #[test]
    fn bad_country_and_url_are_rejected() {
        let mut f = fields();
        f.country = Some("ESP".into());
        assert!(GigDraft::from_fields(&f).is_err());

        let mut f = fields();
        f.tickets_url = Some("ftp://example.com".into());
        assert!(GigDraft::from_fields(&f).is_err());
    }

    #[test]
    fn end_before_start_is_rejected() {
        let mut f = fields();
        f.end_date = Some("2026-01-22".into());
        assert!(GigDraft::from_fields(&f).is_err());
    }

    // -- dates --

    #[test]
    fn dates_in_all_accepted_forms() {
        let day = parse_gig_date("2026-01-23").unwrap();
        assert_eq!(parse_gig_date("2026-01-23T00:00").unwrap(), day);
        assert_eq!(parse_gig_date("2026-01-23T00:00:00Z").unwrap(), day);
        assert_eq!(parse_gig_date("2026-01-23T02:00:00+02:00").unwrap(), day);
        assert!(parse_gig_date("23/01/2026").is_err());
    }

    #[test]
    fn date_range_formatting() {
        let start = parse_gig_date("2026-01-23").unwrap();
        let end = parse_gig_date("2026-01-25").unwrap();
        assert_eq!(format_date_range(start, None), "23 Jan 2026");
        assert_eq!(format_date_range(start, Some(end)), "23 Jan 2026 – 25 Jan 2026");
        let evening = parse_gig_date("2026-02-03T20:30").unwrap();
        assert_eq!(format_date_range(evening, None), "3 Feb 2026 20:30");
    }

    // -- references --

    #[test]
    fn post_link_for_channels_only() {
        let post = PostRef {
            message_id: 77,
            chat_id: -1001234567890,
            file_id: None,
        };
        assert_eq!(post.link().as_deref(), Some("https://t.me/c/1234567890/77"));

        let private = PostRef {
            message_id: 5,
            chat_id: 42,
            file_id: None,
        };
        assert_eq!(private.link(), None);
    }

    #[test]
    fn poster_requires_retrievable_representation() {
        let only_url = PosterAsset {
            external_url: Some("https://x.test/p.jpg".into()),
            ..Default::default()
        };
        assert!(only_url.validate().is_err());

        let stored = PosterAsset {
            bucket_path: Some("gigs/2026/es/valencia/foo.jpg".into()),
            ..only_url
        };
        assert!(stored.validate().is_ok());
    }
}
