/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Chat and user identifiers on the chat platform (64-bit signed).
pub type ChatId = i64;

/// Gig dates are stored as milliseconds since the Unix epoch.
pub type EpochMillis = i64;
