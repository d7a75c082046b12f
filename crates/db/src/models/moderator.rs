use gigs_core::types::{ChatId, DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `moderators` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Moderator {
    pub id: DbId,
    pub telegram_id: ChatId,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
