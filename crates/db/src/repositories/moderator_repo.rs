//! Repository for the `moderators` table.

use gigs_core::types::ChatId;
use sqlx::PgPool;

use crate::models::moderator::Moderator;

const COLUMNS: &str = "id, telegram_id, display_name, is_active, created_at, updated_at";

pub struct ModeratorRepo;

impl ModeratorRepo {
    /// Platform ids of every active moderator.
    pub async fn list_active_telegram_ids(pool: &PgPool) -> Result<Vec<ChatId>, sqlx::Error> {
        let rows: Vec<(ChatId,)> = sqlx::query_as(
            "SELECT telegram_id FROM moderators WHERE is_active ORDER BY telegram_id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Insert or reactivate a moderator.
    pub async fn upsert(
        pool: &PgPool,
        telegram_id: ChatId,
        display_name: Option<&str>,
    ) -> Result<Moderator, sqlx::Error> {
        let query = format!(
            "INSERT INTO moderators (telegram_id, display_name, is_active) \
             VALUES ($1, $2, TRUE) \
             ON CONFLICT (telegram_id) DO UPDATE \
                 SET display_name = COALESCE(EXCLUDED.display_name, moderators.display_name), \
                     is_active = TRUE \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Moderator>(&query)
            .bind(telegram_id)
            .bind(display_name)
            .fetch_one(pool)
            .await
    }

    /// Returns `true` if a row was deactivated.
    pub async fn deactivate(pool: &PgPool, telegram_id: ChatId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE moderators SET is_active = FALSE WHERE telegram_id = $1 AND is_active",
        )
        .bind(telegram_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
