//! Presence repository. Mutated only by the presence service.

use super::DbError;
use sqlx::SqlitePool;

/// A presence row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PresenceRow {
    pub user_id: i64,
    pub status: String,
    pub last_seen_ms: i64,
}

/// Repository for presence rows.
pub struct PresenceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PresenceRepository<'a> {
    /// Create a new presence repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a user to online.
    pub async fn set_online(&self, user_id: i64, now_ms: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO presence (user_id, status, last_seen_ms)
            VALUES (?, 'online', ?)
            ON CONFLICT(user_id) DO UPDATE SET status = 'online', last_seen_ms = excluded.last_seen_ms
            "#,
        )
        .bind(user_id)
        .bind(now_ms)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Upsert a user to offline with last-seen.
    pub async fn set_offline(&self, user_id: i64, now_ms: i64) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO presence (user_id, status, last_seen_ms)
            VALUES (?, 'offline', ?)
            ON CONFLICT(user_id) DO UPDATE SET status = 'offline', last_seen_ms = excluded.last_seen_ms
            "#,
        )
        .bind(user_id)
        .bind(now_ms)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a presence row.
    pub async fn get(&self, user_id: i64) -> Result<Option<PresenceRow>, DbError> {
        let row = sqlx::query_as::<_, PresenceRow>("SELECT * FROM presence WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Force every row offline. Run at startup: rows left online by a crash
    /// would otherwise report ghost presence.
    pub async fn reset_all_offline(&self, now_ms: i64) -> Result<u64, DbError> {
        let result =
            sqlx::query("UPDATE presence SET status = 'offline', last_seen_ms = ? WHERE status = 'online'")
                .bind(now_ms)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
