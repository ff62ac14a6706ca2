//! Message repository: durable chat messages and read-state.
//!
//! History pages use keyset pagination over the composite order
//! (sent_at_ms DESC, id DESC); the anchor row's key is fetched first and the
//! page returns rows strictly below it.

use super::DbError;
use sqlx::SqlitePool;

/// Message status values. Monotonically non-decreasing per row.
pub const STATUS_SENT: i32 = 1;
pub const STATUS_DELIVERED: i32 = 2;
pub const STATUS_READ: i32 = 3;

/// A durable message row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: i64,
    pub body: String,
    pub media_id: Option<String>,
    pub reply_to: Option<String>,
    pub sent_at_ms: i64,
    pub status: i32,
    pub type_id: i32,
}

/// Parameters for inserting a message.
#[derive(Debug)]
pub struct NewMessage<'a> {
    pub id: &'a str,
    pub chat_id: &'a str,
    pub sender_id: i64,
    pub body: &'a str,
    pub media_id: Option<&'a str>,
    pub reply_to: Option<&'a str>,
    pub sent_at_ms: i64,
    pub type_id: i32,
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new message repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message with status *sent*.
    ///
    /// Idempotent on the client-generated id: a duplicate insert is ignored,
    /// which gives exactly-once durability under retries.
    pub async fn insert(&self, msg: NewMessage<'_>) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO message
                (id, chat_id, sender_id, body, media_id, reply_to, sent_at_ms, status, type_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(msg.id)
        .bind(msg.chat_id)
        .bind(msg.sender_id)
        .bind(msg.body)
        .bind(msg.media_id)
        .bind(msg.reply_to)
        .bind(msg.sent_at_ms)
        .bind(STATUS_SENT)
        .bind(msg.type_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Fetch a message by id.
    pub async fn get(&self, id: &str) -> Result<Option<MessageRow>, DbError> {
        let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM message WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Transition everything the peer sent in this chat to *read*.
    /// Idempotent; only rows below *read* change.
    pub async fn mark_read(&self, chat_id: &str, reader_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE message SET status = ? WHERE chat_id = ? AND sender_id <> ? AND status < ?",
        )
        .bind(STATUS_READ)
        .bind(chat_id)
        .bind(reader_id)
        .bind(STATUS_READ)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// One newest-first history page.
    ///
    /// With an anchor, returns rows strictly less than the anchor's
    /// (sent_at_ms, id) under the composite descending order. An unknown
    /// anchor yields an empty page rather than restarting from the top.
    pub async fn page(
        &self,
        chat_id: &str,
        before_message_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<MessageRow>, DbError> {
        let rows = match before_message_id {
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT * FROM message
                    WHERE chat_id = ?
                    ORDER BY sent_at_ms DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(chat_id)
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
            Some(anchor_id) => {
                let anchor = sqlx::query_as::<_, (i64, String)>(
                    "SELECT sent_at_ms, id FROM message WHERE id = ? AND chat_id = ?",
                )
                .bind(anchor_id)
                .bind(chat_id)
                .fetch_optional(self.pool)
                .await?;

                let Some((anchor_ms, anchor_id)) = anchor else {
                    return Ok(Vec::new());
                };

                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT * FROM message
                    WHERE chat_id = ?
                      AND (sent_at_ms < ? OR (sent_at_ms = ? AND id < ?))
                    ORDER BY sent_at_ms DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(chat_id)
                .bind(anchor_ms)
                .bind(anchor_ms)
                .bind(anchor_id)
                .bind(limit)
                .fetch_all(self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    /// Most recent message of a chat, for the chat list.
    pub async fn last_message(&self, chat_id: &str) -> Result<Option<MessageRow>, DbError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT * FROM message
            WHERE chat_id = ?
            ORDER BY sent_at_ms DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(chat_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Messages from the other party the reader has not read yet.
    pub async fn unread_count(&self, chat_id: &str, reader_id: i64) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM message WHERE chat_id = ? AND sender_id <> ? AND status < ?",
        )
        .bind(chat_id)
        .bind(reader_id)
        .bind(STATUS_READ)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_scale_is_ordered() {
        assert!(STATUS_SENT < STATUS_DELIVERED);
        assert!(STATUS_DELIVERED < STATUS_READ);
    }
}
