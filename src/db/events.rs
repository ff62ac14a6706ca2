//! Event repository: durable notifications.

use super::DbError;
use sqlx::SqlitePool;

/// A durable notification row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub event_type: String,
    pub title: String,
    pub description: String,
    pub owner_id: i64,
    pub other_user_id: Option<i64>,
    pub project_id: Option<i64>,
    pub created_at_ms: i64,
    pub is_read: bool,
    pub status: String,
    pub action_required: bool,
    pub action_taken_at_ms: Option<i64>,
    pub metadata: Option<String>,
}

/// Parameters for inserting an event.
#[derive(Debug)]
pub struct NewEvent<'a> {
    pub event_type: &'a str,
    pub title: &'a str,
    pub description: &'a str,
    pub owner_id: i64,
    pub other_user_id: Option<i64>,
    pub project_id: Option<i64>,
    pub created_at_ms: i64,
    pub status: &'a str,
    pub action_required: bool,
    /// Serialized metadata bag, or `None` when empty.
    pub metadata: Option<&'a str>,
}

/// Repository for event operations.
pub struct EventRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventRepository<'a> {
    /// Create a new event repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist an event, returning its id.
    pub async fn insert(&self, event: NewEvent<'_>) -> Result<i64, DbError> {
        let id = sqlx::query(
            r#"
            INSERT INTO event
                (event_type, title, description, owner_id, other_user_id, project_id,
                 created_at_ms, is_read, status, action_required, action_taken_at_ms, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, NULL, ?)
            "#,
        )
        .bind(event.event_type)
        .bind(event.title)
        .bind(event.description)
        .bind(event.owner_id)
        .bind(event.other_user_id)
        .bind(event.project_id)
        .bind(event.created_at_ms)
        .bind(event.status)
        .bind(event.action_required)
        .bind(event.metadata)
        .execute(self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    /// Fetch an event by id.
    pub async fn get(&self, id: i64) -> Result<Option<EventRow>, DbError> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM event WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Newest-first inbox page for an owner.
    pub async fn list(
        &self,
        owner_id: i64,
        only_unread: bool,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<EventRow>, DbError> {
        let rows = if only_unread {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT * FROM event
                WHERE owner_id = ? AND is_read = 0
                ORDER BY created_at_ms DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?
        } else {
            sqlx::query_as::<_, EventRow>(
                r#"
                SELECT * FROM event
                WHERE owner_id = ?
                ORDER BY created_at_ms DESC, id DESC
                LIMIT ? OFFSET ?
                "#,
            )
            .bind(owner_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?
        };
        Ok(rows)
    }

    /// Mark one event read. Ownership enforced in the WHERE clause, so a
    /// non-owner call affects zero rows. is_read is monotonic.
    pub async fn mark_read(&self, owner_id: i64, id: i64) -> Result<u64, DbError> {
        let result =
            sqlx::query("UPDATE event SET is_read = 1 WHERE id = ? AND owner_id = ? AND is_read = 0")
                .bind(id)
                .bind(owner_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Mark the whole inbox read. Returns rows affected.
    pub async fn mark_all_read(&self, owner_id: i64) -> Result<u64, DbError> {
        let result = sqlx::query("UPDATE event SET is_read = 1 WHERE owner_id = ? AND is_read = 0")
            .bind(owner_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// The still-open friend_request event referencing a contact row.
    /// Used when a cancelled request must retract the recipient's prompt.
    pub async fn open_request_for_contact(
        &self,
        contact_id: i64,
    ) -> Result<Option<EventRow>, DbError> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT * FROM event
            WHERE event_type = 'friend_request'
              AND action_required = 1
              AND json_extract(metadata, '$.contactId') = ?
            "#,
        )
        .bind(contact_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Resolve an action-required event: stamp the outcome and the action
    /// time. Guarded on ownership and on the action still being open.
    pub async fn resolve_action(
        &self,
        owner_id: i64,
        id: i64,
        status: &str,
        action_taken_at_ms: i64,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE event
            SET status = ?, action_required = 0, action_taken_at_ms = ?
            WHERE id = ? AND owner_id = ? AND action_required = 1
            "#,
        )
        .bind(status)
        .bind(action_taken_at_ms)
        .bind(id)
        .bind(owner_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
