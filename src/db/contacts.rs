//! Contact repository: one row per unordered user pair.

use super::DbError;
use sqlx::SqlitePool;

/// Lifecycle status of a contact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl ContactStatus {
    /// Stored form of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored form.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => Self::Pending,
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            _ => return None,
        })
    }
}

/// A contact row. `user_lo < user_hi` normalizes the unordered pair.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContactRow {
    pub id: i64,
    pub user_lo: i64,
    pub user_hi: i64,
    pub requester_id: i64,
    pub status: String,
    pub chat_id: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl ContactRow {
    /// Parsed status; malformed rows read as `None`.
    pub fn contact_status(&self) -> Option<ContactStatus> {
        ContactStatus::parse(&self.status)
    }

    /// The participant that is not `user_id`.
    pub fn other_of(&self, user_id: i64) -> i64 {
        if self.user_lo == user_id {
            self.user_hi
        } else {
            self.user_lo
        }
    }

    /// Whether `user_id` is one of the two participants.
    pub fn has_participant(&self, user_id: i64) -> bool {
        self.user_lo == user_id || self.user_hi == user_id
    }
}

/// Normalize an unordered pair to (lo, hi).
fn pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Repository for contact operations.
pub struct ContactRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ContactRepository<'a> {
    /// Create a new contact repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the row covering the unordered pair, regardless of status.
    pub async fn find_pair(&self, a: i64, b: i64) -> Result<Option<ContactRow>, DbError> {
        let (lo, hi) = pair(a, b);
        let row = sqlx::query_as::<_, ContactRow>(
            "SELECT * FROM contact WHERE user_lo = ? AND user_hi = ?",
        )
        .bind(lo)
        .bind(hi)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Find a row by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<ContactRow>, DbError> {
        let row = sqlx::query_as::<_, ContactRow>("SELECT * FROM contact WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Find the row owning a chat id.
    pub async fn find_by_chat_id(&self, chat_id: &str) -> Result<Option<ContactRow>, DbError> {
        let row = sqlx::query_as::<_, ContactRow>("SELECT * FROM contact WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Create a pending row for the pair. The UNIQUE constraint rejects a
    /// second row for the same pair.
    pub async fn create_pending(
        &self,
        requester_id: i64,
        recipient_id: i64,
        now_ms: i64,
    ) -> Result<ContactRow, DbError> {
        let (lo, hi) = pair(requester_id, recipient_id);
        let id = sqlx::query(
            r#"
            INSERT INTO contact (user_lo, user_hi, requester_id, status, chat_id,
                                 created_at_ms, updated_at_ms)
            VALUES (?, ?, ?, 'pending', NULL, ?, ?)
            "#,
        )
        .bind(lo)
        .bind(hi)
        .bind(requester_id)
        .bind(now_ms)
        .bind(now_ms)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        Ok(ContactRow {
            id,
            user_lo: lo,
            user_hi: hi,
            requester_id,
            status: ContactStatus::Pending.as_str().to_string(),
            chat_id: None,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    /// Transition a row's status, optionally writing the provisioned chat id.
    ///
    /// Guarded on the current status so racing transitions resolve to a
    /// single winner; returns rows affected (0 when the guard failed).
    pub async fn transition(
        &self,
        id: i64,
        from: ContactStatus,
        to: ContactStatus,
        chat_id: Option<&str>,
        now_ms: i64,
    ) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE contact
            SET status = ?, chat_id = COALESCE(?, chat_id), updated_at_ms = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.as_str())
        .bind(chat_id)
        .bind(now_ms)
        .bind(id)
        .bind(from.as_str())
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Chat id of the accepted contact covering the pair, if any.
    pub async fn accepted_chat_id(&self, a: i64, b: i64) -> Result<Option<String>, DbError> {
        let (lo, hi) = pair(a, b);
        let chat_id = sqlx::query_scalar::<_, Option<String>>(
            "SELECT chat_id FROM contact WHERE user_lo = ? AND user_hi = ? AND status = 'accepted'",
        )
        .bind(lo)
        .bind(hi)
        .fetch_optional(self.pool)
        .await?;
        Ok(chat_id.flatten())
    }

    /// Ids of every user the given user has an accepted contact with.
    pub async fn accepted_contact_ids(&self, user_id: i64) -> Result<Vec<i64>, DbError> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT CASE WHEN user_lo = ? THEN user_hi ELSE user_lo END
            FROM contact
            WHERE (user_lo = ? OR user_hi = ?) AND status = 'accepted'
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }

    /// All accepted rows for a user, for the chat list.
    pub async fn accepted_contacts(&self, user_id: i64) -> Result<Vec<ContactRow>, DbError> {
        let rows = sqlx::query_as::<_, ContactRow>(
            r#"
            SELECT * FROM contact
            WHERE (user_lo = ? OR user_hi = ?) AND status = 'accepted'
            ORDER BY updated_at_ms DESC
            "#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalizes() {
        assert_eq!(pair(9, 7), (7, 9));
        assert_eq!(pair(7, 9), (7, 9));
        assert_eq!(pair(5, 5), (5, 5));
    }

    #[test]
    fn status_round_trip() {
        for s in [
            ContactStatus::Pending,
            ContactStatus::Accepted,
            ContactStatus::Rejected,
            ContactStatus::Cancelled,
        ] {
            assert_eq!(ContactStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ContactStatus::parse("blocked"), None);
    }

    #[test]
    fn other_of_picks_the_peer() {
        let row = ContactRow {
            id: 1,
            user_lo: 7,
            user_hi: 9,
            requester_id: 7,
            status: "accepted".into(),
            chat_id: Some("c-xyz".into()),
            created_at_ms: 0,
            updated_at_ms: 0,
        };
        assert_eq!(row.other_of(7), 9);
        assert_eq!(row.other_of(9), 7);
        assert!(row.has_participant(7));
        assert!(!row.has_participant(8));
    }
}
