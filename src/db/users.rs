//! User repository: bearer-token authentication and profile snapshots.
//!
//! The user and auth_session tables are owned by the wider platform; the hub
//! only reads them.

use super::DbError;
use sqlx::SqlitePool;

/// Result of a successful bearer-token lookup.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
    pub role_id: i64,
}

/// Profile snapshot used by chat lists and notification enrichment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileSnapshot {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub picture: Option<String>,
    pub role_id: i64,
}

/// Repository for user reads.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve a bearer token to an authenticated user.
    ///
    /// Returns `None` for unknown tokens; the gateway turns that into a 401
    /// before the websocket upgrade.
    pub async fn authenticate(&self, token: &str) -> Result<Option<AuthenticatedUser>, DbError> {
        let row = sqlx::query_as::<_, AuthenticatedUser>(
            r#"
            SELECT s.user_id AS user_id, u.username AS username, s.role_id AS role_id
            FROM auth_session s
            JOIN user u ON u.id = s.user_id
            WHERE s.token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Fetch the base profile snapshot for a user.
    pub async fn get_user_base_info(
        &self,
        user_id: i64,
    ) -> Result<Option<ProfileSnapshot>, DbError> {
        let row = sqlx::query_as::<_, ProfileSnapshot>(
            r#"
            SELECT id, username, first_name, last_name, picture, role_id
            FROM user
            WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Whether a user id exists.
    pub async fn exists(&self, user_id: i64) -> Result<bool, DbError> {
        let found = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM user WHERE id = ?)")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;
        Ok(found)
    }
}
