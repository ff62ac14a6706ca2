//! Read-only collaborators behind the `data_request` router slot.
//!
//! The hub does not own profile, feed, search, or media reads; it dispatches
//! them by resource name into registered providers and passes payloads
//! through unchanged. The profile snapshot provider ships built in; the
//! embedding application registers the rest.

use crate::db::Database;
use crate::error::HandlerError;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

/// A read-only collaborator reachable through `data_request`.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Serve one read. `params` arrives from the client unchanged.
    async fn fetch(&self, requester_id: i64, params: &Value) -> Result<Value, HandlerError>;
}

/// Resource-name → provider table.
#[derive(Default)]
pub struct DataProviderRegistry {
    providers: HashMap<String, Arc<dyn DataProvider>>,
}

impl DataProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under a resource name.
    pub fn register(&mut self, resource: &str, provider: Arc<dyn DataProvider>) {
        self.providers.insert(resource.to_string(), provider);
    }

    /// Dispatch a read to the named resource.
    pub async fn dispatch(
        &self,
        resource: &str,
        requester_id: i64,
        params: &Value,
    ) -> Result<Value, HandlerError> {
        let Some(provider) = self.providers.get(resource) else {
            return Err(HandlerError::NotFound(format!("resource {resource}")));
        };
        provider.fetch(requester_id, params).await
    }

    /// Registered resource names (diagnostics).
    pub fn resources(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Built-in provider for profile snapshots.
///
/// `params`: `{"userId": n}`; omitted, the requester's own profile.
pub struct ProfileProvider {
    db: Database,
}

impl ProfileProvider {
    /// Create the profile provider.
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DataProvider for ProfileProvider {
    async fn fetch(&self, requester_id: i64, params: &Value) -> Result<Value, HandlerError> {
        let user_id = params
            .get("userId")
            .and_then(Value::as_i64)
            .unwrap_or(requester_id);

        let Some(profile) = self.db.users().get_user_base_info(user_id).await? else {
            return Err(HandlerError::NotFound(format!("user {user_id}")));
        };

        Ok(json!({
            "userId": profile.id,
            "username": profile.username,
            "firstName": profile.first_name,
            "lastName": profile.last_name,
            "picture": profile.picture,
            "roleId": profile.role_id,
        }))
    }
}
