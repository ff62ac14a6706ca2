//! The hub: composition root for the registry and the services.
//!
//! Created once at startup, passed as an explicit `Arc` handle into the
//! gateway and every session task. Shutdown drains the registry by closing
//! all sessions with `client-closed`.

use crate::config::Config;
use crate::db::{Database, DbError};
use crate::registry::SessionRegistry;
use crate::router::Router;
use crate::services::{
    ChatService, ContactService, DataProviderRegistry, NotificationService, PresenceService,
    ProfileProvider,
};
use std::sync::Arc;
use tracing::info;
use trellis_proto::CloseReason;

/// Shared state for the whole realtime core.
pub struct Hub {
    pub config: Config,
    pub db: Database,
    pub registry: Arc<SessionRegistry>,
    pub router: Router,
    pub presence: PresenceService,
    pub chat: ChatService,
    pub notifications: Arc<NotificationService>,
    pub contacts: ContactService,
    pub data: DataProviderRegistry,
}

impl Hub {
    /// Connect the database, reconcile stale presence, and assemble the hub.
    pub async fn connect(config: Config) -> Result<Arc<Self>, DbError> {
        let db = Database::new(&config.database.path).await?;

        // Rows left online by a crash would report ghost presence.
        let now = chrono::Utc::now().timestamp_millis();
        let reconciled = db.presence().reset_all_offline(now).await?;
        if reconciled > 0 {
            info!(rows = reconciled, "Reconciled stale presence rows to offline");
        }

        Ok(Self::assemble(config, db))
    }

    /// Assemble the hub around an existing database handle (tests use this
    /// with `:memory:`).
    pub fn assemble(config: Config, db: Database) -> Arc<Self> {
        let registry = Arc::new(SessionRegistry::new());

        let presence = PresenceService::new(db.clone(), registry.clone());
        let chat = ChatService::new(db.clone(), registry.clone(), config.limits.clone());
        let notifications = Arc::new(NotificationService::new(db.clone(), registry.clone()));
        let contacts = ContactService::new(db.clone(), notifications.clone());

        let mut data = DataProviderRegistry::new();
        data.register("profile", Arc::new(ProfileProvider::new(db.clone())));

        Arc::new(Self {
            config,
            db,
            registry,
            router: Router::new(),
            presence,
            chat,
            notifications,
            contacts,
            data,
        })
    }

    /// Drain every live session with `client-closed`.
    pub async fn shutdown(&self) {
        let closed = self.registry.drain(CloseReason::ClientClosed);
        info!(sessions = closed, "Hub drained");
    }
}
