//! Service layer: the business logic between the router and the store.
//!
//! Each service owns one concern, holds a database handle plus a non-owning
//! registry handle for live delivery, and is the only writer of its tables.

mod chat;
mod contacts;
mod data;
mod notify;
mod presence;

pub use chat::ChatService;
pub use contacts::ContactService;
pub use data::{DataProvider, DataProviderRegistry, ProfileProvider};
pub use notify::{CreateEvent, EventType, NotificationService};
pub use presence::PresenceService;

use chrono::{DateTime, Utc};

/// Current time as unix milliseconds, the store's timestamp unit.
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a stored millisecond timestamp back to UTC.
pub(crate) fn ms_to_utc(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}
