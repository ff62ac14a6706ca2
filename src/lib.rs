//! trellisd - Trellis Realtime Daemon
//!
//! The realtime backbone of the Trellis professional network. One
//! authenticated websocket per user, multiplexing presence, one-to-one chat,
//! notifications, and the contact lifecycle through a central hub.
//!
//! Library surface exists for the binary in `main.rs` and the integration
//! suite; this crate is not published as an API.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod http;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod router;
pub mod services;
pub mod session;
