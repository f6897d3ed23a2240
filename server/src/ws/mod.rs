//! WebSocket subscriber endpoint (`/ws/events`).
//!
//! Each connection is one hub subscriber: the actor registers a [`WsSink`]
//! with the [`BroadcastHub`](crate::hub::BroadcastHub) and unsubscribes when
//! the peer goes away.
//!
//! [`WsSink`]: actor::WsSink

pub mod actor;
pub mod config;
pub mod handler;

pub use config::WsConfig;
