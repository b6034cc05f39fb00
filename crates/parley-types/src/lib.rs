//! Shared domain types for Parley.
//!
//! Identifiers, sessions, channels, chat messages, the JSON wire events
//! exchanged over WebSocket, configuration, and the error taxonomy shared by
//! every layer of the gateway.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod group;
pub mod identity;
pub mod ids;
pub mod message;
pub mod session;
