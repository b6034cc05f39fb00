//! HTTP and WebSocket request handlers.

pub mod message;
pub mod presence;
pub mod ws;
