//! HTTP surface: REST history endpoints and the WebSocket gateway.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
