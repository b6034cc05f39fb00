//! Per-connection lifecycle controller.

pub mod lifecycle;

pub use lifecycle::Gateway;
