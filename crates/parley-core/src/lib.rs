//! Gateway logic and collaborator trait definitions for Parley.
//!
//! This crate defines the "ports" (identity service, group directory, message
//! log, transport) that the infrastructure and API layers implement, and the
//! in-memory machinery built on them: the session registry, the channel
//! membership tracker, the message router, presence, and the per-connection
//! lifecycle. It depends only on `parley-types` -- never on `parley-infra`
//! or any database/IO crate.

pub mod channel;
pub mod gateway;
pub mod identity;
pub mod message;
pub mod presence;
pub mod repository;
pub mod session;
pub mod timeout;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;
