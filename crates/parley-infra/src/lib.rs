//! Infrastructure layer for Parley.
//!
//! Contains implementations of the collaborator traits defined in
//! `parley-core`: SQLite storage for the message log and the user/group
//! directory, HS256 bearer-token verification, and the config loader.

pub mod config;
pub mod identity;
pub mod sqlite;
