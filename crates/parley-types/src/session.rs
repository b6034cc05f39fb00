//! Sessions and presence.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::ids::{ConnectionId, UserId};

/// The live binding between an authenticated identity and one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub username: String,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new(identity: &Identity, connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            user_id: identity.user_id.clone(),
            username: identity.username.clone(),
            connected_at: Utc::now(),
        }
    }
}

/// Lifecycle of one live connection. A disconnected connection has no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticated,
    Active,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Active => "active",
        };
        f.write_str(s)
    }
}

/// Presence status broadcast in `user_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
}

/// A user currently holding a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineUser {
    pub user_id: UserId,
    pub username: String,
}

impl From<&Session> for OnlineUser {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user_id.clone(),
            username: session.username.clone(),
        }
    }
}
