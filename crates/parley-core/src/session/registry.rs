//! Bidirectional identity <-> connection index.
//!
//! At most one connection is live per user. Registering a user who already
//! holds a different connection evicts the older session from both indexes
//! and hands it back to the caller, which is responsible for closing it.

use std::collections::HashMap;

use parking_lot::Mutex;
use parley_types::error::GatewayError;
use parley_types::ids::{ConnectionId, UserId};
use parley_types::session::{OnlineUser, Session};
use tracing::debug;

/// Result of [`SessionRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First live connection for this user.
    Registered,
    /// The same `(user, connection)` pair was already registered.
    Refreshed,
    /// The user's previous connection was evicted.
    Replaced { previous: Session },
}

#[derive(Default)]
struct RegistryState {
    by_connection: HashMap<ConnectionId, Session>,
    by_user: HashMap<UserId, ConnectionId>,
}

/// Registry of live sessions.
///
/// Both indexes live behind one mutex so every mutation is observed
/// atomically. The lock is only taken inside synchronous sections.
#[derive(Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `session.user_id` to `session.connection_id`.
    ///
    /// Fails with `Conflict` if the connection is already bound to a
    /// different user.
    pub fn register(&self, session: Session) -> Result<RegisterOutcome, GatewayError> {
        let mut state = self.state.lock();
        let connection_id = session.connection_id;

        if let Some(existing) = state.by_connection.get(&connection_id) {
            if existing.user_id != session.user_id {
                return Err(GatewayError::Conflict(format!(
                    "connection {connection_id} is already bound to another user"
                )));
            }
            return Ok(RegisterOutcome::Refreshed);
        }

        let previous = state
            .by_user
            .insert(session.user_id.clone(), connection_id)
            .and_then(|prev| state.by_connection.remove(&prev));
        debug!(%connection_id, user_id = %session.user_id, replaced = previous.is_some(), "session registered");
        state.by_connection.insert(connection_id, session);

        Ok(match previous {
            Some(previous) => RegisterOutcome::Replaced { previous },
            None => RegisterOutcome::Registered,
        })
    }

    /// Remove the session bound to `connection_id`.
    ///
    /// Returns the removed session if the connection was live. Idempotent:
    /// unknown or already-evicted connections return `None`.
    pub fn unregister(&self, connection_id: &ConnectionId) -> Option<Session> {
        let mut state = self.state.lock();
        let session = state.by_connection.remove(connection_id)?;
        if state.by_user.get(&session.user_id) == Some(connection_id) {
            state.by_user.remove(&session.user_id);
        }
        Some(session)
    }

    pub fn lookup_connection(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.state.lock().by_user.get(user_id).copied()
    }

    pub fn lookup_user(&self, connection_id: &ConnectionId) -> Option<UserId> {
        self.state
            .lock()
            .by_connection
            .get(connection_id)
            .map(|s| s.user_id.clone())
    }

    pub fn session(&self, connection_id: &ConnectionId) -> Option<Session> {
        self.state.lock().by_connection.get(connection_id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().by_connection.values().cloned().collect()
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.state.lock().by_connection.keys().copied().collect()
    }

    /// Online users ordered by username.
    pub fn online_users(&self) -> Vec<OnlineUser> {
        let mut users: Vec<OnlineUser> = self
            .state
            .lock()
            .by_connection
            .values()
            .map(OnlineUser::from)
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    pub fn len(&self) -> usize {
        self.state.lock().by_connection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
