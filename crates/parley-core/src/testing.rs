//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use parley_types::error::{IdentityError, RepositoryError, TransportError};
use parley_types::event::ServerEvent;
use parley_types::group::GroupSummary;
use parley_types::identity::Identity;
use parley_types::ids::{ConnectionId, GroupId, UserId};
use parley_types::message::{Message, MessageKind, MessageQuery, Page, Visibility};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::identity::IdentityService;
use crate::repository::group::GroupDirectory;
use crate::repository::message::MessageRepository;
use crate::transport::Transport;

/// Accepts tokens of the form `token-<user>`, for users it has been told about.
#[derive(Default)]
pub struct FakeIdentity {
    users: Mutex<HashMap<String, Identity>>,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeIdentity {
    pub fn with_users(users: &[&str]) -> Self {
        let identity = Self::default();
        for user in users {
            identity.add_user(user);
        }
        identity
    }

    pub fn add_user(&self, user: &str) {
        self.users.lock().insert(
            token(user),
            Identity {
                user_id: UserId::new(user),
                username: user.to_string(),
            },
        );
    }

    pub fn remove_user(&self, user: &str) {
        self.users.lock().remove(&token(user));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Block every `verify` until the returned notifier fires.
    pub fn gate(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(Arc::clone(&notify));
        notify
    }
}

pub fn token(user: &str) -> String {
    format!("token-{user}")
}

impl IdentityService for FakeIdentity {
    async fn verify(&self, credential: &str) -> Result<Identity, IdentityError> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let Some(user) = credential.strip_prefix("token-") else {
            return Err(IdentityError::InvalidCredential("malformed".into()));
        };
        self.users
            .lock()
            .get(credential)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownIdentity(user.to_string()))
    }
}

#[derive(Default)]
pub struct FakeGroups {
    memberships: Mutex<HashMap<UserId, Vec<GroupSummary>>>,
    failing: AtomicBool,
}

impl FakeGroups {
    pub fn join(&self, user: &str, group: &str) {
        self.memberships
            .lock()
            .entry(UserId::new(user))
            .or_default()
            .push(GroupSummary {
                id: GroupId::new(group),
                name: format!("Group {group}"),
            });
    }

    pub fn leave(&self, user: &str, group: &str) {
        if let Some(groups) = self.memberships.lock().get_mut(&UserId::new(user)) {
            groups.retain(|g| g.id.as_str() != group);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl GroupDirectory for FakeGroups {
    async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupSummary>, RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(self
            .memberships
            .lock()
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Message log kept in a vector, newest last.
#[derive(Default)]
pub struct MemoryMessageLog {
    messages: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl MemoryMessageLog {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    fn select(&self, page: Page, keep: impl Fn(&Message) -> bool) -> Vec<Message> {
        let mut hits: Vec<Message> = self
            .messages
            .lock()
            .iter()
            .filter(|m| keep(m))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        hits.into_iter()
            .skip(page.skip as usize)
            .take(page.limit as usize)
            .collect()
    }
}

impl MessageRepository for MemoryMessageLog {
    async fn append(&self, msg: &Message) -> Result<(), RepositoryError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk full".into()));
        }
        self.messages.lock().push(msg.clone());
        Ok(())
    }

    async fn private_history(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        let query = MessageQuery {
            sender: Some(user_a.clone()),
            receiver: Some(user_b.clone()),
            ..Default::default()
        };
        Ok(self.select(page, |m| query.matches(m)))
    }

    async fn group_history(
        &self,
        group_id: &GroupId,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.select(page, |m| m.target.group_id() == Some(group_id)))
    }

    async fn public_history(&self, page: Page) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.select(page, |m| m.kind() == MessageKind::Public))
    }

    async fn query(
        &self,
        query: &MessageQuery,
        scope: Option<&Visibility>,
        page: Page,
    ) -> Result<Vec<Message>, RepositoryError> {
        Ok(self.select(page, |m| {
            query.matches(m) && scope.is_none_or(|s| s.allows(m))
        }))
    }

    async fn delete(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        let mut messages = self.messages.lock();
        let before = messages.len();
        messages.retain(|m| &m.id != id);
        Ok(messages.len() != before)
    }

    async fn delete_public(&self) -> Result<u64, RepositoryError> {
        let mut messages = self.messages.lock();
        let before = messages.len();
        messages.retain(|m| m.kind() != MessageKind::Public);
        Ok((before - messages.len()) as u64)
    }
}

/// Transport that records every frame instead of writing to a socket.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
    closed: Mutex<HashSet<ConnectionId>>,
    broken: Mutex<HashSet<ConnectionId>>,
}

impl RecordingTransport {
    /// Make every send to `connection_id` fail.
    pub fn break_connection(&self, connection_id: ConnectionId) {
        self.broken.lock().insert(connection_id);
    }

    pub fn events_for(&self, connection_id: &ConnectionId) -> Vec<ServerEvent> {
        self.sent
            .lock()
            .iter()
            .filter(|(c, _)| c == connection_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn names_for(&self, connection_id: &ConnectionId) -> Vec<&'static str> {
        self.events_for(connection_id)
            .iter()
            .map(ServerEvent::name)
            .collect()
    }

    /// Total frames with the given event name, across all connections.
    pub fn count(&self, name: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|(_, e)| e.name() == name)
            .count()
    }

    pub fn is_closed(&self, connection_id: &ConnectionId) -> bool {
        self.closed.lock().contains(connection_id)
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&self, connection_id: &ConnectionId, event: &ServerEvent) -> Result<(), TransportError> {
        if self.broken.lock().contains(connection_id) || self.closed.lock().contains(connection_id)
        {
            return Err(TransportError::Closed(connection_id.to_string()));
        }
        self.sent.lock().push((*connection_id, event.clone()));
        Ok(())
    }

    fn close(&self, connection_id: &ConnectionId) {
        self.closed.lock().insert(*connection_id);
    }
}
