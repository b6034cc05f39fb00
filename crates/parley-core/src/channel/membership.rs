//! Per-connection channel subscriptions.
//!
//! Tracks both directions (channel -> connections and connection -> channels)
//! under a single lock. Empty channel entries are pruned on every removal so
//! the map only ever holds channels with at least one subscriber.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use parley_types::channel::Channel;
use parley_types::ids::{ConnectionId, GroupId, UserId};
use tracing::debug;

/// Group subscriptions changed by [`ChannelMembership::reload_groups`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadDiff {
    pub added: Vec<GroupId>,
    pub removed: Vec<GroupId>,
}

#[derive(Default)]
struct MembershipState {
    members: HashMap<Channel, HashSet<ConnectionId>>,
    subscriptions: HashMap<ConnectionId, HashSet<Channel>>,
}

impl MembershipState {
    fn subscribe(&mut self, connection_id: ConnectionId, channel: Channel) -> bool {
        let added = self
            .subscriptions
            .entry(connection_id)
            .or_default()
            .insert(channel.clone());
        self.members.entry(channel).or_default().insert(connection_id);
        added
    }

    fn unsubscribe(&mut self, connection_id: &ConnectionId, channel: &Channel) -> bool {
        let removed = match self.subscriptions.get_mut(connection_id) {
            Some(channels) => {
                let removed = channels.remove(channel);
                if channels.is_empty() {
                    self.subscriptions.remove(connection_id);
                }
                removed
            }
            None => false,
        };
        if let Some(conns) = self.members.get_mut(channel) {
            conns.remove(connection_id);
            if conns.is_empty() {
                self.members.remove(channel);
            }
        }
        removed
    }
}

#[derive(Default)]
pub struct ChannelMembership {
    state: Mutex<MembershipState>,
}

impl ChannelMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the subscription is new.
    pub fn subscribe(&self, connection_id: ConnectionId, channel: Channel) -> bool {
        self.state.lock().subscribe(connection_id, channel)
    }

    /// Returns `true` if the subscription existed.
    pub fn unsubscribe(&self, connection_id: &ConnectionId, channel: &Channel) -> bool {
        self.state.lock().unsubscribe(connection_id, channel)
    }

    pub fn members_of(&self, channel: &Channel) -> Vec<ConnectionId> {
        self.state
            .lock()
            .members
            .get(channel)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn channels_of(&self, connection_id: &ConnectionId) -> HashSet<Channel> {
        self.state
            .lock()
            .subscriptions
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Subscribe a freshly authenticated connection to its private inbox,
    /// each of its groups, and the public channel.
    pub fn install(&self, connection_id: ConnectionId, user_id: &UserId, groups: &[GroupId]) {
        let mut state = self.state.lock();
        state.subscribe(connection_id, Channel::User(user_id.clone()));
        for group in groups {
            state.subscribe(connection_id, Channel::Group(group.clone()));
        }
        state.subscribe(connection_id, Channel::Public);
        debug!(%connection_id, %user_id, groups = groups.len(), "channels installed");
    }

    /// Replace the connection's group subscriptions with `groups`, leaving
    /// the private inbox and public channel untouched.
    ///
    /// Returns `None` for a connection with no subscriptions: a cleared
    /// connection is never re-subscribed.
    pub fn reload_groups(
        &self,
        connection_id: ConnectionId,
        groups: &[GroupId],
    ) -> Option<ReloadDiff> {
        let mut state = self.state.lock();
        let current: HashSet<GroupId> = state
            .subscriptions
            .get(&connection_id)?
            .iter()
            .filter_map(Channel::as_group)
            .cloned()
            .collect();
        let wanted: HashSet<GroupId> = groups.iter().cloned().collect();

        let mut diff = ReloadDiff::default();
        for group in current.difference(&wanted) {
            state.unsubscribe(&connection_id, &Channel::Group(group.clone()));
            diff.removed.push(group.clone());
        }
        for group in wanted.difference(&current) {
            state.subscribe(connection_id, Channel::Group(group.clone()));
            diff.added.push(group.clone());
        }
        diff.added.sort();
        diff.removed.sort();
        Some(diff)
    }

    /// Drop every subscription held by the connection. Returns how many were
    /// removed.
    pub fn clear(&self, connection_id: &ConnectionId) -> usize {
        let mut state = self.state.lock();
        let Some(channels) = state.subscriptions.remove(connection_id) else {
            return 0;
        };
        for channel in &channels {
            if let Some(conns) = state.members.get_mut(channel) {
                conns.remove(connection_id);
                if conns.is_empty() {
                    state.members.remove(channel);
                }
            }
        }
        channels.len()
    }

    /// The group ids the connection is currently subscribed to.
    pub fn group_snapshot(&self, connection_id: &ConnectionId) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self
            .state
            .lock()
            .subscriptions
            .get(connection_id)
            .map(|channels| channels.iter().filter_map(Channel::as_group).cloned().collect())
            .unwrap_or_default();
        groups.sort();
        groups
    }

    pub fn is_member(&self, connection_id: &ConnectionId, group_id: &GroupId) -> bool {
        self.state
            .lock()
            .subscriptions
            .get(connection_id)
            .is_some_and(|channels| channels.contains(&Channel::Group(group_id.clone())))
    }

    /// Number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.state.lock().members.len()
    }
}
