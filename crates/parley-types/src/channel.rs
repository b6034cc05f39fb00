//! Logical fan-out channels.
//!
//! Channels are never persisted. They are computed memberships: every
//! connection subscribes to its owner's private inbox, to one channel per
//! group in its membership snapshot, and to the public channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, UserId};

/// A named fan-out target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Channel {
    /// Private inbox of one user (`user:<id>`).
    User(UserId),
    /// Membership-scoped group room (`group:<id>`).
    Group(GroupId),
    /// Every live connection.
    Public,
}

impl Channel {
    /// The group id if this is a group channel.
    pub fn as_group(&self) -> Option<&GroupId> {
        match self {
            Channel::Group(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Channel::Group(_))
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::User(id) => write!(f, "user:{id}"),
            Channel::Group(id) => write!(f, "group:{id}"),
            Channel::Public => f.write_str("public"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefixed_names() {
        assert_eq!(Channel::User(UserId::new("alice")).to_string(), "user:alice");
        assert_eq!(Channel::Group(GroupId::new("g1")).to_string(), "group:g1");
        assert_eq!(Channel::Public.to_string(), "public");
    }

    #[test]
    fn as_group_only_matches_group_channels() {
        let g = Channel::Group(GroupId::new("g1"));
        assert_eq!(g.as_group(), Some(&GroupId::new("g1")));
        assert!(Channel::Public.as_group().is_none());
        assert!(!Channel::User(UserId::new("a")).is_group());
    }
}
