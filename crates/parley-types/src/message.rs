//! Chat message domain types.
//!
//! A [`Message`] carries its destination as a tagged [`MessageTarget`] so that
//! classification is exhaustive. On the wire and in the message log it is
//! flattened to `{kind, receiverId?, groupId?}`, with exactly the field that
//! matches `kind` present.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{GroupId, UserId};

/// Discriminant of a message destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Private,
    Group,
    Public,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Private => f.write_str("private"),
            MessageKind::Group => f.write_str("group"),
            MessageKind::Public => f.write_str("public"),
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(MessageKind::Private),
            "group" => Ok(MessageKind::Group),
            "public" => Ok(MessageKind::Public),
            other => Err(format!("unknown message kind: '{other}'")),
        }
    }
}

/// Where a message is going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    /// One-to-one message to another user.
    Private { receiver_id: UserId },
    /// Message to every member of a group.
    Group { group_id: GroupId },
    /// Message to everyone online.
    Public,
}

impl MessageTarget {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageTarget::Private { .. } => MessageKind::Private,
            MessageTarget::Group { .. } => MessageKind::Group,
            MessageTarget::Public => MessageKind::Public,
        }
    }

    pub fn receiver_id(&self) -> Option<&UserId> {
        match self {
            MessageTarget::Private { receiver_id } => Some(receiver_id),
            _ => None,
        }
    }

    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            MessageTarget::Group { group_id } => Some(group_id),
            _ => None,
        }
    }
}

/// A persisted chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "MessageRecord", try_from = "MessageRecord")]
pub struct Message {
    /// UUIDv7 message ID.
    pub id: Uuid,
    pub content: String,
    pub sender_id: UserId,
    pub target: MessageTarget,
    /// Server-assigned creation time, truncated to microseconds so that it
    /// survives a round trip through the message log unchanged.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Build a new message stamped with the server clock.
    pub fn new(sender_id: UserId, target: MessageTarget, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            content: content.into(),
            sender_id,
            target,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.target.kind()
    }
}

/// Flat serialized form of a [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: Uuid,
    pub content: String,
    pub sender_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageRecord {
    fn from(msg: Message) -> Self {
        let kind = msg.kind();
        let (receiver_id, group_id) = match msg.target {
            MessageTarget::Private { receiver_id } => (Some(receiver_id), None),
            MessageTarget::Group { group_id } => (None, Some(group_id)),
            MessageTarget::Public => (None, None),
        };
        Self {
            id: msg.id,
            content: msg.content,
            sender_id: msg.sender_id,
            receiver_id,
            group_id,
            kind,
            created_at: msg.created_at,
        }
    }
}

impl TryFrom<MessageRecord> for Message {
    type Error = String;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        let target = match (record.kind, record.receiver_id, record.group_id) {
            (MessageKind::Private, Some(receiver_id), None) => {
                MessageTarget::Private { receiver_id }
            }
            (MessageKind::Group, None, Some(group_id)) => MessageTarget::Group { group_id },
            (MessageKind::Public, None, None) => MessageTarget::Public,
            (kind, receiver, group) => {
                return Err(format!(
                    "inconsistent {kind} message: receiverId={}, groupId={}",
                    receiver.is_some(),
                    group.is_some()
                ));
            }
        };
        Ok(Message {
            id: record.id,
            content: record.content,
            sender_id: record.sender_id,
            target,
            created_at: record.created_at,
        })
    }
}

/// Inbound `send_message` payload. The sender is inferred from the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl SendMessage {
    /// Classify the destination.
    ///
    /// `receiverId` wins over `groupId`; blank ids count as absent; with
    /// neither present the message is public.
    pub fn classify(&self) -> MessageTarget {
        let non_blank = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        if let Some(receiver) = non_blank(&self.receiver_id) {
            MessageTarget::Private {
                receiver_id: UserId::new(receiver),
            }
        } else if let Some(group) = non_blank(&self.group_id) {
            MessageTarget::Group {
                group_id: GroupId::new(group),
            }
        } else {
            MessageTarget::Public
        }
    }
}

/// Offset pagination for history reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub skip: u32,
}

impl Page {
    pub fn new(limit: u32, skip: u32) -> Self {
        Self { limit, skip }
    }
}

/// History request as seen by clients: `{type, target?, limit?, skip?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub skip: Option<u32>,
}

/// Filtered message search, most recent first.
///
/// When both `sender` and `receiver` are given the filter matches the
/// conversation in either direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    #[serde(default)]
    pub sender: Option<UserId>,
    #[serde(default)]
    pub receiver: Option<UserId>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub skip: Option<u32>,
}

impl MessageQuery {
    /// Whether `msg` satisfies every filter set on this query.
    pub fn matches(&self, msg: &Message) -> bool {
        let pair_ok = match (&self.sender, &self.receiver) {
            (Some(s), Some(r)) => match msg.target.receiver_id() {
                Some(receiver) => {
                    (&msg.sender_id == s && receiver == r) || (&msg.sender_id == r && receiver == s)
                }
                None => false,
            },
            (Some(s), None) => &msg.sender_id == s,
            (None, Some(r)) => msg.target.receiver_id() == Some(r),
            (None, None) => true,
        };
        pair_ok
            && self
                .group_id
                .as_ref()
                .is_none_or(|g| msg.target.group_id() == Some(g))
            && self.kind.is_none_or(|k| msg.kind() == k)
            && self.since.is_none_or(|t| msg.created_at >= t)
            && self.until.is_none_or(|t| msg.created_at <= t)
    }
}

/// Restricts a search to the messages one user may read: public messages,
/// private messages they sent or received, and messages in their groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visibility {
    pub user_id: UserId,
    pub groups: Vec<GroupId>,
}

impl Visibility {
    pub fn allows(&self, msg: &Message) -> bool {
        match &msg.target {
            MessageTarget::Public => true,
            MessageTarget::Private { receiver_id } => {
                msg.sender_id == self.user_id || receiver_id == &self.user_id
            }
            MessageTarget::Group { group_id } => self.groups.contains(group_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_prefers_receiver_over_group() {
        let input = SendMessage {
            content: "hi".into(),
            receiver_id: Some("bob".into()),
            group_id: Some("g1".into()),
        };
        assert_eq!(
            input.classify(),
            MessageTarget::Private {
                receiver_id: UserId::new("bob")
            }
        );
    }

    #[test]
    fn classify_group_and_public() {
        let group = SendMessage {
            content: "hi".into(),
            receiver_id: None,
            group_id: Some("g1".into()),
        };
        assert_eq!(group.classify().kind(), MessageKind::Group);

        let public = SendMessage {
            content: "hi".into(),
            ..Default::default()
        };
        assert_eq!(public.classify(), MessageTarget::Public);
    }

    #[test]
    fn classify_treats_blank_ids_as_absent() {
        let input = SendMessage {
            content: "hi".into(),
            receiver_id: Some("   ".into()),
            group_id: Some("g1".into()),
        };
        assert_eq!(input.classify().kind(), MessageKind::Group);
    }

    #[test]
    fn private_message_serializes_flat() {
        let msg = Message::new(
            UserId::new("alice"),
            MessageTarget::Private {
                receiver_id: UserId::new("bob"),
            },
            "hello",
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["kind"], "private");
        assert_eq!(value["senderId"], "alice");
        assert_eq!(value["receiverId"], "bob");
        assert!(value.get("groupId").is_none());

        let parsed: Message = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn inconsistent_record_is_rejected() {
        let value = json!({
            "id": Uuid::now_v7(),
            "content": "x",
            "senderId": "alice",
            "groupId": "g1",
            "kind": "private",
            "createdAt": "2026-01-01T00:00:00Z"
        });
        let err = serde_json::from_value::<Message>(value).unwrap_err();
        assert!(err.to_string().contains("inconsistent private message"));
    }

    #[test]
    fn public_message_has_no_target_fields() {
        let msg = Message::new(UserId::new("alice"), MessageTarget::Public, "all");
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("receiverId").is_none());
        assert!(value.get("groupId").is_none());
    }

    #[test]
    fn created_at_is_truncated_to_micros() {
        let msg = Message::new(UserId::new("a"), MessageTarget::Public, "x");
        assert_eq!(msg.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn message_kind_parses() {
        assert_eq!("group".parse::<MessageKind>().unwrap(), MessageKind::Group);
        assert!("room".parse::<MessageKind>().is_err());
    }

    #[test]
    fn history_request_reads_type_field() {
        let req: HistoryRequest =
            serde_json::from_value(json!({"type": "private", "target": "bob"})).unwrap();
        assert_eq!(req.kind, MessageKind::Private);
        assert_eq!(req.target.as_deref(), Some("bob"));
        assert!(req.limit.is_none());
    }

    #[test]
    fn query_pair_matches_both_directions() {
        let to_bob = Message::new(
            UserId::new("alice"),
            MessageTarget::Private {
                receiver_id: UserId::new("bob"),
            },
            "a->b",
        );
        let to_alice = Message::new(
            UserId::new("bob"),
            MessageTarget::Private {
                receiver_id: UserId::new("alice"),
            },
            "b->a",
        );
        let query = MessageQuery {
            sender: Some(UserId::new("alice")),
            receiver: Some(UserId::new("bob")),
            ..Default::default()
        };
        assert!(query.matches(&to_bob));
        assert!(query.matches(&to_alice));
        let public = Message::new(UserId::new("alice"), MessageTarget::Public, "all");
        assert!(!query.matches(&public));
    }

    #[test]
    fn visibility_hides_foreign_private_and_group_messages() {
        let scope = Visibility {
            user_id: UserId::new("carol"),
            groups: vec![GroupId::new("g1")],
        };
        let private = Message::new(
            UserId::new("alice"),
            MessageTarget::Private {
                receiver_id: UserId::new("bob"),
            },
            "secret",
        );
        let own_group = Message::new(
            UserId::new("alice"),
            MessageTarget::Group {
                group_id: GroupId::new("g1"),
            },
            "hi g1",
        );
        let other_group = Message::new(
            UserId::new("alice"),
            MessageTarget::Group {
                group_id: GroupId::new("g2"),
            },
            "hi g2",
        );
        assert!(!scope.allows(&private));
        assert!(scope.allows(&own_group));
        assert!(!scope.allows(&other_group));
    }
}
