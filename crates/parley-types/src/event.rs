//! JSON wire events exchanged over the WebSocket.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. Payload field names
//! are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::group::GroupSummary;
use crate::ids::{GroupId, UserId};
use crate::message::{Message, MessageTarget, SendMessage};
use crate::session::{OnlineUser, PresenceStatus};

/// Events a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage(SendMessage),
    ReloadGroups,
    GetOnlineUsers,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::ReloadGroups => "reload_groups",
            ClientEvent::GetOnlineUsers => "get_online_users",
        }
    }
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionSuccess(ConnectionSuccess),
    ReceiveMessage(ReceiveMessage),
    MessageSent(MessageSent),
    GroupsReloaded(GroupsReloaded),
    UserStatus(UserStatus),
    OnlineUsers(OnlineUsers),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionSuccess(_) => "connection_success",
            ServerEvent::ReceiveMessage(_) => "receive_message",
            ServerEvent::MessageSent(_) => "message_sent",
            ServerEvent::GroupsReloaded(_) => "groups_reloaded",
            ServerEvent::UserStatus(_) => "user_status",
            ServerEvent::OnlineUsers(_) => "online_users",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSuccess {
    pub user_id: UserId,
    pub username: String,
}

/// A message delivered to a recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveMessage {
    pub id: Uuid,
    pub content: String,
    pub sender: UserId,
    pub sender_name: String,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
}

impl ReceiveMessage {
    pub fn new(message: &Message, sender_name: &str) -> Self {
        let (is_private, is_group, group_id) = match &message.target {
            MessageTarget::Private { .. } => (Some(true), None, None),
            MessageTarget::Group { group_id } => (None, Some(true), Some(group_id.clone())),
            MessageTarget::Public => (None, None, None),
        };
        Self {
            id: message.id,
            content: message.content.clone(),
            sender: message.sender_id.clone(),
            sender_name: sender_name.to_string(),
            time: message.created_at,
            is_private,
            is_group,
            group_id,
        }
    }
}

/// Acknowledgement sent to the author of a private message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSent {
    pub id: Uuid,
    pub content: String,
    pub receiver_id: UserId,
    pub time: DateTime<Utc>,
    /// Whether the recipient was online and the frame was queued.
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupsReloaded {
    pub count: usize,
    pub groups: Vec<GroupSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    pub user_id: UserId,
    pub username: String,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnlineUsers {
    pub users: Vec<OnlineUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_frame_parses() {
        let frame = json!({
            "event": "send_message",
            "data": {"content": "hi", "receiverId": "bob"}
        });
        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        match event {
            ClientEvent::SendMessage(payload) => {
                assert_eq!(payload.content, "hi");
                assert_eq!(payload.receiver_id.as_deref(), Some("bob"));
                assert!(payload.group_id.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn reload_groups_needs_no_payload() {
        let event: ClientEvent =
            serde_json::from_value(json!({"event": "reload_groups"})).unwrap();
        assert_eq!(event.name(), "reload_groups");
    }

    #[test]
    fn unknown_event_is_rejected() {
        let result = serde_json::from_value::<ClientEvent>(json!({"event": "join_room"}));
        assert!(result.is_err());
    }

    #[test]
    fn receive_message_marks_group_sends() {
        let msg = Message::new(
            UserId::new("alice"),
            MessageTarget::Group {
                group_id: GroupId::new("g1"),
            },
            "hello group",
        );
        let event = ServerEvent::ReceiveMessage(ReceiveMessage::new(&msg, "Alice"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "receive_message");
        assert_eq!(value["data"]["senderName"], "Alice");
        assert_eq!(value["data"]["isGroup"], true);
        assert_eq!(value["data"]["groupId"], "g1");
        assert!(value["data"].get("isPrivate").is_none());
    }

    #[test]
    fn user_status_serializes_lowercase_status() {
        let event = ServerEvent::UserStatus(UserStatus {
            user_id: UserId::new("u1"),
            username: "alice".into(),
            status: PresenceStatus::Offline,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["data"]["status"], "offline");
        assert_eq!(value["data"]["userId"], "u1");
    }

    #[test]
    fn error_event_shape() {
        let value = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(value, json!({"event": "error", "data": {"message": "nope"}}));
    }
}
