//! Validate, persist, fan out, acknowledge.
//!
//! A message is only delivered once the message log has accepted it. If the
//! append fails or times out, nobody receives `receive_message` and the
//! sender gets `PersistenceFailed`.

use std::sync::Arc;
use std::time::Duration;

use parley_types::channel::Channel;
use parley_types::config::GatewayConfig;
use parley_types::error::GatewayError;
use parley_types::event::{MessageSent, ReceiveMessage, ServerEvent};
use parley_types::ids::ConnectionId;
use parley_types::message::{Message, MessageTarget, SendMessage};
use tracing::{info, warn};

use crate::channel::ChannelMembership;
use crate::repository::message::MessageRepository;
use crate::session::SessionRegistry;
use crate::timeout::within;
use crate::transport::Transport;

/// What happened to one routed message.
#[derive(Debug, Clone)]
pub struct RouteReport {
    pub message: Message,
    pub delivered: usize,
    pub failed: usize,
}

pub struct MessageRouter<M, T> {
    registry: Arc<SessionRegistry>,
    membership: Arc<ChannelMembership>,
    messages: Arc<M>,
    transport: Arc<T>,
    max_content_len: usize,
    timeout: Duration,
}

impl<M: MessageRepository, T: Transport> MessageRouter<M, T> {
    pub fn new(
        registry: Arc<SessionRegistry>,
        membership: Arc<ChannelMembership>,
        messages: Arc<M>,
        transport: Arc<T>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            registry,
            membership,
            messages,
            transport,
            max_content_len: config.max_content_len,
            timeout: config.collaborator_timeout(),
        }
    }

    /// Route one `send_message` from `sender`.
    pub async fn route(
        &self,
        sender: &ConnectionId,
        input: SendMessage,
    ) -> Result<RouteReport, GatewayError> {
        let session = self
            .registry
            .session(sender)
            .ok_or_else(|| GatewayError::unauthorized("connection is not authenticated"))?;

        let target = input.classify();
        self.validate(&input.content)?;
        if let MessageTarget::Group { group_id } = &target {
            if !self.membership.is_member(sender, group_id) {
                return Err(GatewayError::unauthorized(format!(
                    "not a member of group {group_id}"
                )));
            }
        }

        let message = Message::new(session.user_id.clone(), target, input.content);

        within(self.timeout, "message append", self.messages.append(&message))
            .await
            .map_err(|e| GatewayError::PersistenceFailed(e.to_string()))?
            .map_err(|e| GatewayError::PersistenceFailed(e.to_string()))?;

        let targets: Vec<ConnectionId> = match &message.target {
            MessageTarget::Private { receiver_id } => {
                self.registry.lookup_connection(receiver_id).into_iter().collect()
            }
            MessageTarget::Group { group_id } => self
                .membership
                .members_of(&Channel::Group(group_id.clone())),
            MessageTarget::Public => self.registry.connections(),
        };

        let event = ServerEvent::ReceiveMessage(ReceiveMessage::new(&message, &session.username));
        let report = self.transport.send_many(&targets, &event);

        if let MessageTarget::Private { receiver_id } = &message.target {
            let ack = ServerEvent::MessageSent(MessageSent {
                id: message.id,
                content: message.content.clone(),
                receiver_id: receiver_id.clone(),
                time: message.created_at,
                delivered: report.delivered > 0,
            });
            if let Err(e) = self.transport.send(sender, &ack) {
                warn!(connection_id = %sender, error = %e, "failed to acknowledge private message");
            }
        }

        info!(
            message_id = %message.id,
            user_id = %session.user_id,
            kind = %message.kind(),
            delivered = report.delivered,
            failed = report.failed,
            "message routed"
        );

        Ok(RouteReport {
            message,
            delivered: report.delivered,
            failed: report.failed,
        })
    }

    fn validate(&self, content: &str) -> Result<(), GatewayError> {
        if content.trim().is_empty() {
            return Err(GatewayError::validation("message content is empty"));
        }
        let len = content.chars().count();
        if len > self.max_content_len {
            return Err(GatewayError::validation(format!(
                "message content is {len} characters, limit is {}",
                self.max_content_len
            )));
        }
        Ok(())
    }
}
