//! History reads and administrative deletion.
//!
//! Reads are scoped to what the requester may see: private history only for
//! conversations they are part of, group history only for groups the
//! directory says they belong to, and searches filtered by the same rules
//! unless the requester is an administrator.

use std::sync::Arc;
use std::time::Duration;

use parley_types::config::GatewayConfig;
use parley_types::error::{GatewayError, RepositoryError};
use parley_types::ids::{GroupId, UserId};
use parley_types::message::{HistoryRequest, Message, MessageKind, MessageQuery, Page, Visibility};
use tracing::info;
use uuid::Uuid;

use crate::repository::group::GroupDirectory;
use crate::repository::message::MessageRepository;
use crate::timeout::within;

pub struct HistoryService<M, G> {
    messages: Arc<M>,
    groups: Arc<G>,
    default_limit: u32,
    max_limit: u32,
    admins: Vec<UserId>,
    timeout: Duration,
}

fn storage(e: RepositoryError) -> GatewayError {
    GatewayError::PersistenceFailed(e.to_string())
}

impl<M: MessageRepository, G: GroupDirectory> HistoryService<M, G> {
    pub fn new(messages: Arc<M>, groups: Arc<G>, config: &GatewayConfig) -> Self {
        Self {
            messages,
            groups,
            default_limit: config.history_default_limit,
            max_limit: config.history_max_limit,
            admins: config.admin_users.iter().map(UserId::new).collect(),
            timeout: config.collaborator_timeout(),
        }
    }

    /// Clamp client paging to `1..=max_limit`.
    pub fn page(&self, limit: Option<u32>, skip: Option<u32>) -> Page {
        let limit = limit.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1));
        Page::new(limit, skip.unwrap_or(0))
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }

    /// Conversation history, most recent first.
    pub async fn history(
        &self,
        requester: &UserId,
        request: HistoryRequest,
    ) -> Result<Vec<Message>, GatewayError> {
        let page = self.page(request.limit, request.skip);
        let target = request
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let read = match request.kind {
            MessageKind::Private => {
                let other = target
                    .map(UserId::new)
                    .ok_or_else(|| GatewayError::validation("private history requires a target user"))?;
                within(
                    self.timeout,
                    "private history",
                    self.messages.private_history(requester, &other, page),
                )
                .await?
            }
            MessageKind::Group => {
                let group_id = target
                    .map(GroupId::new)
                    .ok_or_else(|| GatewayError::validation("group history requires a target group"))?;
                if !self.groups_of(requester).await?.contains(&group_id) {
                    return Err(GatewayError::unauthorized(format!(
                        "not a member of group {group_id}"
                    )));
                }
                within(
                    self.timeout,
                    "group history",
                    self.messages.group_history(&group_id, page),
                )
                .await?
            }
            MessageKind::Public => {
                within(self.timeout, "public history", self.messages.public_history(page)).await?
            }
        };
        read.map_err(storage)
    }

    /// Filtered search across the log.
    pub async fn search(
        &self,
        requester: &UserId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, GatewayError> {
        if let (Some(since), Some(until)) = (query.since, query.until) {
            if since > until {
                return Err(GatewayError::validation("'since' is after 'until'"));
            }
        }
        let page = self.page(query.limit, query.skip);
        let scope = if self.is_admin(requester) {
            None
        } else {
            Some(Visibility {
                user_id: requester.clone(),
                groups: self.groups_of(requester).await?,
            })
        };
        within(
            self.timeout,
            "message search",
            self.messages.query(&query, scope.as_ref(), page),
        )
        .await?
        .map_err(storage)
    }

    /// Delete one message by id. Administrators only.
    pub async fn delete_message(&self, requester: &UserId, id: &Uuid) -> Result<(), GatewayError> {
        self.require_admin(requester)?;
        let existed = within(self.timeout, "message delete", self.messages.delete(id))
            .await?
            .map_err(storage)?;
        if !existed {
            return Err(GatewayError::NotFound(format!("message {id}")));
        }
        info!(message_id = %id, user_id = %requester, "message deleted");
        Ok(())
    }

    /// Delete every public message. Administrators only. Returns the count.
    pub async fn delete_public(&self, requester: &UserId) -> Result<u64, GatewayError> {
        self.require_admin(requester)?;
        let removed = within(self.timeout, "public purge", self.messages.delete_public())
            .await?
            .map_err(storage)?;
        info!(removed, user_id = %requester, "public messages deleted");
        Ok(removed)
    }

    fn require_admin(&self, requester: &UserId) -> Result<(), GatewayError> {
        if self.is_admin(requester) {
            Ok(())
        } else {
            Err(GatewayError::unauthorized("administrator privileges required"))
        }
    }

    async fn groups_of(&self, user_id: &UserId) -> Result<Vec<GroupId>, GatewayError> {
        let groups = within(self.timeout, "group lookup", self.groups.groups_for(user_id))
            .await?
            .map_err(storage)?;
        Ok(groups.into_iter().map(|g| g.id).collect())
    }
}
