//! Online/offline broadcasts.

use std::sync::Arc;

use parley_types::event::{ServerEvent, UserStatus};
use parley_types::ids::UserId;
use parley_types::session::PresenceStatus;
use tracing::debug;

use crate::session::SessionRegistry;
use crate::transport::Transport;

/// Broadcasts `user_status` to every live session. Fire-and-forget.
pub struct PresenceNotifier<T> {
    registry: Arc<SessionRegistry>,
    transport: Arc<T>,
}

impl<T: Transport> PresenceNotifier<T> {
    pub fn new(registry: Arc<SessionRegistry>, transport: Arc<T>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Returns the number of sessions the status was queued for.
    pub fn announce(&self, user_id: &UserId, username: &str, status: PresenceStatus) -> usize {
        let event = ServerEvent::UserStatus(UserStatus {
            user_id: user_id.clone(),
            username: username.to_string(),
            status,
        });
        let report = self
            .transport
            .send_many(&self.registry.connections(), &event);
        debug!(%user_id, ?status, delivered = report.delivered, failed = report.failed, "presence announced");
        report.delivered
    }
}
