//! Outbound transport trait.
//!
//! Sends are synchronous: an implementation enqueues the frame on the
//! connection's outbound queue and returns immediately. Ordering is
//! guaranteed per connection only.

use parley_types::error::TransportError;
use parley_types::event::ServerEvent;
use parley_types::ids::ConnectionId;
use tracing::debug;

/// Outcome of a multi-target send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

pub trait Transport: Send + Sync {
    /// Queue one event for one connection.
    fn send(&self, connection: &ConnectionId, event: &ServerEvent) -> Result<(), TransportError>;

    /// Force-close a connection. Closing an unknown connection is a no-op.
    fn close(&self, connection: &ConnectionId);

    /// Queue the same event for many connections. A failure for one target
    /// never prevents delivery to the others.
    fn send_many(&self, targets: &[ConnectionId], event: &ServerEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for target in targets {
            match self.send(target, event) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(connection_id = %target, event = event.name(), error = %e, "delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
