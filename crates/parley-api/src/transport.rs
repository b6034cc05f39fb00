//! WebSocket-backed [`Transport`].
//!
//! Each accepted socket gets a bounded outbound queue. The socket's writer
//! task drains the queue in order; the gateway only ever enqueues, so a slow
//! client fills its own queue and nobody else's.

use std::sync::Arc;

use dashmap::DashMap;
use parley_core::transport::{DeliveryReport, Transport};
use parley_types::error::TransportError;
use parley_types::event::ServerEvent;
use parley_types::ids::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// A serialized event frame.
    Frame(Arc<String>),
    /// Ask the writer to send a close frame and stop.
    Close,
}

pub struct WsTransport {
    queues: DashMap<ConnectionId, mpsc::Sender<Outbound>>,
    buffer: usize,
}

impl WsTransport {
    pub fn new(buffer: usize) -> Self {
        Self {
            queues: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Create the outbound queue for a new connection and hand back its
    /// receiving end.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.buffer);
        self.queues.insert(connection_id, tx);
        rx
    }

    pub fn connection_count(&self) -> usize {
        self.queues.len()
    }

    fn push(&self, connection: &ConnectionId, item: Outbound) -> Result<(), TransportError> {
        let sender = self
            .queues
            .get(connection)
            .map(|s| s.clone())
            .ok_or_else(|| TransportError::Closed(connection.to_string()))?;
        sender.try_send(item).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Full(connection.to_string()),
            TrySendError::Closed(_) => TransportError::Closed(connection.to_string()),
        })
    }
}

fn encode(event: &ServerEvent) -> Result<Arc<String>, TransportError> {
    serde_json::to_string(event)
        .map(Arc::new)
        .map_err(|e| TransportError::Encode(e.to_string()))
}

impl Transport for WsTransport {
    fn send(&self, connection: &ConnectionId, event: &ServerEvent) -> Result<(), TransportError> {
        let frame = encode(event)?;
        self.push(connection, Outbound::Frame(frame))
    }

    fn close(&self, connection: &ConnectionId) {
        if let Some((_, sender)) = self.queues.remove(connection) {
            // A full queue still closes: dropping the sender ends the writer.
            let _ = sender.try_send(Outbound::Close);
        }
    }

    /// Serializes the event once for every target.
    fn send_many(&self, targets: &[ConnectionId], event: &ServerEvent) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let frame = match encode(event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "failed to encode event");
                report.failed = targets.len();
                return report;
            }
        };
        for target in targets {
            match self.push(target, Outbound::Frame(Arc::clone(&frame))) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::debug!(connection_id = %target, event = event.name(), error = %e, "delivery failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}
