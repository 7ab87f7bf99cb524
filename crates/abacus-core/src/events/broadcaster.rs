//! Audit sinks.
//!
//! [`AuditBroadcaster`] is the default sink: a tokio broadcast channel that any
//! number of consumers (log shippers, SIEM forwarders, tests) can subscribe to.

use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::AuditEvent;

/// Default buffer size for the broadcast channel.
/// Slow receivers lose the oldest events once the buffer is full.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Destination for audit events.
///
/// Implementations must return quickly: `publish` is called inline from
/// request-serving code and its outcome is never awaited or inspected.
pub trait AuditSink: Send + Sync {
    /// Publish an event. Delivery failures are swallowed.
    fn publish(&self, event: AuditEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn publish(&self, _event: AuditEvent) {}
}

/// Broadcast channel for audit events.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct AuditBroadcaster {
    sender: broadcast::Sender<AuditEvent>,
}

impl AuditBroadcaster {
    /// Create a new broadcaster with default buffer size.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new broadcaster with custom buffer size.
    ///
    /// A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Create a new broadcaster wrapped in an Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event,
    /// 0 if there are none.
    pub fn send(&self, event: AuditEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for AuditBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for AuditBroadcaster {
    fn publish(&self, event: AuditEvent) {
        let kind = event.kind;
        let delivered = self.send(event);
        tracing::trace!(event = %kind, delivered, "Audit event published");
    }
}

impl std::fmt::Debug for AuditBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
