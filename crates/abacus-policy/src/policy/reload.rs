//! Policy change notifications.
//!
//! [`PolicyManager`](crate::policy::admin::PolicyManager) broadcasts a
//! [`PolicyChange`] after every successful mutation, once the affected
//! organization's cached decisions have been dropped. Other processes'
//! caches, search indexes or UIs can subscribe to stay in sync.

use tokio::sync::broadcast;

/// Default number of pending notifications per subscriber.
const DEFAULT_CAPACITY: usize = 64;

// =============================================================================
// Policy Change Types
// =============================================================================

/// A mutation of the policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyChange {
    /// A new policy was created.
    Created {
        policy_id: String,
        organization_id: String,
    },
    /// An existing policy was updated.
    Updated {
        policy_id: String,
        organization_id: String,
        /// Version after the update.
        version: u32,
    },
    /// A policy was soft-deleted.
    Deactivated {
        policy_id: String,
        organization_id: String,
    },
    /// A new policy set was created.
    PolicySetCreated {
        policy_set_id: String,
        organization_id: String,
    },
}

impl PolicyChange {
    /// Get the policy ID if this is a single-policy change.
    #[must_use]
    pub fn policy_id(&self) -> Option<&str> {
        match self {
            Self::Created { policy_id, .. }
            | Self::Updated { policy_id, .. }
            | Self::Deactivated { policy_id, .. } => Some(policy_id),
            Self::PolicySetCreated { .. } => None,
        }
    }

    /// The organization whose policies changed.
    #[must_use]
    pub fn organization_id(&self) -> &str {
        match self {
            Self::Created {
                organization_id, ..
            }
            | Self::Updated {
                organization_id, ..
            }
            | Self::Deactivated {
                organization_id, ..
            }
            | Self::PolicySetCreated {
                organization_id, ..
            } => organization_id,
        }
    }
}

// =============================================================================
// Policy Change Notifier
// =============================================================================

/// Broadcast channel for policy change notifications.
///
/// Multiple producers can send notifications, and multiple consumers can
/// subscribe to receive them.
#[derive(Debug)]
pub struct PolicyChangeNotifier {
    sender: broadcast::Sender<PolicyChange>,
}

impl PolicyChangeNotifier {
    /// Create a notifier buffering up to `capacity` notifications per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Notify all subscribers of a policy change.
    ///
    /// If there are no subscribers, the notification is silently dropped.
    pub fn notify(&self, change: PolicyChange) {
        tracing::debug!(
            organization_id = %change.organization_id(),
            policy_id = ?change.policy_id(),
            subscribers = self.sender.receiver_count(),
            "Policy change"
        );
        let _ = self.sender.send(change);
    }

    /// Subscribe to future notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PolicyChange> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PolicyChangeNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
