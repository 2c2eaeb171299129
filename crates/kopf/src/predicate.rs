//! Per-phase event predicates.
//!
//! Each registration is bound to one [`Phase`]; the phase decides which
//! watch notifications are allowed to schedule a reconcile cycle.

use crate::tracker::Notification;
use std::fmt;

/// Lifecycle phase a handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Object creation
    Create,
    /// Object update
    Update,
    /// Object deletion
    Delete,
}

impl Phase {
    /// All phases, in registration order.
    pub const ALL: [Phase; 3] = [Phase::Create, Phase::Update, Phase::Delete];

    /// Returns whether `notification` should trigger this phase's pipeline.
    pub fn accepts(self, notification: &Notification) -> bool {
        match self {
            Phase::Create => creation_predicate(notification),
            Phase::Update => update_predicate(notification),
            Phase::Delete => deletion_predicate(notification),
        }
    }

    /// Lowercase phase name used in logs and logger names.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Create => "create",
            Phase::Update => "update",
            Phase::Delete => "delete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn creation_predicate(notification: &Notification) -> bool {
    matches!(notification, Notification::Create { .. })
}

fn update_predicate(notification: &Notification) -> bool {
    // Status-only updates (metadata.generation unchanged) are not filtered out.
    matches!(notification, Notification::Update { .. })
}

fn deletion_predicate(notification: &Notification) -> bool {
    // Deletes inferred from a relist have an unknown final state.
    matches!(notification, Notification::Delete { state_unknown: false, .. })
}
