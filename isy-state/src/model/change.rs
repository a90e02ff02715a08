//! Change notifications and reconcile results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::EntityId;
use super::value::Attributes;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
    /// A node sent a command such as DON or DFOF
    Control { control: String },
}

/// One applied change to one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub entity_id: EntityId,
    pub kind: ChangeKind,
    /// For `Added` the full attribute map, otherwise the changed subset
    pub attributes: Attributes,
    pub timestamp: DateTime<Utc>,
}

impl ChangeNotification {
    pub fn added(entity_id: EntityId, attributes: Attributes, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            kind: ChangeKind::Added,
            attributes,
            timestamp,
        }
    }

    pub fn updated(entity_id: EntityId, attributes: Attributes, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            kind: ChangeKind::Updated,
            attributes,
            timestamp,
        }
    }

    pub fn removed(entity_id: EntityId, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id,
            kind: ChangeKind::Removed,
            attributes: Attributes::new(),
            timestamp,
        }
    }

    pub fn control(
        entity_id: EntityId,
        control: impl Into<String>,
        attributes: Attributes,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            kind: ChangeKind::Control {
                control: control.into(),
            },
            attributes,
            timestamp,
        }
    }
}

/// How a snapshot is reconciled against known entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileMode {
    /// Remove missing entities, add new ones, merge values into the rest
    Full,
    /// Only remove entities the hub no longer reports
    RemoveOnly,
}

/// Outcome of reconciling one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub unchanged: Vec<EntityId>,
}

impl ReconcileReport {
    /// Nothing added or removed
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}
