//! Identity types for entities, variables and programs

use isy_parser::VariableType;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use isy_stream::HubId;

/// What an entity is derived from, within one hub
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKey {
    /// Node or scene address
    Node(String),
    Variable(VariableType, u32),
    /// Id of the program supplying the entity's status
    Program(String),
}

/// Stable identity of an entity: the hub plus what it is derived from
///
/// Displays as `{hub}_{address}`, `{hub}_var_{type}_{id}` or
/// `{hub}_program_{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    hub: HubId,
    key: EntityKey,
}

impl EntityId {
    pub fn new(hub: HubId, key: EntityKey) -> Self {
        Self { hub, key }
    }

    pub fn node(hub: &HubId, address: &str) -> Self {
        Self::new(hub.clone(), EntityKey::Node(address.to_string()))
    }

    pub fn variable(hub: &HubId, var_type: VariableType, id: u32) -> Self {
        Self::new(hub.clone(), EntityKey::Variable(var_type, id))
    }

    pub fn program(hub: &HubId, status_id: &str) -> Self {
        Self::new(
            hub.clone(),
            EntityKey::Program(isy_parser::normalize_program_id(status_id)),
        )
    }

    pub fn hub(&self) -> &HubId {
        &self.hub
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Node or scene address, when the entity has one
    pub fn address(&self) -> Option<&str> {
        match &self.key {
            EntityKey::Node(address) => Some(address),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            EntityKey::Node(address) => write!(f, "{}_{}", self.hub, address),
            EntityKey::Variable(var_type, id) => write!(f, "{}_var_{}_{}", self.hub, var_type, id),
            EntityKey::Program(id) => write!(f, "{}_program_{}", self.hub, id),
        }
    }
}

/// Index key for variable records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableKey {
    pub hub: HubId,
    pub var_type: VariableType,
    pub id: u32,
}

impl VariableKey {
    pub fn new(hub: &HubId, var_type: VariableType, id: u32) -> Self {
        Self {
            hub: hub.clone(),
            var_type,
            id,
        }
    }
}

/// Index key for program records; the id is normalized to four hex digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramKey {
    pub hub: HubId,
    pub id: String,
}

impl ProgramKey {
    pub fn new(hub: &HubId, id: &str) -> Self {
        Self {
            hub: hub.clone(),
            id: isy_parser::normalize_program_id(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_display() {
        let hub = HubId::new("00:21:b9:02:1a:2b");
        assert_eq!(
            EntityId::node(&hub, "12 34 56 1").to_string(),
            "0021b9021a2b_12 34 56 1"
        );
        assert_eq!(
            EntityId::variable(&hub, VariableType::State, 14).to_string(),
            "0021b9021a2b_var_2_14"
        );
        assert_eq!(EntityId::program(&hub, "1a").to_string(), "0021b9021a2b_program_001A");
    }

    #[test]
    fn test_same_address_on_two_hubs_differs() {
        let a = EntityId::node(&HubId::new("aa"), "1");
        let b = EntityId::node(&HubId::new("bb"), "1");
        assert_ne!(a, b);
        assert_eq!(a.address(), b.address());
    }
}
