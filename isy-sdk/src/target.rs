//! How callers name the thing a command is for

use isy_parser::VariableType;
use isy_state::EntityId;
use isy_stream::HubId;
use std::fmt;

/// A node, scene or program entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Entity(EntityId),
    /// A node or scene address; without a hub every configured hub is
    /// searched
    Address {
        hub: Option<HubId>,
        address: String,
    },
}

impl Target {
    pub fn address(address: impl Into<String>) -> Self {
        Target::Address {
            hub: None,
            address: address.into(),
        }
    }

    pub fn on_hub(hub: HubId, address: impl Into<String>) -> Self {
        Target::Address {
            hub: Some(hub),
            address: address.into(),
        }
    }
}

impl From<EntityId> for Target {
    fn from(id: EntityId) -> Self {
        Target::Entity(id)
    }
}

impl From<&EntityId> for Target {
    fn from(id: &EntityId) -> Self {
        Target::Entity(id.clone())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Entity(id) => write!(f, "{id}"),
            Target::Address {
                hub: Some(hub),
                address,
            } => write!(f, "{hub}/{address}"),
            Target::Address { hub: None, address } => f.write_str(address),
        }
    }
}

/// A hub variable, by `(type, id)` or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableTarget {
    Id {
        hub: Option<HubId>,
        var_type: VariableType,
        id: u32,
    },
    Name {
        hub: Option<HubId>,
        name: String,
    },
}

impl VariableTarget {
    pub fn id(var_type: VariableType, id: u32) -> Self {
        VariableTarget::Id {
            hub: None,
            var_type,
            id,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        VariableTarget::Name {
            hub: None,
            name: name.into(),
        }
    }

    /// Restrict the lookup to one hub
    pub fn on_hub(self, hub: HubId) -> Self {
        match self {
            VariableTarget::Id { var_type, id, .. } => VariableTarget::Id {
                hub: Some(hub),
                var_type,
                id,
            },
            VariableTarget::Name { name, .. } => VariableTarget::Name {
                hub: Some(hub),
                name,
            },
        }
    }

    pub(crate) fn hub(&self) -> Option<&HubId> {
        match self {
            VariableTarget::Id { hub, .. } | VariableTarget::Name { hub, .. } => hub.as_ref(),
        }
    }
}

impl fmt::Display for VariableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableTarget::Id { var_type, id, .. } => write!(f, "variable {var_type}.{id}"),
            VariableTarget::Name { name, .. } => write!(f, "variable {name:?}"),
        }
    }
}

/// A hub-side item addressed by id or by name: programs and network
/// resources
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Named<K> {
    Id { hub: Option<HubId>, id: K },
    Name { hub: Option<HubId>, name: String },
}

impl<K> Named<K> {
    pub fn id(id: K) -> Self {
        Named::Id { hub: None, id }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Named::Name {
            hub: None,
            name: name.into(),
        }
    }

    pub fn on_hub(self, hub: HubId) -> Self {
        match self {
            Named::Id { id, .. } => Named::Id {
                hub: Some(hub),
                id,
            },
            Named::Name { name, .. } => Named::Name {
                hub: Some(hub),
                name,
            },
        }
    }

    pub(crate) fn hub(&self) -> Option<&HubId> {
        match self {
            Named::Id { hub, .. } | Named::Name { hub, .. } => hub.as_ref(),
        }
    }
}

impl<K: fmt::Display> fmt::Display for Named<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Named::Id { id, .. } => write!(f, "{id}"),
            Named::Name { name, .. } => write!(f, "{name:?}"),
        }
    }
}

/// A program by id (`001A`) or name
pub type ProgramTarget = Named<String>;

/// A network resource by numeric id or name
pub type ResourceTarget = Named<u32>;
