//! Read-only access to published state

use isy_parser::{NetworkResource, VariableType};
use isy_stream::ConnectionState;
use state_store::StoreReader;
use std::sync::Arc;

use crate::model::{
    EntityId, EntityRecord, HubId, Platform, ProgramKey, ProgramRecord, VariableKey,
    VariableRecord,
};

/// Cheap to clone; every clone sees the latest publish
#[derive(Clone)]
pub struct StateView {
    entities: StoreReader<EntityId, EntityRecord>,
    variables: StoreReader<VariableKey, VariableRecord>,
    programs: StoreReader<ProgramKey, ProgramRecord>,
    resources: StoreReader<HubId, Vec<NetworkResource>>,
    connections: StoreReader<HubId, ConnectionState>,
}

impl StateView {
    pub(crate) fn new(
        entities: StoreReader<EntityId, EntityRecord>,
        variables: StoreReader<VariableKey, VariableRecord>,
        programs: StoreReader<ProgramKey, ProgramRecord>,
        resources: StoreReader<HubId, Vec<NetworkResource>>,
        connections: StoreReader<HubId, ConnectionState>,
    ) -> Self {
        Self {
            entities,
            variables,
            programs,
            resources,
            connections,
        }
    }

    pub fn entity(&self, id: &EntityId) -> Option<Arc<EntityRecord>> {
        self.entities.get(id)
    }

    /// The entity built from a node or scene address
    pub fn entity_by_address(&self, hub: &HubId, address: &str) -> Option<Arc<EntityRecord>> {
        self.entities.get(&EntityId::node(hub, address))
    }

    /// All entities, or those of one hub, ordered by id
    pub fn entities(&self, hub: Option<&HubId>) -> Vec<Arc<EntityRecord>> {
        let mut records = self
            .entities
            .snapshot()
            .filter(|id, _| hub.map_or(true, |hub| id.hub() == hub));
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    pub fn entities_on(&self, platform: Platform) -> Vec<Arc<EntityRecord>> {
        let mut records = self
            .entities
            .snapshot()
            .filter(|_, record| record.platform() == platform);
        records.sort_by(|a, b| a.id().cmp(b.id()));
        records
    }

    pub fn variable(&self, hub: &HubId, var_type: VariableType, id: u32) -> Option<Arc<VariableRecord>> {
        self.variables.get(&VariableKey::new(hub, var_type, id))
    }

    /// Variables with this exact name, across hubs unless one is given
    pub fn variables_named(&self, hub: Option<&HubId>, name: &str) -> Vec<Arc<VariableRecord>> {
        let mut records = self.variables.snapshot().filter(|key, record| {
            record.name == name && hub.map_or(true, |hub| &key.hub == hub)
        });
        records.sort_by(|a, b| (&a.hub, a.var_type, a.id).cmp(&(&b.hub, b.var_type, b.id)));
        records
    }

    pub fn variables(&self, hub: &HubId) -> Vec<Arc<VariableRecord>> {
        let mut records = self.variables.snapshot().filter(|key, _| &key.hub == hub);
        records.sort_by(|a, b| (a.var_type, a.id).cmp(&(b.var_type, b.id)));
        records
    }

    pub fn program(&self, hub: &HubId, id: &str) -> Option<Arc<ProgramRecord>> {
        self.programs.get(&ProgramKey::new(hub, id))
    }

    /// Programs and folders with this exact name
    pub fn programs_named(&self, hub: Option<&HubId>, name: &str) -> Vec<Arc<ProgramRecord>> {
        let mut records = self.programs.snapshot().filter(|key, record| {
            record.name == name && hub.map_or(true, |hub| &key.hub == hub)
        });
        records.sort_by(|a, b| (&a.hub, &a.id).cmp(&(&b.hub, &b.id)));
        records
    }

    pub fn programs(&self, hub: &HubId) -> Vec<Arc<ProgramRecord>> {
        let mut records = self.programs.snapshot().filter(|key, _| &key.hub == hub);
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn network_resources(&self, hub: &HubId) -> Vec<NetworkResource> {
        self.resources
            .get(hub)
            .map(|resources| resources.as_ref().clone())
            .unwrap_or_default()
    }

    pub fn connection_state(&self, hub: &HubId) -> Option<ConnectionState> {
        self.connections.get(hub).map(|state| *state)
    }

    /// Publication counter of the entity table
    pub fn version(&self) -> u64 {
        self.entities.version()
    }
}

impl std::fmt::Debug for StateView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateView")
            .field("entities", &self.entities.len())
            .field("version", &self.entities.version())
            .finish()
    }
}
