//! The single-writer entity store
//!
//! [`EntityStore`] owns every record for every hub. Snapshots and events
//! are applied one at a time; each apply publishes once, so readers holding
//! a [`StateView`] see either all of an event's effects or none of them.

use chrono::{DateTime, Utc};
use isy_api::HubSnapshot;
use isy_parser::{
    ControlEvent, EventKind, HubEvent, NetworkResource, NodeChange, NodeChangeAction,
    ProgramUpdate, PropertyUpdate, VariableUpdate,
};
use state_store::StateStore;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, trace, warn};

use isy_stream::ConnectionState;

use crate::classifier::{Classifier, NodeClass};
use crate::config::{HubSettings, StoreConfig};
use crate::derive;
use crate::import::{self, HubIndex, KnownNode, Route};
use crate::model::{
    state, AttributeValue, ChangeNotification, EntityId, EntityRecord, EntitySource, HubId,
    Platform, ProgramKey, ProgramRecord, ReconcileMode, ReconcileReport, SubNodeRole,
    VariableKey, VariableRecord,
};
use crate::pending::{PendingBuffer, PendingKey};
use crate::view::StateView;

/// Result of applying one snapshot
#[derive(Debug, Clone, Default)]
pub struct Reconciled {
    pub report: ReconcileReport,
    pub notifications: Vec<ChangeNotification>,
}

/// Everything the store tracks per hub besides the records themselves
#[derive(Debug, Default)]
struct HubBook {
    settings: HubSettings,
    index: HubIndex,
    /// Last beat per heartbeat entity
    beats: HashMap<EntityId, DateTime<Utc>>,
    /// Nodes the hub announced but has not yet described in a snapshot
    awaiting: HashSet<String>,
}

impl HubBook {
    fn new(settings: HubSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }
}

pub struct EntityStore {
    config: StoreConfig,
    hubs: HashMap<HubId, HubBook>,
    entities: StateStore<EntityId, EntityRecord>,
    variables: StateStore<VariableKey, VariableRecord>,
    programs: StateStore<ProgramKey, ProgramRecord>,
    resources: StateStore<HubId, Vec<NetworkResource>>,
    connections: StateStore<HubId, ConnectionState>,
    pending: PendingBuffer,
}

impl EntityStore {
    pub fn new(config: StoreConfig) -> Self {
        let pending = PendingBuffer::new(config.pending_per_address, config.pending_ttl);
        Self {
            config,
            hubs: HashMap::new(),
            entities: StateStore::new(),
            variables: StateStore::new(),
            programs: StateStore::new(),
            resources: StateStore::new(),
            connections: StateStore::new(),
            pending,
        }
    }

    /// Read handles onto published state
    pub fn view(&self) -> StateView {
        StateView::new(
            self.entities.reader(),
            self.variables.reader(),
            self.programs.reader(),
            self.resources.reader(),
            self.connections.reader(),
        )
    }

    /// Register a hub, or replace the settings of a known one
    pub fn register_hub(&mut self, hub: HubId, settings: HubSettings) {
        match self.hubs.get_mut(&hub) {
            Some(book) => book.settings = settings,
            None => {
                debug!(hub = %hub, "Registered hub");
                self.hubs.insert(hub, HubBook::new(settings));
            }
        }
    }

    pub fn is_registered(&self, hub: &HubId) -> bool {
        self.hubs.contains_key(hub)
    }

    /// Working copy of one entity, including unpublished changes
    pub fn entity(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub fn variable(&self, key: &VariableKey) -> Option<&VariableRecord> {
        self.variables.get(key)
    }

    pub fn program(&self, key: &ProgramKey) -> Option<&ProgramRecord> {
        self.programs.get(key)
    }

    /// Events waiting for an entity that does not exist yet
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Reconcile a complete snapshot of one hub against known state.
    ///
    /// Entities missing from the snapshot are removed in either mode. In
    /// [`ReconcileMode::Full`] new entities are added, entities whose
    /// classification changed are replaced, and fresh values are merged into
    /// the rest without discarding history. Buffered events for the hub are
    /// replayed afterwards.
    pub fn apply_snapshot(
        &mut self,
        hub: &HubId,
        snapshot: &HubSnapshot,
        mode: ReconcileMode,
    ) -> Reconciled {
        let at = snapshot.fetched_at;
        let settings = match self.hubs.get(hub) {
            Some(book) => book.settings.clone(),
            None => {
                warn!(hub = %hub, "Snapshot for unregistered hub, using default settings");
                self.hubs.insert(hub.clone(), HubBook::default());
                HubSettings::default()
            }
        };

        let plan = import::plan(hub, snapshot, &settings, at);
        let fresh: BTreeMap<EntityId, EntityRecord> = plan
            .records
            .into_iter()
            .map(|r| (r.id().clone(), r))
            .collect();

        let mut result = Reconciled::default();

        let mut removed = self
            .entities
            .retain(|id, _| id.hub() != hub || fresh.contains_key(id));
        removed.sort();
        for id in &removed {
            result
                .notifications
                .push(ChangeNotification::removed(id.clone(), at));
        }
        result.report.removed = removed;

        if mode == ReconcileMode::RemoveOnly {
            let removed: HashSet<&EntityId> = result.report.removed.iter().collect();
            if let Some(book) = self.hubs.get_mut(hub) {
                book.index.routes.retain(|_, route| match route {
                    Route::Entity(id) | Route::Negative(id) => !removed.contains(id),
                    Route::Ignored => true,
                });
                book.index.heartbeat_of.retain(|_, id| !removed.contains(id));
                book.index.program_entities.retain(|_, id| !removed.contains(id));
                book.beats.retain(|id, _| !removed.contains(id));
            }
            result.report.unchanged = self.hub_entity_ids(hub);
            self.publish();
            info!(
                hub = %hub,
                removed = result.report.removed.len(),
                "Reconciled snapshot (remove only)"
            );
            return result;
        }

        let mut added = Vec::new();
        let mut updates = Vec::new();
        for (id, record) in fresh {
            match self.entities.get(&id) {
                None => {
                    self.entities.insert(id.clone(), record);
                    added.push(id);
                }
                Some(current) if !current.same_kind(&record) => {
                    debug!(entity = %id, "Classification changed, replacing entity");
                    self.entities.insert(id.clone(), record);
                    result
                        .notifications
                        .push(ChangeNotification::removed(id.clone(), at));
                    result.report.removed.push(id.clone());
                    added.push(id);
                }
                Some(_) => {
                    let changes = self
                        .entities
                        .modify(&id, |current| derive::merge_record(current, &record, at))
                        .unwrap_or_default();
                    if !changes.is_empty() {
                        updates.push(ChangeNotification::updated(id.clone(), changes, at));
                    }
                    result.report.unchanged.push(id);
                }
            }
        }

        self.install_index(hub, plan.index, at);
        self.replace_variables(hub, plan.variables);
        self.replace_programs(hub, plan.programs);
        self.resources
            .insert(hub.clone(), snapshot.network_resources.clone());

        let added_set: HashSet<&EntityId> = added.iter().collect();
        let group_updates: Vec<ChangeNotification> = self
            .recompute_all_groups(hub, at)
            .into_iter()
            .filter(|n| !added_set.contains(&n.entity_id))
            .collect();

        for id in &added {
            if let Some(record) = self.entities.get(id) {
                result.notifications.push(ChangeNotification::added(
                    id.clone(),
                    record.attributes().clone(),
                    at,
                ));
            }
        }
        result.notifications.extend(updates);
        result.notifications.extend(group_updates);
        result.report.added = added;

        self.publish();

        let replay = self.pending.take_hub(hub);
        if !replay.is_empty() {
            debug!(hub = %hub, events = replay.len(), "Replaying buffered events");
        }
        for event in replay {
            result.notifications.extend(self.apply_event(hub, &event));
        }

        info!(
            hub = %hub,
            added = result.report.added.len(),
            removed = result.report.removed.len(),
            unchanged = result.report.unchanged.len(),
            "Reconciled snapshot"
        );
        result
    }

    /// Apply one streamed event. Derived effects on other entities (scene
    /// state, heartbeats, negative sub-nodes) land in the same publish.
    pub fn apply_event(&mut self, hub: &HubId, event: &HubEvent) -> Vec<ChangeNotification> {
        if !self.hubs.contains_key(hub) {
            debug!(hub = %hub, "Event for unregistered hub ignored");
            return Vec::new();
        }

        let notifications = match &event.kind {
            EventKind::Property(update) => self.apply_property(hub, update, event),
            EventKind::Control(control) => self.apply_control(hub, control, event),
            EventKind::Variable(update) => self.apply_variable(hub, update, event),
            EventKind::Program(update) => self.apply_program(hub, update, event),
            EventKind::NodeChanged(change) => self.apply_node_change(hub, change, event.received_at),
            EventKind::SystemStatus(status) => {
                debug!(hub = %hub, status = ?status, "Hub system status");
                Vec::new()
            }
            EventKind::Heartbeat { .. } | EventKind::Subscribed { .. } => Vec::new(),
            EventKind::Other { control, action, node } => {
                trace!(hub = %hub, control = %control, action = ?action, node = ?node, "Unhandled event");
                Vec::new()
            }
        };

        self.publish();
        notifications
    }

    pub fn set_connection_state(&mut self, hub: &HubId, state: ConnectionState) {
        self.connections.insert(hub.clone(), state);
        self.connections.publish();
    }

    /// Flag heartbeat entities whose parent has been silent too long
    pub fn check_heartbeats(&mut self, now: DateTime<Utc>) -> Vec<ChangeNotification> {
        let timeout = self.config.heartbeat_timeout;
        let overdue: Vec<EntityId> = self
            .hubs
            .values()
            .flat_map(|book| book.beats.iter())
            .filter(|(_, last)| {
                (now - **last)
                    .to_std()
                    .map(|age| age > timeout)
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut notifications = Vec::new();
        for id in overdue {
            let changes = self
                .entities
                .modify(&id, |record| derive::heartbeat_missed(record, now))
                .unwrap_or_default();
            if !changes.is_empty() {
                warn!(entity = %id, "Heartbeat missed");
                notifications.push(ChangeNotification::updated(id, changes, now));
            }
        }
        self.publish();
        notifications
    }

    /// Drop buffered events older than the pending TTL
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> usize {
        self.pending.expire(now)
    }

    /// Forget a hub and everything derived from it
    pub fn remove_hub(&mut self, hub: &HubId, at: DateTime<Utc>) -> Vec<ChangeNotification> {
        let mut removed = self.entities.retain(|id, _| id.hub() != hub);
        removed.sort();
        self.variables.retain(|key, _| &key.hub != hub);
        self.programs.retain(|key, _| &key.hub != hub);
        self.resources.remove(hub);
        self.connections.remove(hub);
        self.pending.clear_hub(hub);
        self.hubs.remove(hub);
        self.publish();

        info!(hub = %hub, entities = removed.len(), "Removed hub");
        removed
            .into_iter()
            .map(|id| ChangeNotification::removed(id, at))
            .collect()
    }

    fn publish(&mut self) {
        self.entities.publish();
        self.variables.publish();
        self.programs.publish();
        self.resources.publish();
        self.connections.publish();
    }

    fn hub_entity_ids(&self, hub: &HubId) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .keys()
            .filter(|id| id.hub() == hub)
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn route(&self, hub: &HubId, address: &str) -> Option<Route> {
        self.hubs.get(hub)?.index.routes.get(address).cloned()
    }

    fn install_index(&mut self, hub: &HubId, index: HubIndex, at: DateTime<Utc>) {
        let Some(book) = self.hubs.get_mut(hub) else {
            return;
        };
        let beats: HashMap<EntityId, DateTime<Utc>> = index
            .heartbeat_of
            .values()
            .map(|id| (id.clone(), book.beats.get(id).copied().unwrap_or(at)))
            .collect();
        book.beats = beats;
        book.index = index;
        book.awaiting.retain(|address| !book.index.nodes.contains_key(address));
    }

    fn replace_variables(&mut self, hub: &HubId, records: Vec<VariableRecord>) {
        let keep: HashSet<VariableKey> = records
            .iter()
            .map(|v| VariableKey::new(hub, v.var_type, v.id))
            .collect();
        self.variables
            .retain(|key, _| &key.hub != hub || keep.contains(key));
        for record in records {
            let key = VariableKey::new(hub, record.var_type, record.id);
            self.variables.insert(key, record);
        }
    }

    fn replace_programs(&mut self, hub: &HubId, records: Vec<ProgramRecord>) {
        let keep: HashSet<ProgramKey> = records.iter().map(|p| ProgramKey::new(hub, &p.id)).collect();
        self.programs
            .retain(|key, _| &key.hub != hub || keep.contains(key));
        for record in records {
            let key = ProgramKey::new(hub, &record.id);
            self.programs.insert(key, record);
        }
    }

    fn apply_property(
        &mut self,
        hub: &HubId,
        update: &PropertyUpdate,
        event: &HubEvent,
    ) -> Vec<ChangeNotification> {
        let at = event.received_at;
        let id = match self.route(hub, &update.address) {
            None => {
                self.pending
                    .push(hub, PendingKey::Node(update.address.clone()), event.clone());
                return Vec::new();
            }
            Some(Route::Ignored) | Some(Route::Negative(_)) => return Vec::new(),
            Some(Route::Entity(id)) => id,
        };

        let changes = self
            .entities
            .modify(&id, |record| derive::apply_property(record, update, at))
            .unwrap_or_default();
        let state_changed = changes.contains_key("state");

        let mut notifications = Vec::new();
        if !changes.is_empty() {
            notifications.push(ChangeNotification::updated(id, changes, at));
        }
        notifications.extend(self.cascade(hub, &update.address, state_changed, at));
        notifications
    }

    fn apply_control(
        &mut self,
        hub: &HubId,
        control: &ControlEvent,
        event: &HubEvent,
    ) -> Vec<ChangeNotification> {
        let at = event.received_at;
        let mut notifications = Vec::new();

        match self.route(hub, &control.address) {
            None => {
                self.pending
                    .push(hub, PendingKey::Node(control.address.clone()), event.clone());
            }
            Some(Route::Ignored) => {}
            Some(Route::Negative(parent)) => {
                if control.control != "DON" {
                    return notifications;
                }
                let changes = self
                    .entities
                    .modify(&parent, |record| derive::set_binary(record, false, at))
                    .unwrap_or_default();
                let state_changed = changes.contains_key("state");
                if !changes.is_empty() {
                    notifications.push(ChangeNotification::updated(parent.clone(), changes, at));
                }
                if let Some(address) = parent.address() {
                    let address = address.to_string();
                    notifications.extend(self.cascade(hub, &address, state_changed, at));
                }
            }
            Some(Route::Entity(id)) => {
                let (platform, role) = match self.entities.get(&id) {
                    Some(record) => (record.platform(), record.role()),
                    None => return notifications,
                };
                let command = control.control.as_str();
                let changes = match (platform, role, command) {
                    (Platform::BinarySensor, Some(SubNodeRole::Heartbeat), "DON" | "DOF") => {
                        self.beat(hub, &id, at)
                    }
                    (Platform::BinarySensor, _, "DON") => self
                        .entities
                        .modify(&id, |record| derive::set_binary(record, true, at))
                        .unwrap_or_default(),
                    (Platform::BinarySensor, _, "DOF") => self
                        .entities
                        .modify(&id, |record| derive::set_binary(record, false, at))
                        .unwrap_or_default(),
                    _ => Default::default(),
                };
                let state_changed = changes.contains_key("state");
                notifications.push(ChangeNotification::control(
                    id,
                    control.control.clone(),
                    changes,
                    at,
                ));
                notifications.extend(self.cascade(hub, &control.address, state_changed, at));
            }
        }
        notifications
    }

    /// Heartbeat and scene effects of activity on one node
    fn cascade(
        &mut self,
        hub: &HubId,
        address: &str,
        state_changed: bool,
        at: DateTime<Utc>,
    ) -> Vec<ChangeNotification> {
        let Some(book) = self.hubs.get(hub) else {
            return Vec::new();
        };
        let heartbeat = book.index.heartbeat_of.get(address).cloned();
        let groups = if state_changed {
            book.index.groups_of.get(address).cloned().unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut notifications = Vec::new();
        if let Some(heartbeat) = heartbeat {
            let changes = self.beat(hub, &heartbeat, at);
            if !changes.is_empty() {
                notifications.push(ChangeNotification::updated(heartbeat, changes, at));
            }
        }
        for group in groups {
            notifications.extend(self.recompute_group(hub, &group, at));
        }
        notifications
    }

    fn beat(&mut self, hub: &HubId, id: &EntityId, at: DateTime<Utc>) -> crate::model::Attributes {
        if let Some(book) = self.hubs.get_mut(hub) {
            book.beats.insert(id.clone(), at);
        }
        self.entities
            .modify(id, |record| derive::heartbeat(record, at))
            .unwrap_or_default()
    }

    fn recompute_group(
        &mut self,
        hub: &HubId,
        group: &EntityId,
        at: DateTime<Utc>,
    ) -> Option<ChangeNotification> {
        let members = match self.entities.get(group)?.source() {
            EntitySource::Group { members, .. } => members.clone(),
            _ => return None,
        };
        let routes = &self.hubs.get(hub)?.index.routes;
        let states: Vec<bool> = members
            .iter()
            .filter_map(|member| match routes.get(member) {
                Some(Route::Entity(id)) => self.entities.get(id),
                _ => None,
            })
            .filter_map(|record| match record.state()?.as_text()? {
                state::ON => Some(true),
                state::OFF => Some(false),
                _ => None,
            })
            .collect();

        let changes = self
            .entities
            .modify(group, |record| derive::set_group(record, &states, at))?;
        if changes.is_empty() {
            None
        } else {
            Some(ChangeNotification::updated(group.clone(), changes, at))
        }
    }

    fn recompute_all_groups(&mut self, hub: &HubId, at: DateTime<Utc>) -> Vec<ChangeNotification> {
        let mut groups: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(id, record)| {
                id.hub() == hub && matches!(record.source(), EntitySource::Group { .. })
            })
            .map(|(id, _)| id.clone())
            .collect();
        groups.sort();
        groups
            .into_iter()
            .filter_map(|group| self.recompute_group(hub, &group, at))
            .collect()
    }

    fn apply_variable(
        &mut self,
        hub: &HubId,
        update: &VariableUpdate,
        event: &HubEvent,
    ) -> Vec<ChangeNotification> {
        let enabled = self
            .hubs
            .get(hub)
            .map(|book| book.settings.variables_enabled)
            .unwrap_or(false);
        if !enabled {
            return Vec::new();
        }

        let key = VariableKey::new(hub, update.var_type, update.id);
        let Some(record) = self.variables.modify(&key, |variable| {
            if let Some(precision) = update.precision {
                variable.precision = precision;
            }
            if let Some(value) = update.value {
                variable.value = value;
            }
            if let Some(init) = update.init {
                variable.init = init;
            }
            if update.timestamp.is_some() {
                variable.timestamp = update.timestamp.clone();
            }
            variable.clone()
        }) else {
            self.pending.push(
                hub,
                PendingKey::Variable(update.var_type, update.id),
                event.clone(),
            );
            return Vec::new();
        };

        let at = event.received_at;
        let id = EntityId::variable(hub, update.var_type, update.id);
        let changes = self
            .entities
            .modify(&id, |entity| derive::set_variable(entity, &record, at))
            .unwrap_or_default();
        if changes.is_empty() {
            Vec::new()
        } else {
            vec![ChangeNotification::updated(id, changes, at)]
        }
    }

    fn apply_program(
        &mut self,
        hub: &HubId,
        update: &ProgramUpdate,
        event: &HubEvent,
    ) -> Vec<ChangeNotification> {
        let key = ProgramKey::new(hub, &update.id);
        let Some(status) = self.programs.modify(&key, |program| {
            if update.status.is_some() {
                program.status = update.status;
            }
            if let Some(running) = update.running {
                program.running = running;
            }
            if update.last_run.is_some() {
                program.last_run = update.last_run.clone();
            }
            if update.last_finished.is_some() {
                program.last_finished = update.last_finished.clone();
            }
            if update.enabled.is_some() {
                program.enabled = update.enabled;
            }
            if update.run_at_startup.is_some() {
                program.run_at_startup = update.run_at_startup;
            }
            program.status
        }) else {
            self.pending
                .push(hub, PendingKey::Program(key.id.clone()), event.clone());
            return Vec::new();
        };

        let Some(id) = self
            .hubs
            .get(hub)
            .and_then(|book| book.index.program_entities.get(&key.id))
            .cloned()
        else {
            return Vec::new();
        };
        let at = event.received_at;
        let changes = self
            .entities
            .modify(&id, |entity| derive::set_program_status(entity, status, at))
            .unwrap_or_default();
        if changes.is_empty() {
            Vec::new()
        } else {
            vec![ChangeNotification::updated(id, changes, at)]
        }
    }

    fn apply_node_change(
        &mut self,
        hub: &HubId,
        change: &NodeChange,
        at: DateTime<Utc>,
    ) -> Vec<ChangeNotification> {
        let address = change.address.as_str();
        match &change.action {
            NodeChangeAction::Renamed { name } => self.rename_node(hub, address, name, at),
            NodeChangeAction::Added => {
                if let Some(book) = self.hubs.get_mut(hub) {
                    book.awaiting.insert(address.to_string());
                }
                info!(hub = %hub, address = %address, "Node added on hub; it appears after the next reload");
                Vec::new()
            }
            NodeChangeAction::Removed => self.retire_node(hub, address, at),
            NodeChangeAction::EnabledChanged { enabled } => {
                let Some(Route::Entity(id)) = self.route(hub, address) else {
                    return Vec::new();
                };
                let changes = self
                    .entities
                    .modify(&id, |record| {
                        derive::set_attribute(record, "enabled", AttributeValue::Bool(*enabled), at)
                    })
                    .unwrap_or_default();
                if changes.is_empty() {
                    Vec::new()
                } else {
                    vec![ChangeNotification::updated(id, changes, at)]
                }
            }
            NodeChangeAction::Other(action) => {
                debug!(hub = %hub, address = %address, action = %action, "Unhandled node change");
                Vec::new()
            }
        }
    }

    /// A rename can move a node in or out of the ignore and sensor rules,
    /// so it is classified again. Same class: renamed in place.
    fn rename_node(
        &mut self,
        hub: &HubId,
        address: &str,
        name: &str,
        at: DateTime<Utc>,
    ) -> Vec<ChangeNotification> {
        let Some(book) = self.hubs.get_mut(hub) else {
            return Vec::new();
        };

        let Some(known) = book.index.nodes.get_mut(address) else {
            // Scenes are not reclassified
            let Some(Route::Entity(id)) = book.index.routes.get(address).cloned() else {
                return Vec::new();
            };
            let changed = self
                .entities
                .modify(&id, |record| record.rename(name, at))
                .unwrap_or(false);
            return match self.entities.get(&id) {
                Some(record) if changed => vec![ChangeNotification::updated(
                    id.clone(),
                    renamed_attributes(record),
                    at,
                )],
                _ => Vec::new(),
            };
        };
        known.descriptor.name = name.to_string();
        let known = known.clone();

        let primary = known
            .descriptor
            .primary
            .as_ref()
            .and_then(|p| book.index.nodes.get(p))
            .map(|k| k.descriptor.clone());
        let class = Classifier::new(book.settings.options.clone()).classify_node(
            &known.descriptor,
            primary.as_ref(),
            &known.folder_path,
        );
        let previous = book.index.routes.get(address).cloned();

        if let (Some(Route::Entity(id)), NodeClass::Entity(class)) = (&previous, &class) {
            let same_class = self.entities.get(id).is_some_and(|record| {
                record.platform() == class.platform
                    && record.device_class() == class.device_class
                    && record.role() == class.role
            });
            if same_class {
                let changed = self
                    .entities
                    .modify(id, |record| record.rename(name, at))
                    .unwrap_or(false);
                return match self.entities.get(id) {
                    Some(record) if changed => vec![ChangeNotification::updated(
                        id.clone(),
                        renamed_attributes(record),
                        at,
                    )],
                    _ => Vec::new(),
                };
            }
        }

        info!(hub = %hub, address = %address, name = %name, "Rename changed classification");
        let mut notifications = Vec::new();
        if let Some(Route::Entity(id)) = previous {
            notifications.extend(self.drop_entity(hub, &id, at));
        }
        notifications.extend(self.install_node(hub, &known, class, at));
        notifications
    }

    fn install_node(
        &mut self,
        hub: &HubId,
        known: &KnownNode,
        class: NodeClass,
        at: DateTime<Utc>,
    ) -> Vec<ChangeNotification> {
        let address = known.descriptor.address.clone();
        let (route, record) = match class {
            NodeClass::Ignored => (Route::Ignored, None),
            NodeClass::Negative { parent } => (Route::Negative(EntityId::node(hub, &parent)), None),
            NodeClass::Entity(class) => {
                let record = import::node_record(hub, &known.descriptor, class, at);
                (Route::Entity(record.id().clone()), Some(record))
            }
        };

        let Some(book) = self.hubs.get_mut(hub) else {
            return Vec::new();
        };
        book.index.routes.insert(address, route);

        let Some(record) = record else {
            return Vec::new();
        };
        let id = record.id().clone();
        if record.role() == Some(SubNodeRole::Heartbeat) {
            if let Some(primary) = known.descriptor.primary.as_ref() {
                book.index.heartbeat_of.insert(primary.clone(), id.clone());
                book.beats.insert(id.clone(), at);
            }
        }
        let attributes = record.attributes().clone();
        self.entities.insert(id.clone(), record);
        vec![ChangeNotification::added(id, attributes, at)]
    }

    fn retire_node(&mut self, hub: &HubId, address: &str, at: DateTime<Utc>) -> Vec<ChangeNotification> {
        let Some(book) = self.hubs.get_mut(hub) else {
            return Vec::new();
        };
        book.index.nodes.remove(address);
        book.awaiting.remove(address);
        let route = book.index.routes.remove(address);
        info!(hub = %hub, address = %address, "Node removed from hub");

        match route {
            Some(Route::Entity(id)) => self.drop_entity(hub, &id, at),
            _ => Vec::new(),
        }
    }

    /// Remove one entity and every index entry that points at it
    fn drop_entity(&mut self, hub: &HubId, id: &EntityId, at: DateTime<Utc>) -> Vec<ChangeNotification> {
        if let Some(book) = self.hubs.get_mut(hub) {
            book.index.heartbeat_of.retain(|_, hb| hb != id);
            book.index.program_entities.retain(|_, e| e != id);
            book.beats.remove(id);
            for groups in book.index.groups_of.values_mut() {
                groups.retain(|g| g != id);
            }
        }
        match self.entities.remove(id) {
            Some(_) => vec![ChangeNotification::removed(id.clone(), at)],
            None => Vec::new(),
        }
    }
}

fn renamed_attributes(record: &EntityRecord) -> crate::model::Attributes {
    let mut attributes = crate::model::Attributes::new();
    attributes.insert("name".to_string(), AttributeValue::text(record.name()));
    attributes
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("hubs", &self.hubs.len())
            .field("entities", &self.entities.len())
            .field("variables", &self.variables.len())
            .field("programs", &self.programs.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
