//! IsySystem - Main entry point for the SDK
//!
//! Owns the state worker and one [`HubConnection`] per configured hub, and
//! routes every caller operation to the right hub.

use isy_api::commands::{
    network_resource_frame, program_frame, query_frame, rename_frame, variable_frame,
    zwave_set_frame,
};
use isy_api::validation::check_range;
use isy_api::{
    Ack, Command, CommandFrame, Credentials, HubClient, HubEndpoint, NodeCommand, ProgramAction,
    Validate, ZWaveParameter, ZWaveParameterValue,
};
use isy_parser::{FixedPoint, NetworkResource, Protocol};
use isy_state::{
    ChangeListener, ChangeNotification, EntityId, EntityRecord, EntitySource, ListenerId,
    ProgramRecord, ReconcileMode, ReconcileReport, StateView, StateWorker, StoreConfig,
    VariableRecord,
};
use isy_stream::{
    ConnectionState, HubConnection, HubId, HubTransport, IsyTransport, TransportError,
};
use parking_lot::RwLock;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::HubOptions;
use crate::coordinator::{Admission, Coordinator, HubEntry, HubHandle};
use crate::dispatcher::{plan_command, plan_intent, variable_raw, Intent};
use crate::error::{Result, SdkError};
use crate::target::{ProgramTarget, ResourceTarget, Target, VariableTarget};

/// Main system entry point
///
/// # Example
///
/// ```rust,ignore
/// use isy_sdk::{Credentials, HubEndpoint, HubOptions, Intent, IsySystem, Target};
///
/// let system = IsySystem::new()?;
/// let hub = system
///     .configure(HubEndpoint::parse("http://192.168.1.10")?, Credentials::new("admin", "admin"), HubOptions::default())
///     .await?;
///
/// system.issue_intent(Target::address("12 34 56 1"), Intent::TurnOn { level: Some(128) }).await?;
///
/// let mut changes = system.subscribe();
/// while let Ok(change) = changes.recv().await {
///     println!("{} {:?}", change.entity_id, change.kind);
/// }
/// ```
pub struct IsySystem {
    worker: StateWorker,
    hubs: RwLock<Coordinator>,
}

impl IsySystem {
    /// Start the state worker with default tuning. Needs a tokio runtime.
    pub fn new() -> Result<Self> {
        Self::with_store_config(StoreConfig::default())
    }

    pub fn with_store_config(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            worker: StateWorker::spawn(config)?,
            hubs: RwLock::new(Coordinator::default()),
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Bring a hub into the system.
    ///
    /// Fails with `Auth` when the credentials are rejected and `Unreachable`
    /// when the configuration query does not succeed within the setup
    /// timeout. Configuring a hub that is already present returns its
    /// existing handle.
    pub async fn configure(
        &self,
        endpoint: HubEndpoint,
        credentials: Credentials,
        options: HubOptions,
    ) -> Result<HubHandle> {
        let client = HubClient::new(endpoint, credentials)
            .map_err(|e| SdkError::Unreachable(e.to_string()))?;
        let transport = Arc::new(IsyTransport::new(client, options.enable_variables));
        self.configure_with_transport(transport, options).await
    }

    /// [`configure`](Self::configure) over any transport
    pub async fn configure_with_transport(
        &self,
        transport: Arc<dyn HubTransport>,
        options: HubOptions,
    ) -> Result<HubHandle> {
        let config = options.connection_config();
        config.validate()?;

        let info = match tokio::time::timeout(config.setup_timeout, transport.fetch_config()).await
        {
            Ok(Ok(info)) => info,
            Ok(Err(TransportError::Auth)) => return Err(SdkError::Auth),
            Ok(Err(e)) => return Err(SdkError::Unreachable(e.to_string())),
            Err(_) => {
                return Err(SdkError::Unreachable(format!(
                    "no configuration within {:?}",
                    config.setup_timeout
                )))
            }
        };

        let hub = HubId::new(&info.uuid);
        let admission = self.hubs.write().admit(&hub, options.enable_variables)?;
        if let Admission::Existing(handle) = admission {
            debug!(hub = %hub, "Hub already configured");
            return Ok(handle);
        }

        let handle = HubHandle {
            id: hub.clone(),
            info,
            variables_enabled: options.enable_variables,
        };
        if let Err(e) = self.worker.register_hub(hub.clone(), options.settings()) {
            self.hubs.write().abandon(&hub);
            return Err(e.into());
        }
        let connection = match HubConnection::start(hub.clone(), transport, self.worker.sink(), config) {
            Ok(connection) => connection,
            Err(e) => {
                self.hubs.write().abandon(&hub);
                if let Err(cleanup) = self.worker.remove_hub(hub.clone()).await {
                    warn!(hub = %hub, error = %cleanup, "Failed to forget abandoned hub");
                }
                return Err(e.into());
            }
        };

        info!(
            hub = %hub,
            name = %handle.info.name,
            variables = handle.variables_enabled,
            "Hub configured"
        );
        self.hubs.write().commit(HubEntry {
            handle: handle.clone(),
            options,
            connection: Arc::new(connection),
        });
        Ok(handle)
    }

    /// Wait until the hub is streaming and its initial snapshot is applied
    pub async fn wait_until_ready(&self, hub: &HubId, limit: Duration) -> Result<()> {
        let entry = self.entry(hub)?;
        let state = entry
            .connection
            .wait_for_state(|s| s.is_streaming() || s.is_terminal(), limit)
            .await
            .ok_or_else(|| SdkError::ConnectionLost(format!("hub {hub} not streaming")))?;
        if state.is_terminal() {
            return Err(SdkError::Auth);
        }
        self.worker.flush().await?;
        Ok(())
    }

    /// Re-run the full-state query and reconcile: vanished entities are
    /// removed, new ones added, and surviving ones keep their history.
    pub async fn reload(&self, hub: &HubId) -> Result<ReconcileReport> {
        self.reconcile(hub, ReconcileMode::Full).await
    }

    /// Remove entities the hub no longer reports without adding new ones
    pub async fn cleanup_entities(&self, hub: &HubId) -> Result<ReconcileReport> {
        self.reconcile(hub, ReconcileMode::RemoveOnly).await
    }

    async fn reconcile(&self, hub: &HubId, mode: ReconcileMode) -> Result<ReconcileReport> {
        let entry = self.entry(hub)?;
        let snapshot = entry.connection.fetch_snapshot().await?;
        let report = self.worker.reconcile(hub.clone(), snapshot, mode).await?;
        info!(
            hub = %hub,
            mode = ?mode,
            added = report.added.len(),
            removed = report.removed.len(),
            unchanged = report.unchanged.len(),
            "Hub reconciled"
        );
        Ok(report)
    }

    /// Shut the hub's connection down, drop its entities and release its
    /// variable claim. Returns how many entities were removed.
    pub async fn unload(&self, hub: &HubId) -> Result<usize> {
        let entry = self
            .hubs
            .write()
            .remove(hub)
            .ok_or_else(|| SdkError::unknown(hub))?;
        entry.connection.shutdown().await;
        let removed = self.worker.remove_hub(hub.clone()).await?;
        info!(hub = %hub, removed, "Hub unloaded");
        Ok(removed)
    }

    /// Unload every hub and stop the state worker
    pub async fn shutdown(&self) {
        let hubs: Vec<HubId> = self
            .hubs
            .read()
            .entries()
            .iter()
            .map(|entry| entry.handle.id.clone())
            .collect();
        for hub in hubs {
            if let Err(e) = self.unload(&hub).await {
                warn!(hub = %hub, error = %e, "Unload failed during shutdown");
            }
        }
        self.worker.shutdown().await;
    }

    // ========================================================================
    // Hubs and state
    // ========================================================================

    pub fn hubs(&self) -> Vec<HubHandle> {
        self.hubs
            .read()
            .entries()
            .iter()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    pub fn hub(&self, hub: &HubId) -> Option<HubHandle> {
        self.hubs.read().get(hub).map(|entry| entry.handle.clone())
    }

    /// Case-insensitive lookup by the name the hub reports. `None` when no
    /// hub or more than one hub has the name; see [`resolve_hub`](Self::resolve_hub).
    pub fn hub_by_name(&self, name: &str) -> Option<HubHandle> {
        let mut found = self.hubs.read().by_name(name);
        match found.len() {
            1 => Some(found.remove(0).handle.clone()),
            _ => None,
        }
    }

    /// Identity from either a hub id or a hub name. A name shared by
    /// several hubs is `AmbiguousTarget`.
    pub fn resolve_hub(&self, key: &str) -> Result<HubId> {
        let hubs = self.hubs.read();
        if let Some(entry) = hubs.get(&HubId::new(key)) {
            return Ok(entry.handle.id.clone());
        }
        let found: Vec<HubId> = hubs
            .by_name(key)
            .iter()
            .map(|entry| entry.handle.id.clone())
            .collect();
        pick(&format!("hub {key}"), found, |hub| hub.to_string())
    }

    pub fn hub_options(&self, hub: &HubId) -> Option<HubOptions> {
        self.hubs.read().get(hub).map(|entry| entry.options.clone())
    }

    /// Hub that currently tracks variables, if any
    pub fn variables_hub(&self) -> Option<HubId> {
        self.hubs.read().variables_owner().cloned()
    }

    pub fn connection_state(&self, hub: &HubId) -> Option<ConnectionState> {
        self.hubs.read().get(hub).map(|entry| entry.connection.state())
    }

    /// Lock-free read access to every entity, variable and program
    pub fn view(&self) -> StateView {
        self.worker.view()
    }

    pub fn query_state(&self, id: &EntityId) -> Result<Arc<EntityRecord>> {
        self.worker.view().entity(id).ok_or_else(|| SdkError::unknown(id))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.worker.subscribe()
    }

    pub fn add_listener(&self, listener: impl ChangeListener) -> ListenerId {
        self.worker.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.worker.remove_listener(id)
    }

    /// Events dropped because the store fell behind
    pub fn dropped_events(&self) -> u64 {
        self.worker.dropped_events()
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Send a semantic command, checked against the entity's platform
    pub async fn issue_intent(&self, target: impl Into<Target>, intent: Intent) -> Result<Ack> {
        let record = self.resolve_entity(&target.into())?;
        let frame = plan_intent(&record, &intent)?;
        self.send(record.hub(), frame).await
    }

    /// Send a node command. Raw commands are passed through unchecked and
    /// may address nodes that have no entity.
    pub async fn issue_command(&self, target: impl Into<Target>, command: Command) -> Result<Ack> {
        let target = target.into();
        if command.is_raw() {
            let (hub, address) = self.raw_destination(&target)?;
            return self.send(&hub, command.to_frame(&address)).await;
        }
        let record = self.resolve_entity(&target)?;
        let frame = plan_command(&record, &command)?;
        self.send(record.hub(), frame).await
    }

    pub async fn node_command(&self, target: impl Into<Target>, command: NodeCommand) -> Result<Ack> {
        self.issue_command(target, Command::Named(command)).await
    }

    /// Default on-level, 0-255
    pub async fn set_on_level(&self, target: impl Into<Target>, level: i64) -> Result<Ack> {
        self.issue_command(target, Command::SetOnLevel(level)).await
    }

    /// Ramp rate index, 0-31
    pub async fn set_ramp_rate(&self, target: impl Into<Target>, rate: i64) -> Result<Ack> {
        self.issue_command(target, Command::SetRampRate(rate)).await
    }

    /// Write a variable's current value, or its initial value when `init`
    pub async fn set_variable(
        &self,
        target: VariableTarget,
        value: FixedPoint,
        init: bool,
    ) -> Result<Ack> {
        let record = self.resolve_variable(&target)?;
        let raw = variable_raw(&record, value)?;
        self.send(&record.hub, variable_frame(record.var_type, record.id, raw, init))
            .await
    }

    pub async fn program_command(&self, target: ProgramTarget, action: ProgramAction) -> Result<Ack> {
        let record = self.resolve_program(&target)?;
        self.send(&record.hub, program_frame(&record.id, action)).await
    }

    pub async fn run_network_resource(&self, target: ResourceTarget) -> Result<Ack> {
        let (hub, resource) = self.resolve_resource(&target)?;
        self.send(&hub, network_resource_frame(resource.id)).await
    }

    pub async fn rename_node(&self, target: impl Into<Target>, name: &str) -> Result<Ack> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SdkError::invalid("node name must not be empty"));
        }
        let record = self.resolve_entity(&target.into())?;
        let address = node_address(&record)?;
        self.send(record.hub(), rename_frame(address, name)).await
    }

    pub async fn get_zwave_parameter(
        &self,
        target: impl Into<Target>,
        parameter: u16,
    ) -> Result<ZWaveParameterValue> {
        check_range("parameter", parameter, 1, 255)?;
        let record = self.resolve_entity(&target.into())?;
        let address = zwave_address(&record)?;
        let entry = self.entry(record.hub())?;
        Ok(entry.connection.query_parameter(address, parameter).await?)
    }

    pub async fn set_zwave_parameter(
        &self,
        target: impl Into<Target>,
        parameter: ZWaveParameter,
    ) -> Result<Ack> {
        parameter.validate()?;
        let record = self.resolve_entity(&target.into())?;
        let address = zwave_address(&record)?;
        self.send(record.hub(), zwave_set_frame(address, &parameter))
            .await
    }

    /// Ask hubs to re-query devices: one hub or all of them, optionally
    /// scoped to one address
    pub async fn system_query(
        &self,
        hub: Option<&HubId>,
        address: Option<&str>,
    ) -> Result<Vec<Ack>> {
        let hubs = match (hub, address) {
            (Some(hub), _) => vec![hub.clone()],
            (None, Some(address)) => {
                vec![self.resolve_entity(&Target::address(address))?.hub().clone()]
            }
            (None, None) => self.hubs().into_iter().map(|handle| handle.id).collect(),
        };

        let mut acks = Vec::with_capacity(hubs.len());
        for hub in hubs {
            acks.push(self.send(&hub, query_frame(address)).await?);
        }
        Ok(acks)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    fn entry(&self, hub: &HubId) -> Result<Arc<HubEntry>> {
        self.hubs
            .read()
            .get(hub)
            .ok_or_else(|| SdkError::unknown(format!("hub {hub}")))
    }

    /// Hubs a lookup may search
    fn scope(&self, hub: Option<&HubId>) -> Result<Vec<HubId>> {
        match hub {
            Some(hub) => Ok(vec![self.entry(hub)?.handle.id.clone()]),
            None => Ok(self.hubs().into_iter().map(|handle| handle.id).collect()),
        }
    }

    fn resolve_entity(&self, target: &Target) -> Result<Arc<EntityRecord>> {
        let view = self.worker.view();
        match target {
            Target::Entity(id) => view.entity(id).ok_or_else(|| SdkError::unknown(id)),
            Target::Address { hub, address } => {
                let found: Vec<Arc<EntityRecord>> = self
                    .scope(hub.as_ref())?
                    .iter()
                    .filter_map(|hub| view.entity_by_address(hub, address))
                    .collect();
                pick(target, found, |record| record.id().to_string())
            }
        }
    }

    fn raw_destination(&self, target: &Target) -> Result<(HubId, String)> {
        match target {
            Target::Address {
                hub: Some(hub),
                address,
            } => Ok((self.entry(hub)?.handle.id.clone(), address.clone())),
            Target::Address { hub: None, address } => match self.resolve_entity(target) {
                Ok(record) => Ok((record.hub().clone(), address.clone())),
                Err(SdkError::UnknownTarget(_)) => {
                    let hubs = self.scope(None)?;
                    let hub = pick(target, hubs, |hub| hub.to_string())?;
                    Ok((hub, address.clone()))
                }
                Err(e) => Err(e),
            },
            Target::Entity(_) => {
                let record = self.resolve_entity(target)?;
                let address = node_address(&record)?.to_string();
                Ok((record.hub().clone(), address))
            }
        }
    }

    fn resolve_variable(&self, target: &VariableTarget) -> Result<Arc<VariableRecord>> {
        let view = self.worker.view();
        let found: Vec<Arc<VariableRecord>> = match target {
            VariableTarget::Id { var_type, id, .. } => self
                .scope(target.hub())?
                .iter()
                .filter_map(|hub| view.variable(hub, *var_type, *id))
                .collect(),
            VariableTarget::Name { name, .. } => {
                self.scope(target.hub())?;
                view.variables_named(target.hub(), name)
            }
        };
        pick(target, found, |record| {
            format!("{}:{}.{}", record.hub, record.var_type, record.id)
        })
    }

    fn resolve_program(&self, target: &ProgramTarget) -> Result<Arc<ProgramRecord>> {
        let view = self.worker.view();
        let found: Vec<Arc<ProgramRecord>> = match target {
            ProgramTarget::Id { id, .. } => self
                .scope(target.hub())?
                .iter()
                .filter_map(|hub| view.program(hub, id))
                .collect(),
            ProgramTarget::Name { name, .. } => {
                self.scope(target.hub())?;
                view.programs_named(target.hub(), name)
            }
        };
        pick(target, found, |record| format!("{}:{}", record.hub, record.id))
    }

    fn resolve_resource(&self, target: &ResourceTarget) -> Result<(HubId, NetworkResource)> {
        let view = self.worker.view();
        let mut found = Vec::new();
        for hub in self.scope(target.hub())? {
            for resource in view.network_resources(&hub) {
                let matched = match target {
                    ResourceTarget::Id { id, .. } => resource.id == *id,
                    ResourceTarget::Name { name, .. } => &resource.name == name,
                };
                if matched {
                    found.push((hub.clone(), resource));
                }
            }
        }
        pick(target, found, |(hub, resource)| format!("{hub}:{}", resource.id))
    }

    async fn send(&self, hub: &HubId, frame: CommandFrame) -> Result<Ack> {
        let entry = self.entry(hub)?;
        debug!(hub = %hub, path = %frame.encode(), "Sending command");
        Ok(entry.connection.send(frame).await?)
    }
}

impl std::fmt::Debug for IsySystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsySystem")
            .field("hubs", &self.hubs())
            .finish()
    }
}

/// Exactly one candidate, or a typed failure naming what matched
fn pick<T>(target: &impl Display, mut found: Vec<T>, label: impl Fn(&T) -> String) -> Result<T> {
    match found.len() {
        0 => Err(SdkError::unknown(target)),
        1 => Ok(found.remove(0)),
        _ => Err(SdkError::AmbiguousTarget {
            name: target.to_string(),
            candidates: found.iter().map(label).collect(),
        }),
    }
}

fn node_address(record: &EntityRecord) -> Result<&str> {
    record
        .source()
        .address()
        .ok_or_else(|| SdkError::invalid(format!("{} is not a node", record.id())))
}

fn zwave_address(record: &EntityRecord) -> Result<&str> {
    match record.source() {
        EntitySource::Node {
            address,
            protocol: Protocol::ZWave,
            ..
        } => Ok(address),
        _ => Err(SdkError::invalid(format!(
            "{} is not a Z-Wave node",
            record.id()
        ))),
    }
}
