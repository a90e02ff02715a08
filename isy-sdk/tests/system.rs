//! IsySystem end to end over an in-memory hub. Time is paused so setup,
//! command and reconnect timeouts advance instantly.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use isy_api::{Ack, HubSnapshot, ZWaveParameterValue};
use isy_parser::{
    CommandFrame, FixedPoint, HubInfo, NetworkResource, NodeDescriptor, NodeProperty, NodeTree,
    ProgramDescriptor, ProgramList, ProgramRunning, Protocol, VariableDescriptor, VariableType,
};
use isy_sdk::{
    ChangeKind, ChangeNotification, EntityId, FanSpeed, HubOptions, Intent, IsySystem,
    ProgramAction, ProgramTarget, RawCommand, ResourceTarget, SdkError, Setpoint, Target,
    VariableTarget, ZWaveParameter,
};
use isy_stream::{EventSource, HubTransport, TransportError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_test::assert_err;

const READY: Duration = Duration::from_secs(30);
const HUB_A: &str = "00:21:b9:02:1a:2b";
const HUB_B: &str = "00:21:b9:02:ff:01";

type FrameSender = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

struct FakeHub {
    info: HubInfo,
    config_error: Mutex<Option<TransportError>>,
    snapshot: Mutex<HubSnapshot>,
    streams: Mutex<Vec<FrameSender>>,
    sent: Mutex<Vec<String>>,
}

impl FakeHub {
    fn new(uuid: &str, name: &str, snapshot: HubSnapshot) -> Arc<Self> {
        Arc::new(Self {
            info: HubInfo {
                uuid: uuid.to_string(),
                name: name.to_string(),
                model: Some("ISY994i".to_string()),
                firmware: Some("5.3.4".to_string()),
                platform: None,
                variables_supported: true,
            },
            config_error: Mutex::new(None),
            snapshot: Mutex::new(snapshot),
            streams: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn failing(error: TransportError) -> Arc<Self> {
        let hub = Self::new(HUB_A, "Home", snapshot(Vec::new()));
        *hub.config_error.lock() = Some(error);
        hub
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    fn set_nodes(&self, nodes: Vec<NodeDescriptor>) {
        self.snapshot.lock().nodes.nodes = nodes;
    }

    fn push_frame(&self, frame: &str) {
        for stream in self.streams.lock().iter() {
            let _ = stream.send(Ok(Bytes::copy_from_slice(frame.as_bytes())));
        }
    }
}

struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Result<Bytes, TransportError>>,
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        self.rx.recv().await.transpose()
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}

#[async_trait]
impl HubTransport for FakeHub {
    async fn fetch_config(&self) -> Result<HubInfo, TransportError> {
        match self.config_error.lock().clone() {
            Some(error) => Err(error),
            None => Ok(self.info.clone()),
        }
    }

    async fn fetch_snapshot(&self) -> Result<HubSnapshot, TransportError> {
        let mut snapshot = self.snapshot.lock().clone();
        snapshot.fetched_at = Utc::now();
        Ok(snapshot)
    }

    async fn open_stream(&self) -> Result<Box<dyn EventSource>, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().push(tx);
        Ok(Box::new(ChannelSource { rx }))
    }

    async fn send(&self, frame: &CommandFrame) -> Result<Ack, TransportError> {
        let path = frame.encode();
        self.sent.lock().push(path.clone());
        Ok(Ack { status: 200, path })
    }

    async fn query_parameter(
        &self,
        _address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue, TransportError> {
        Ok(ZWaveParameterValue {
            parameter,
            value: 600,
            size: 2,
        })
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn property(id: &str, raw: i64, uom: &str) -> NodeProperty {
    NodeProperty {
        id: id.to_string(),
        value: Some(FixedPoint::integer(raw)),
        formatted: None,
        uom: Some(uom.to_string()),
        precision: 0,
    }
}

fn insteon(address: &str, name: &str, type_code: &str) -> NodeDescriptor {
    NodeDescriptor {
        address: address.to_string(),
        name: name.to_string(),
        parent: None,
        primary: None,
        family: None,
        protocol: Protocol::Insteon,
        node_def_id: None,
        type_code: Some(type_code.to_string()),
        zwave_category: None,
        enabled: true,
        flag: 128,
        properties: vec![property("ST", 0, "100")],
    }
}

fn dimmer(address: &str) -> NodeDescriptor {
    insteon(address, "Porch", "1.32.65.0")
}

fn relay(address: &str) -> NodeDescriptor {
    insteon(address, "Garage", "2.42.67.0")
}

fn fan() -> NodeDescriptor {
    insteon("4A 2B 3C 2", "Ceiling Fan", "1.46.69.0")
}

fn thermostat() -> NodeDescriptor {
    NodeDescriptor {
        properties: vec![property("ST", 140, "101"), property("CLISPH", 136, "101")],
        ..insteon("3A 2B 3C 1", "Hall", "5.11.16.0")
    }
}

fn zwave_lock() -> NodeDescriptor {
    NodeDescriptor {
        protocol: Protocol::ZWave,
        type_code: None,
        zwave_category: Some("111".to_string()),
        properties: vec![property("ST", 100, "11")],
        ..insteon("ZW002_1", "Front Door", "")
    }
}

fn program(id: &str, name: &str, parent: Option<&str>, folder: bool) -> ProgramDescriptor {
    ProgramDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.map(str::to_string),
        is_folder: folder,
        status: Some(false),
        enabled: Some(true),
        run_at_startup: Some(false),
        running: ProgramRunning::Idle,
        last_run: None,
        last_finished: None,
        next_scheduled: None,
    }
}

fn variable(var_type: VariableType, id: u32, name: &str) -> VariableDescriptor {
    VariableDescriptor {
        var_type,
        id,
        name: name.to_string(),
        value: 125,
        init: 0,
        precision: 1,
        timestamp: None,
    }
}

fn snapshot(nodes: Vec<NodeDescriptor>) -> HubSnapshot {
    HubSnapshot {
        nodes: NodeTree {
            nodes,
            ..Default::default()
        },
        programs: ProgramList::default(),
        variables: Vec::new(),
        network_resources: Vec::new(),
        fetched_at: Utc::now(),
    }
}

fn home() -> HubSnapshot {
    let mut snap = snapshot(vec![
        dimmer("1A 2B 3C 1"),
        relay("2A 2B 3C 1"),
        thermostat(),
        fan(),
        zwave_lock(),
    ]);
    snap.programs.programs = vec![
        program("0001", "My Programs", None, true),
        program("0010", "HA.switch", Some("0001"), true),
        program("0011", "Sprinkler", Some("0010"), true),
        program("0012", "status", Some("0011"), false),
        program("0013", "actions", Some("0011"), false),
        program("0020", "Goodnight", Some("0001"), false),
    ];
    snap.variables = vec![
        variable(VariableType::State, 14, "Outdoor"),
        variable(VariableType::Integer, 3, "Mode"),
        variable(VariableType::State, 3, "Mode"),
    ];
    snap.network_resources = vec![NetworkResource {
        id: 7,
        name: "Garage Chime".to_string(),
    }];
    snap
}

async fn ready(system: &IsySystem, hub: &Arc<FakeHub>, options: HubOptions) -> isy_sdk::HubHandle {
    let handle = system
        .configure_with_transport(Arc::clone(hub) as Arc<dyn HubTransport>, options)
        .await
        .unwrap();
    system.wait_until_ready(&handle.id, READY).await.unwrap();
    handle
}

// ============================================================================
// Setup
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_configure_loads_the_full_snapshot() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    let handle = ready(&system, &hub, HubOptions::default()).await;

    assert_eq!(handle.id.as_str(), "0021b9021a2b");
    assert_eq!(system.hub_by_name("home").map(|h| h.id), Some(handle.id.clone()));
    assert_eq!(system.resolve_hub("Home").unwrap(), handle.id);

    let porch = system
        .query_state(&EntityId::node(&handle.id, "1A 2B 3C 1"))
        .unwrap();
    assert_eq!(porch.name(), "Porch");
    assert!(system.view().variable(&handle.id, VariableType::State, 14).is_some());

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_configuring_a_known_hub_returns_its_handle() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    let first = ready(&system, &hub, HubOptions::default()).await;
    let second = system
        .configure_with_transport(hub.clone(), HubOptions::default())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(system.hubs().len(), 1);
    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_setup_failures_register_nothing() {
    let system = IsySystem::new().unwrap();

    let rejected = assert_err!(
        system
            .configure_with_transport(FakeHub::failing(TransportError::Auth), HubOptions::default())
            .await
    );
    assert!(matches!(rejected, SdkError::Auth));

    let unreachable = assert_err!(
        system
            .configure_with_transport(
                FakeHub::failing(TransportError::Io("connection refused".into())),
                HubOptions::default(),
            )
            .await
    );
    assert!(matches!(unreachable, SdkError::Unreachable(_)));

    assert!(system.hubs().is_empty());
    assert_eq!(system.variables_hub(), None);
}

#[tokio::test(start_paused = true)]
async fn test_second_variable_hub_is_a_config_conflict() {
    let system = IsySystem::new().unwrap();
    let a = FakeHub::new(HUB_A, "Home", home());
    let b = FakeHub::new(HUB_B, "Barn", snapshot(vec![relay("9A 2B 3C 1")]));
    let handle_a = ready(&system, &a, HubOptions::default()).await;

    let conflict = system
        .configure_with_transport(b.clone(), HubOptions::default())
        .await;
    assert!(matches!(conflict, Err(SdkError::ConfigConflict(_))));
    assert_eq!(system.hubs().len(), 1);
    assert_eq!(system.variables_hub(), Some(handle_a.id.clone()));
    assert!(system.resolve_hub("Barn").is_err());

    // Opting out works, and unloading the owner frees the claim
    ready(&system, &b, HubOptions::default().with_variables(false)).await;
    assert_eq!(system.hubs().len(), 2);
    system.unload(&handle_a.id).await.unwrap();
    assert_eq!(system.variables_hub(), None);

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shared_hub_name_is_ambiguous() {
    let system = IsySystem::new().unwrap();
    let a = FakeHub::new(HUB_A, "Home", snapshot(vec![relay("AA AA AA 1")]));
    let b = FakeHub::new(HUB_B, "home ", snapshot(vec![relay("BB BB BB 1")]));
    let first = ready(&system, &a, HubOptions::default().with_variables(false)).await;
    let second = ready(&system, &b, HubOptions::default().with_variables(false)).await;

    match system.resolve_hub("Home") {
        Err(SdkError::AmbiguousTarget { candidates, .. }) => {
            assert_eq!(candidates, vec![first.id.to_string(), second.id.to_string()])
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(system.hub_by_name("Home").is_none());
    assert_eq!(system.resolve_hub(HUB_B).unwrap(), second.id);

    // Once one of them is gone the name is unique again
    system.unload(&first.id).await.unwrap();
    assert_eq!(system.resolve_hub("Home").unwrap(), second.id);
    assert_eq!(system.hub_by_name("HOME").map(|h| h.id), Some(second.id.clone()));

    system.unload(&second.id).await.unwrap();
    assert!(matches!(system.resolve_hub("Home"), Err(SdkError::UnknownTarget(_))));
    system.shutdown().await;
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_intents_are_checked_against_the_platform() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    let handle = ready(&system, &hub, HubOptions::default()).await;

    let ack = system
        .issue_intent(Target::address("1A 2B 3C 1"), Intent::TurnOn { level: Some(128) })
        .await
        .unwrap();
    assert_eq!(ack.status, 200);

    let garage = EntityId::node(&handle.id, "2A 2B 3C 1");
    let illegal = system
        .issue_intent(&garage, Intent::TurnOn { level: Some(128) })
        .await;
    assert!(matches!(illegal, Err(SdkError::InvalidCommand(_))));

    system
        .issue_intent(Target::address("4A 2B 3C 2"), Intent::SetFanSpeed(FanSpeed::High))
        .await
        .unwrap();
    system
        .issue_intent(
            Target::address("3A 2B 3C 1"),
            Intent::SetSetpoint {
                target: Setpoint::Heat,
                value: FixedPoint::integer(70),
            },
        )
        .await
        .unwrap();
    system
        .issue_intent(Target::address("ZW002_1"), Intent::Lock)
        .await
        .unwrap();
    system
        .issue_intent(EntityId::program(&handle.id, "0012"), Intent::TurnOff)
        .await
        .unwrap();

    assert_eq!(
        hub.sent(),
        vec![
            "/rest/nodes/1A%202B%203C%201/cmd/DON/128",
            "/rest/nodes/4A%202B%203C%202/cmd/DON/255",
            "/rest/nodes/3A%202B%203C%201/cmd/CLISPH/140",
            "/rest/nodes/ZW002_1/cmd/SECMD/1",
            "/rest/programs/0013/runElse",
        ]
    );
    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_and_ambiguous_targets() {
    let system = IsySystem::new().unwrap();
    let a = FakeHub::new(HUB_A, "Home", home());
    let b = FakeHub::new(HUB_B, "Barn", snapshot(vec![dimmer("1A 2B 3C 1")]));
    ready(&system, &a, HubOptions::default()).await;
    let barn = ready(&system, &b, HubOptions::default().with_variables(false)).await;

    let missing = system
        .issue_intent(Target::address("FF FF FF 1"), Intent::TurnOff)
        .await;
    assert!(matches!(missing, Err(SdkError::UnknownTarget(_))));

    let ambiguous = system
        .issue_intent(Target::address("1A 2B 3C 1"), Intent::TurnOff)
        .await;
    match ambiguous {
        Err(SdkError::AmbiguousTarget { candidates, .. }) => assert_eq!(candidates.len(), 2),
        other => panic!("unexpected {other:?}"),
    }

    system
        .issue_intent(Target::on_hub(barn.id.clone(), "1A 2B 3C 1"), Intent::TurnOff)
        .await
        .unwrap();
    assert_eq!(b.sent(), vec!["/rest/nodes/1A%202B%203C%201/cmd/DOF"]);
    assert!(a.sent().is_empty());

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_raw_commands_pass_through_unchecked() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    ready(&system, &hub, HubOptions::default()).await;

    let raw = RawCommand::new("DON")
        .with_value(FixedPoint::integer(900))
        .with_parameter("mode", "x");
    system
        .issue_command(Target::address("77 77 77 1"), isy_sdk::Command::Raw(raw))
        .await
        .unwrap();
    assert_eq!(hub.sent(), vec!["/rest/nodes/77%2077%2077%201/cmd/DON/900?mode=x"]);

    let out_of_range = system.set_ramp_rate(Target::address("1A 2B 3C 1"), 40).await;
    assert!(matches!(out_of_range, Err(SdkError::InvalidCommand(_))));
    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_variables_by_id_and_by_name() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    ready(&system, &hub, HubOptions::default()).await;

    system
        .set_variable(VariableTarget::named("Outdoor"), FixedPoint::new(131, 1), false)
        .await
        .unwrap();
    system
        .set_variable(VariableTarget::id(VariableType::State, 14), FixedPoint::integer(13), true)
        .await
        .unwrap();
    assert_eq!(
        hub.sent(),
        vec!["/rest/vars/set/2/14/131", "/rest/vars/init/2/14/130"]
    );

    let ambiguous = system
        .set_variable(VariableTarget::named("Mode"), FixedPoint::integer(1), false)
        .await;
    assert!(matches!(ambiguous, Err(SdkError::AmbiguousTarget { .. })));

    let unknown = system
        .set_variable(VariableTarget::named("Nope"), FixedPoint::integer(1), false)
        .await;
    assert!(matches!(unknown, Err(SdkError::UnknownTarget(_))));
    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_hub_level_operations() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    let handle = ready(&system, &hub, HubOptions::default()).await;

    system
        .program_command(ProgramTarget::named("Goodnight"), ProgramAction::RunThen)
        .await
        .unwrap();
    system
        .program_command(ProgramTarget::id("12".to_string()), ProgramAction::Disable)
        .await
        .unwrap();
    system
        .run_network_resource(ResourceTarget::named("Garage Chime"))
        .await
        .unwrap();
    system
        .rename_node(Target::address("2A 2B 3C 1"), "Garage Door")
        .await
        .unwrap();
    system
        .set_zwave_parameter(
            Target::address("ZW002_1"),
            ZWaveParameter {
                parameter: 3,
                value: 600,
                size: 2,
            },
        )
        .await
        .unwrap();
    let acks = system.system_query(None, None).await.unwrap();
    assert_eq!(acks.len(), 1);

    assert_eq!(
        hub.sent(),
        vec![
            "/rest/programs/0020/runThen",
            "/rest/programs/0012/disable",
            "/rest/networking/resources/7",
            "/rest/nodes/2A%202B%203C%201/change?name=Garage%20Door",
            "/rest/zwave/node/ZW002_1/config/set/3/600/2",
            "/rest/query",
        ]
    );

    let value = system
        .get_zwave_parameter(EntityId::node(&handle.id, "ZW002_1"), 3)
        .await
        .unwrap();
    assert_eq!(value.value, 600);

    let not_zwave = system.get_zwave_parameter(Target::address("1A 2B 3C 1"), 3).await;
    assert!(matches!(not_zwave, Err(SdkError::InvalidCommand(_))));
    let bad_size = system
        .set_zwave_parameter(
            Target::address("ZW002_1"),
            ZWaveParameter {
                parameter: 3,
                value: 1,
                size: 3,
            },
        )
        .await;
    assert!(matches!(bad_size, Err(SdkError::InvalidCommand(_))));
    system.shutdown().await;
}

// ============================================================================
// State and lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stream_events_reach_subscribers() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Home", home());
    let handle = ready(&system, &hub, HubOptions::default()).await;
    let mut changes = system.subscribe();

    hub.push_frame(
        r#"<Event seqnum="9" sid="uuid:1"><control>ST</control><action uom="100" prec="0">255</action><node>2A 2B 3C 1</node><eventInfo/><fmtAct>On</fmtAct></Event>"#,
    );

    let change = tokio::time::timeout(READY, changes.recv())
        .await
        .unwrap()
        .unwrap();
    let garage = EntityId::node(&handle.id, "2A 2B 3C 1");
    assert_eq!(change.entity_id, garage);
    assert_eq!(change.kind, ChangeKind::Updated);
    assert!(system.query_state(&garage).unwrap().is_on());
    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_reload_diffs_against_known_entities() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Barn", snapshot(vec![relay("AA AA AA 1"), relay("CC CC CC 1")]));
    let handle = ready(&system, &hub, HubOptions::default()).await;
    let id = |address: &str| EntityId::node(&handle.id, address);

    hub.set_nodes(vec![relay("AA AA AA 1"), relay("BB BB BB 1")]);
    let report = system.reload(&handle.id).await.unwrap();
    assert_eq!(report.added, vec![id("BB BB BB 1")]);
    assert_eq!(report.removed, vec![id("CC CC CC 1")]);
    assert_eq!(report.unchanged, vec![id("AA AA AA 1")]);

    hub.set_nodes(vec![relay("BB BB BB 1"), relay("DD DD DD 1")]);
    let report = system.cleanup_entities(&handle.id).await.unwrap();
    assert!(report.added.is_empty());
    assert_eq!(report.removed, vec![id("AA AA AA 1")]);
    assert!(system.query_state(&id("DD DD DD 1")).is_err());

    system.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unload_removes_entities_and_notifies_listeners() {
    let system = IsySystem::new().unwrap();
    let hub = FakeHub::new(HUB_A, "Barn", snapshot(vec![relay("AA AA AA 1")]));
    let handle = ready(&system, &hub, HubOptions::default()).await;

    let removed: Arc<Mutex<Vec<ChangeNotification>>> = Arc::default();
    let seen = Arc::clone(&removed);
    system.add_listener(move |change: &ChangeNotification| {
        if change.kind == ChangeKind::Removed {
            seen.lock().push(change.clone());
        }
    });

    assert_eq!(system.unload(&handle.id).await.unwrap(), 1);
    assert_eq!(removed.lock().len(), 1);
    assert!(system.view().entities(None).is_empty());
    assert!(system.hub(&handle.id).is_none());

    let gone = system.unload(&handle.id).await;
    assert!(matches!(gone, Err(SdkError::UnknownTarget(_))));
    system.shutdown().await;
}
