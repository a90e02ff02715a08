//! Session lifecycle against a scripted in-memory transport. All tests run
//! on paused time so backoff and timeouts advance instantly.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use isy_api::{Ack, HubSnapshot, ZWaveParameterValue};
use isy_parser::{CommandFrame, EventKind, HubEvent, HubInfo, NodeTree, ProgramList};
use isy_stream::{
    ConnectionConfig, ConnectionError, ConnectionState, EventSink, EventSource, HubConnection,
    HubId, HubTransport, TransportError,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

type FrameSender = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

const WAIT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq)]
enum SendMode {
    Ack,
    Hang,
    Reject(u16),
}

#[derive(Default)]
struct ScriptedTransport {
    config_failures: Mutex<VecDeque<TransportError>>,
    always_fail_config: Mutex<Option<TransportError>>,
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<Bytes, TransportError>>>>,
    send_mode: Mutex<Option<SendMode>>,
    sent: Mutex<Vec<String>>,
    config_calls: AtomicUsize,
    send_calls: AtomicUsize,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the next stream the transport will hand out
    fn add_stream(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().push_back(rx);
        tx
    }

    fn set_send_mode(&self, mode: SendMode) {
        *self.send_mode.lock() = Some(mode);
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
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
impl HubTransport for ScriptedTransport {
    async fn fetch_config(&self) -> Result<HubInfo, TransportError> {
        self.config_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.always_fail_config.lock().clone() {
            return Err(error);
        }
        if let Some(error) = self.config_failures.lock().pop_front() {
            return Err(error);
        }
        Ok(HubInfo {
            uuid: "00:21:b9:02:1a:2b".to_string(),
            name: "Test Hub".to_string(),
            model: Some("ISY994i".to_string()),
            firmware: Some("5.3.4".to_string()),
            platform: None,
            variables_supported: true,
        })
    }

    async fn fetch_snapshot(&self) -> Result<HubSnapshot, TransportError> {
        Ok(HubSnapshot {
            nodes: NodeTree::default(),
            programs: ProgramList::default(),
            variables: Vec::new(),
            network_resources: Vec::new(),
            fetched_at: Utc::now(),
        })
    }

    async fn open_stream(&self) -> Result<Box<dyn EventSource>, TransportError> {
        match self.streams.lock().pop_front() {
            Some(rx) => Ok(Box::new(ChannelSource { rx })),
            None => Err(TransportError::Io("connection refused".to_string())),
        }
    }

    async fn send(&self, frame: &CommandFrame) -> Result<Ack, TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.send_mode.lock().unwrap_or(SendMode::Ack);
        match mode {
            SendMode::Ack => {
                let path = frame.encode();
                self.sent.lock().push(path.clone());
                Ok(Ack { status: 200, path })
            }
            SendMode::Hang => std::future::pending().await,
            SendMode::Reject(code) => Err(TransportError::Rejected(code)),
        }
    }

    async fn query_parameter(
        &self,
        _address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue, TransportError> {
        Ok(ZWaveParameterValue {
            parameter,
            value: 1,
            size: 1,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Snapshot,
    Event(EventKind),
    State(ConnectionState),
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<Seen>>,
}

impl RecordingSink {
    fn snapshots(&self) -> usize {
        self.seen
            .lock()
            .iter()
            .filter(|s| matches!(s, Seen::Snapshot))
            .count()
    }

    fn events(&self) -> Vec<EventKind> {
        self.seen
            .lock()
            .iter()
            .filter_map(|s| match s {
                Seen::Event(kind) => Some(kind.clone()),
                _ => None,
            })
            .collect()
    }

    fn states(&self) -> Vec<ConnectionState> {
        self.seen
            .lock()
            .iter()
            .filter_map(|s| match s {
                Seen::State(state) => Some(*state),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn snapshot(&self, _hub: &HubId, _snapshot: HubSnapshot) {
        self.seen.lock().push(Seen::Snapshot);
    }

    fn event(&self, _hub: &HubId, event: HubEvent) {
        self.seen.lock().push(Seen::Event(event.kind));
    }

    fn state_changed(&self, _hub: &HubId, state: ConnectionState) {
        self.seen.lock().push(Seen::State(state));
    }
}

fn start(
    transport: &Arc<ScriptedTransport>,
    config: ConnectionConfig,
) -> (HubConnection, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let connection = HubConnection::start(
        HubId::new("00:21:b9:02:1a:2b"),
        transport.clone(),
        sink.clone(),
        config,
    )
    .unwrap();
    (connection, sink)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn query(address: &str) -> CommandFrame {
    CommandFrame::Query {
        address: Some(address.to_string()),
    }
}

const STATUS_FRAME: &str = r#"<Event seqnum="7" sid="uuid:1"><control>ST</control><action uom="100" prec="0">255</action><node>1A 2B 3C 1</node><eventInfo/></Event>"#;

#[tokio::test(start_paused = true)]
async fn test_snapshot_precedes_streaming_and_events() {
    let transport = ScriptedTransport::new();
    let frames = transport.add_stream();
    let (connection, sink) = start(&transport, ConnectionConfig::default());

    let state = connection
        .wait_for_state(|s| s == ConnectionState::Streaming, WAIT)
        .await;
    assert_eq!(state, Some(ConnectionState::Streaming));
    assert_eq!(
        sink.states(),
        vec![
            ConnectionState::Connecting,
            ConnectionState::Authenticated,
            ConnectionState::Streaming,
        ]
    );
    assert_eq!(sink.snapshots(), 1);

    frames.send(Ok(Bytes::from_static(STATUS_FRAME.as_bytes()))).unwrap();
    wait_until(|| sink.events().len() == 1).await;
    match &sink.events()[0] {
        EventKind::Property(update) => assert_eq!(update.address, "1A 2B 3C 1"),
        other => panic!("unexpected {:?}", other),
    }

    connection.shutdown().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_frames_do_not_end_the_session() {
    let transport = ScriptedTransport::new();
    let frames = transport.add_stream();
    let (connection, sink) = start(&transport, ConnectionConfig::default());
    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    frames.send(Ok(Bytes::from_static(b"<Event><control>"))).unwrap();
    frames.send(Ok(Bytes::from_static(b"not xml at all"))).unwrap();
    frames.send(Ok(Bytes::from_static(STATUS_FRAME.as_bytes()))).unwrap();

    wait_until(|| sink.events().len() == 1).await;
    assert_eq!(connection.decode_errors(), 2);
    assert_eq!(connection.state(), ConnectionState::Streaming);
    assert_eq!(connection.reconnect_attempts(), 0);

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stream_loss_reconnects_with_backoff() {
    let transport = ScriptedTransport::new();
    let first = transport.add_stream();
    let _second = transport.add_stream();
    let (connection, sink) = start(&transport, ConnectionConfig::default());
    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    let dropped_at = Instant::now();
    drop(first);

    connection
        .wait_for_state(|s| s == ConnectionState::Reconnecting, WAIT)
        .await
        .unwrap();
    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    assert!(dropped_at.elapsed() >= Duration::from_secs(1));
    assert_eq!(sink.snapshots(), 2);
    assert_eq!(connection.reconnect_attempts(), 1);
    assert_eq!(transport.config_calls.load(Ordering::SeqCst), 2);

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_backoff_grows_between_failed_attempts() {
    let transport = ScriptedTransport::new();
    {
        let mut failures = transport.config_failures.lock();
        for _ in 0..3 {
            failures.push_back(TransportError::Io("refused".to_string()));
        }
    }
    let _frames = transport.add_stream();
    let started = Instant::now();
    let (connection, _sink) = start(&transport, ConnectionConfig::default());

    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    // 1s + 2s + 4s
    assert!(started.elapsed() >= Duration::from_secs(7));
    assert_eq!(connection.reconnect_attempts(), 3);

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_silence_forces_reconnect() {
    let transport = ScriptedTransport::new();
    let _first = transport.add_stream();
    let _second = transport.add_stream();
    let config = ConnectionConfig::default().with_keepalive_timeout(Duration::from_secs(30));
    let (connection, sink) = start(&transport, config);

    wait_until(|| sink.snapshots() == 2).await;
    assert!(sink.states().contains(&ConnectionState::Reconnecting));

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_rejected_credentials_are_terminal() {
    let transport = ScriptedTransport::new();
    *transport.always_fail_config.lock() = Some(TransportError::Auth);
    let (connection, sink) = start(&transport, ConnectionConfig::default());

    let state = connection
        .wait_for_state(|s| s.is_terminal(), WAIT)
        .await;
    assert_eq!(state, Some(ConnectionState::ConfigInvalid));

    sleep(Duration::from_secs(300)).await;
    assert_eq!(transport.config_calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.snapshots(), 0);
    assert_eq!(connection.send(query("1A 2B 3C 1")).await, Err(ConnectionError::Auth));

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_commands_buffered_during_outage_replay_in_order() {
    let transport = ScriptedTransport::new();
    transport
        .config_failures
        .lock()
        .push_back(TransportError::Io("refused".to_string()));
    let _frames = transport.add_stream();
    let (connection, _sink) = start(&transport, ConnectionConfig::default());

    connection
        .wait_for_state(|s| s == ConnectionState::Reconnecting, WAIT)
        .await
        .unwrap();

    let (a, b, c) = tokio::join!(
        connection.send(query("A")),
        connection.send(query("B")),
        connection.send(query("C")),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(
        transport.sent(),
        vec!["/rest/query/A", "/rest/query/B", "/rest/query/C"]
    );

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_buffer_overflow_and_wait_limit_fail_with_connection_lost() {
    let transport = ScriptedTransport::new();
    *transport.always_fail_config.lock() = Some(TransportError::Io("refused".to_string()));
    let config = ConnectionConfig::default()
        .with_backoff(Duration::from_secs(60), Duration::from_secs(60))
        .with_command_queue(2, Duration::from_secs(5));
    let (connection, _sink) = start(&transport, config);

    connection
        .wait_for_state(|s| s == ConnectionState::Reconnecting, WAIT)
        .await
        .unwrap();

    let started = Instant::now();
    let (a, b, c) = tokio::join!(
        connection.send(query("A")),
        connection.send(query("B")),
        connection.send(query("C")),
    );

    for result in [&a, &b, &c] {
        assert!(matches!(result, Err(ConnectionError::ConnectionLost(_))));
    }
    assert_eq!(
        c,
        Err(ConnectionError::ConnectionLost("command queue full".to_string()))
    );
    assert_eq!(
        a,
        Err(ConnectionError::ConnectionLost("hub unavailable".to_string()))
    );
    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(transport.send_calls.load(Ordering::SeqCst), 0);

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_command_retries_once() {
    let transport = ScriptedTransport::new();
    let _frames = transport.add_stream();
    transport.set_send_mode(SendMode::Hang);
    let config = ConnectionConfig::default().with_command_timeout(Duration::from_secs(2));
    let (connection, _sink) = start(&transport, config);
    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    let started = Instant::now();
    let result = connection.send(query("1A 2B 3C 1")).await;

    assert_eq!(result, Err(ConnectionError::CommandTimeout));
    assert_eq!(transport.send_calls.load(Ordering::SeqCst), 2);
    assert!(started.elapsed() >= Duration::from_secs(4));

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_hub_rejection_surfaces_status() {
    let transport = ScriptedTransport::new();
    let _frames = transport.add_stream();
    transport.set_send_mode(SendMode::Reject(404));
    let (connection, _sink) = start(&transport, ConnectionConfig::default());
    connection
        .wait_for_state(|s| s.is_streaming(), WAIT)
        .await
        .unwrap();

    let result = connection.send(query("ZZ")).await;
    assert_eq!(result, Err(ConnectionError::Rejected(404)));

    connection.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_buffered_commands() {
    let transport = ScriptedTransport::new();
    *transport.always_fail_config.lock() = Some(TransportError::Io("refused".to_string()));
    let connection = Arc::new(start(&transport, ConnectionConfig::default()).0);
    connection
        .wait_for_state(|s| s == ConnectionState::Reconnecting, WAIT)
        .await
        .unwrap();

    let pending = {
        let connection = connection.clone();
        tokio::spawn(async move { connection.send(query("A")).await })
    };
    sleep(Duration::from_millis(100)).await;

    connection.shutdown().await;
    let result = pending.await.unwrap();
    assert!(matches!(result, Err(ConnectionError::ConnectionLost(_))));
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    let after = connection.send(query("B")).await;
    assert!(matches!(after, Err(ConnectionError::ConnectionLost(_))));
}

#[tokio::test(start_paused = true)]
async fn test_parameter_query_bypasses_session() {
    let transport = ScriptedTransport::new();
    *transport.always_fail_config.lock() = Some(TransportError::Io("refused".to_string()));
    let (connection, _sink) = start(&transport, ConnectionConfig::default());

    let value = connection.query_parameter("ZW002_1", 3).await.unwrap();
    assert_eq!(value.parameter, 3);

    connection.shutdown().await;
}

#[test]
fn test_invalid_config_is_rejected_at_start() {
    let config = ConnectionConfig {
        command_concurrency: 0,
        ..Default::default()
    };
    let result = HubConnection::start(
        HubId::new("hub"),
        ScriptedTransport::new(),
        Arc::new(RecordingSink::default()),
        config,
    );
    assert!(matches!(result, Err(ConnectionError::InvalidConfig(_))));
}
