//! One managed session per hub.
//!
//! A [`HubConnection`] owns a background task that walks the session
//! through `Connecting -> Authenticated -> Streaming`, falls back to
//! `Reconnecting` with exponential backoff on any failure, and parks in
//! `ConfigInvalid` when the hub rejects the credentials. Commands sent
//! while the session is down are buffered and replayed in order once it
//! is back.

use isy_api::{Ack, HubSnapshot, ZWaveParameterValue};
use isy_parser::CommandFrame;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Result, TransportError};
use crate::queue::EventSink;
use crate::state::{ConnectionState, HubId};
use crate::transport::{EventSource, HubTransport};

struct CommandRequest {
    frame: CommandFrame,
    reply: oneshot::Sender<Result<Ack>>,
    enqueued_at: Instant,
}

impl CommandRequest {
    fn fail(self, error: ConnectionError) {
        let _ = self.reply.send(Err(error));
    }
}

#[derive(Default)]
struct Counters {
    decode_errors: AtomicU64,
    reconnects: AtomicU64,
}

/// Handle to a managed hub session
pub struct HubConnection {
    hub: HubId,
    transport: Arc<dyn HubTransport>,
    config: ConnectionConfig,
    commands: mpsc::Sender<CommandRequest>,
    state: watch::Receiver<ConnectionState>,
    shutdown: watch::Sender<bool>,
    counters: Arc<Counters>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HubConnection {
    /// Validate `config` and spawn the session task
    pub fn start(
        hub: HubId,
        transport: Arc<dyn HubTransport>,
        sink: Arc<dyn EventSink>,
        config: ConnectionConfig,
    ) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let task = SessionTask {
            hub: hub.clone(),
            transport: Arc::clone(&transport),
            sink,
            backoff: Backoff::from_config(&config),
            commands: command_rx,
            pending: VecDeque::new(),
            inflight: JoinSet::new(),
            permits: Arc::new(Semaphore::new(config.command_concurrency)),
            state: state_tx,
            shutdown: shutdown_rx,
            counters: Arc::clone(&counters),
            config: config.clone(),
        };

        info!(hub = %hub, "Starting hub connection");
        let handle = tokio::spawn(task.run());

        Ok(Self {
            hub,
            transport,
            config,
            commands: command_tx,
            state: state_rx,
            shutdown: shutdown_tx,
            counters,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn hub_id(&self) -> &HubId {
        &self.hub
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`, up to `limit`
    pub async fn wait_for_state<F>(&self, predicate: F, limit: Duration) -> Option<ConnectionState>
    where
        F: Fn(ConnectionState) -> bool,
    {
        let mut rx = self.state.clone();
        let wait = async {
            loop {
                let current = *rx.borrow_and_update();
                if predicate(current) {
                    return Some(current);
                }
                if rx.changed().await.is_err() {
                    return None;
                }
            }
        };
        timeout(limit, wait).await.ok().flatten()
    }

    /// Send a command and wait for the hub's acknowledgement.
    ///
    /// While the session is down the command is buffered, bounded by
    /// `command_queue_capacity` and `reconnect_command_wait`.
    pub async fn send(&self, frame: CommandFrame) -> Result<Ack> {
        if self.state().is_terminal() {
            return Err(ConnectionError::Auth);
        }

        let (reply, response) = oneshot::channel();
        let request = CommandRequest {
            frame,
            reply,
            enqueued_at: Instant::now(),
        };

        self.commands.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                ConnectionError::ConnectionLost("command queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                ConnectionError::ConnectionLost("connection shut down".to_string())
            }
        })?;

        response
            .await
            .map_err(|_| ConnectionError::ConnectionLost("command abandoned".to_string()))?
    }

    /// Full-state query outside the session loop
    pub async fn fetch_snapshot(&self) -> Result<HubSnapshot> {
        timeout(self.config.setup_timeout, self.transport.fetch_snapshot())
            .await
            .map_err(|_| ConnectionError::CommandTimeout)?
            .map_err(ConnectionError::from)
    }

    pub async fn query_parameter(
        &self,
        address: &str,
        parameter: u16,
    ) -> Result<ZWaveParameterValue> {
        timeout(
            self.config.command_timeout,
            self.transport.query_parameter(address, parameter),
        )
        .await
        .map_err(|_| ConnectionError::CommandTimeout)?
        .map_err(ConnectionError::from)
    }

    /// Frames that failed to decode since start
    pub fn decode_errors(&self) -> u64 {
        self.counters.decode_errors.load(Ordering::Relaxed)
    }

    /// Reconnect attempts since start
    pub fn reconnect_attempts(&self) -> u64 {
        self.counters.reconnects.load(Ordering::Relaxed)
    }

    /// Stop the session. In-flight commands get `shutdown_grace` to finish;
    /// everything still queued fails with `ConnectionLost`.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(hub = %self.hub, error = %e, "Connection task failed");
            }
        }
    }
}

impl Drop for HubConnection {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// What ended a streaming session
enum StreamEnd {
    Shutdown,
    Failed(String),
}

struct SessionTask {
    hub: HubId,
    transport: Arc<dyn HubTransport>,
    sink: Arc<dyn EventSink>,
    config: ConnectionConfig,
    backoff: Backoff,
    commands: mpsc::Receiver<CommandRequest>,
    pending: VecDeque<CommandRequest>,
    inflight: JoinSet<()>,
    permits: Arc<Semaphore>,
    state: watch::Sender<ConnectionState>,
    shutdown: watch::Receiver<bool>,
    counters: Arc<Counters>,
}

impl SessionTask {
    async fn run(mut self) {
        loop {
            match self.connect_once().await {
                Ok(Some(source)) => match self.stream(source).await {
                    StreamEnd::Shutdown => break,
                    StreamEnd::Failed(reason) => {
                        warn!(hub = %self.hub, reason = %reason, "Event stream lost");
                    }
                },
                Ok(None) => break,
                Err(TransportError::Auth) => {
                    error!(hub = %self.hub, "Hub rejected credentials");
                    self.set_state(ConnectionState::ConfigInvalid);
                    self.reject_until_shutdown().await;
                    break;
                }
                Err(e) => {
                    warn!(hub = %self.hub, error = %e, "Connection attempt failed");
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            let delay = self.backoff.next_delay();
            self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
            info!(
                hub = %self.hub,
                attempt = self.backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Reconnecting after backoff"
            );
            if self.buffering(sleep(delay)).await.is_none() {
                break;
            }
        }

        self.finish().await;
    }

    /// Authenticate, open the stream and deliver a snapshot.
    /// `Ok(None)` means shutdown was requested.
    async fn connect_once(
        &mut self,
    ) -> std::result::Result<Option<Box<dyn EventSource>>, TransportError> {
        self.set_state(ConnectionState::Connecting);

        let transport = Arc::clone(&self.transport);
        let setup = self.config.setup_timeout;
        let config = async move {
            match timeout(setup, transport.fetch_config()).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            }
        };
        let info = match self.buffering(config).await {
            Some(result) => result?,
            None => return Ok(None),
        };
        debug!(hub = %self.hub, model = ?info.model, firmware = ?info.firmware, "Credentials accepted");
        self.set_state(ConnectionState::Authenticated);

        // Subscribe first so nothing between snapshot and stream is missed
        let transport = Arc::clone(&self.transport);
        let session = async move {
            let mut source = match transport.open_stream().await {
                Ok(source) => source,
                Err(e) => return Err(e),
            };
            match timeout(setup, transport.fetch_snapshot()).await {
                Ok(Ok(snapshot)) => Ok::<_, TransportError>((snapshot, source)),
                Ok(Err(e)) => {
                    source.close().await;
                    Err(e)
                }
                Err(_) => {
                    source.close().await;
                    Err(TransportError::Timeout)
                }
            }
        };
        let (snapshot, source) = match self.buffering(session).await {
            Some(result) => result?,
            None => return Ok(None),
        };

        info!(
            hub = %self.hub,
            nodes = snapshot.nodes.nodes.len(),
            programs = snapshot.programs.programs.len(),
            variables = snapshot.variables.len(),
            "Snapshot loaded"
        );
        self.sink.snapshot(&self.hub, snapshot);
        self.backoff.reset();
        self.set_state(ConnectionState::Streaming);
        self.replay_pending();

        Ok(Some(source))
    }

    async fn stream(&mut self, mut source: Box<dyn EventSource>) -> StreamEnd {
        let keepalive = sleep(self.config.keepalive_timeout);
        tokio::pin!(keepalive);

        let end = loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => break StreamEnd::Shutdown,

                frame = source.next_frame() => match frame {
                    Ok(Some(bytes)) => {
                        keepalive
                            .as_mut()
                            .reset(Instant::now() + self.config.keepalive_timeout);
                        match isy_parser::decode(&bytes) {
                            Ok(event) => self.sink.event(&self.hub, event),
                            Err(e) => {
                                let total = self.counters.decode_errors.fetch_add(1, Ordering::Relaxed) + 1;
                                warn!(hub = %self.hub, error = %e, decode_errors = total, "Discarding malformed event frame");
                            }
                        }
                    }
                    Ok(None) => break StreamEnd::Failed("stream closed by hub".to_string()),
                    Err(e) => break StreamEnd::Failed(e.to_string()),
                },

                _ = &mut keepalive => {
                    break StreamEnd::Failed("no traffic within keepalive timeout".to_string());
                }

                request = self.commands.recv() => match request {
                    Some(request) => self.dispatch(vec![request]),
                    None => break StreamEnd::Shutdown,
                },

                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    log_join(&self.hub, joined);
                }
            }
        };

        source.close().await;
        end
    }

    /// Drive `work` to completion while buffering commands and expiring
    /// those that waited too long. `None` if shutdown was requested first.
    async fn buffering<F: Future>(&mut self, work: F) -> Option<F::Output> {
        tokio::pin!(work);
        let max_wait = self.config.reconnect_command_wait;

        loop {
            let expiry = self
                .pending
                .front()
                .map(|oldest| oldest.enqueued_at + max_wait);

            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => return None,

                output = &mut work => return Some(output),

                request = self.commands.recv() => match request {
                    Some(request) => self.buffer(request),
                    None => return None,
                },

                _ = sleep_until(expiry.unwrap_or_else(Instant::now)), if expiry.is_some() => {
                    self.expire_pending();
                }

                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    log_join(&self.hub, joined);
                }
            }
        }
    }

    fn buffer(&mut self, request: CommandRequest) {
        if self.pending.len() >= self.config.command_queue_capacity {
            warn!(hub = %self.hub, command = %request.frame, "Command buffer full, rejecting command");
            request.fail(ConnectionError::ConnectionLost(
                "command queue full".to_string(),
            ));
            return;
        }
        debug!(hub = %self.hub, command = %request.frame, queued = self.pending.len() + 1, "Buffering command until reconnect");
        self.pending.push_back(request);
    }

    fn expire_pending(&mut self) {
        let max_wait = self.config.reconnect_command_wait;
        let now = Instant::now();
        while let Some(oldest) = self.pending.front() {
            if oldest.enqueued_at + max_wait > now {
                break;
            }
            if let Some(expired) = self.pending.pop_front() {
                warn!(hub = %self.hub, command = %expired.frame, "Command expired waiting for reconnect");
                expired.fail(ConnectionError::ConnectionLost(
                    "hub unavailable".to_string(),
                ));
            }
        }
    }

    fn replay_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let replay: Vec<_> = self.pending.drain(..).collect();
        info!(hub = %self.hub, commands = replay.len(), "Replaying buffered commands");
        self.dispatch(replay);
    }

    /// Execute requests in order on one worker
    fn dispatch(&mut self, requests: Vec<CommandRequest>) {
        let transport = Arc::clone(&self.transport);
        let permits = Arc::clone(&self.permits);
        let limit = self.config.command_timeout;

        self.inflight.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            for request in requests {
                let result = execute_with_retry(transport.as_ref(), &request.frame, limit).await;
                let _ = request.reply.send(result);
            }
        });
    }

    async fn reject_until_shutdown(&mut self) {
        for request in self.pending.drain(..) {
            request.fail(ConnectionError::Auth);
        }
        loop {
            tokio::select! {
                _ = shutdown_requested(&mut self.shutdown) => return,
                request = self.commands.recv() => match request {
                    Some(request) => request.fail(ConnectionError::Auth),
                    None => return,
                },
            }
        }
    }

    async fn finish(&mut self) {
        let grace = self.config.shutdown_grace;
        let inflight = &mut self.inflight;
        let drained = timeout(grace, async {
            while inflight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(hub = %self.hub, remaining = self.inflight.len(), "Aborting in-flight commands");
            self.inflight.abort_all();
        }

        self.commands.close();
        let mut abandoned = 0usize;
        for request in self.pending.drain(..) {
            request.fail(ConnectionError::ConnectionLost(
                "connection shut down".to_string(),
            ));
            abandoned += 1;
        }
        while let Ok(request) = self.commands.try_recv() {
            request.fail(ConnectionError::ConnectionLost(
                "connection shut down".to_string(),
            ));
            abandoned += 1;
        }
        if abandoned > 0 {
            debug!(hub = %self.hub, abandoned, "Failed queued commands on shutdown");
        }

        self.set_state(ConnectionState::Disconnected);
        info!(hub = %self.hub, "Hub connection stopped");
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(hub = %self.hub, from = %previous, to = %next, "Connection state changed");
            self.sink.state_changed(&self.hub, next);
        }
    }
}

/// Send once, retry once on timeout
async fn execute_with_retry(
    transport: &dyn HubTransport,
    frame: &CommandFrame,
    limit: Duration,
) -> Result<Ack> {
    for attempt in 1..=2u32 {
        match timeout(limit, transport.send(frame)).await {
            Ok(result) => return result.map_err(ConnectionError::from),
            Err(_) => warn!(command = %frame, attempt, "Command acknowledgement timed out"),
        }
    }
    Err(ConnectionError::CommandTimeout)
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

fn log_join(hub: &HubId, joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(hub = %hub, error = %e, "Command worker panicked");
        }
    }
}
