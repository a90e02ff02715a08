//! Background worker that owns the entity store
//!
//! Connections push into one bounded [`InboundQueue`]; a single tokio task
//! drains it, applies each input to the [`EntityStore`] and fans resulting
//! change notifications out to listeners and broadcast subscribers.

use chrono::Utc;
use isy_api::HubSnapshot;
use isy_parser::HubEvent;
use isy_stream::{ConnectionState, Droppable, EventSink, InboundQueue};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::{HubSettings, StoreConfig};
use crate::error::{Result, StoreError};
use crate::model::{ChangeNotification, HubId, ReconcileMode, ReconcileReport};
use crate::store::EntityStore;
use crate::view::StateView;

/// Work for the store task
#[derive(Debug)]
pub enum StoreInput {
    Register {
        hub: HubId,
        settings: HubSettings,
    },
    Snapshot {
        hub: HubId,
        snapshot: Box<HubSnapshot>,
        mode: ReconcileMode,
        reply: Option<oneshot::Sender<ReconcileReport>>,
    },
    Event {
        hub: HubId,
        event: Box<HubEvent>,
    },
    Connection {
        hub: HubId,
        state: ConnectionState,
    },
    RemoveHub {
        hub: HubId,
        reply: Option<oneshot::Sender<usize>>,
    },
    /// Answered once everything queued before it has been applied
    Barrier { reply: oneshot::Sender<()> },
}

impl Droppable for StoreInput {
    fn is_droppable(&self) -> bool {
        matches!(self, StoreInput::Event { .. })
    }
}

/// Connection-facing side of the worker queue
pub struct StoreSink {
    queue: InboundQueue<StoreInput>,
}

impl EventSink for StoreSink {
    fn snapshot(&self, hub: &HubId, snapshot: HubSnapshot) {
        self.queue.push(StoreInput::Snapshot {
            hub: hub.clone(),
            snapshot: Box::new(snapshot),
            mode: ReconcileMode::Full,
            reply: None,
        });
    }

    fn event(&self, hub: &HubId, event: HubEvent) {
        self.queue.push(StoreInput::Event {
            hub: hub.clone(),
            event: Box::new(event),
        });
    }

    fn state_changed(&self, hub: &HubId, state: ConnectionState) {
        self.queue.push(StoreInput::Connection {
            hub: hub.clone(),
            state,
        });
    }
}

/// Receives every change notification, in apply order, on the store task.
///
/// Implementations must not block.
pub trait ChangeListener: Send + Sync + 'static {
    fn on_change(&self, change: &ChangeNotification);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeNotification) + Send + Sync + 'static,
{
    fn on_change(&self, change: &ChangeNotification) {
        self(change)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listeners = Arc<RwLock<Vec<(ListenerId, Arc<dyn ChangeListener>)>>>;

pub struct StateWorker {
    queue: InboundQueue<StoreInput>,
    view: StateView,
    changes: broadcast::Sender<ChangeNotification>,
    listeners: Listeners,
    next_listener: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StateWorker {
    /// Start the store task on the current tokio runtime
    pub fn spawn(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let store = EntityStore::new(config.clone());
        let view = store.view();
        let queue = InboundQueue::new(config.queue_capacity);
        let (changes, _) = broadcast::channel(config.change_buffer);
        let listeners: Listeners = Arc::new(RwLock::new(Vec::new()));

        let task = tokio::spawn(run(
            store,
            queue.clone(),
            config,
            changes.clone(),
            Arc::clone(&listeners),
        ));

        Ok(Self {
            queue,
            view,
            changes,
            listeners,
            next_listener: AtomicU64::new(1),
            task: Mutex::new(Some(task)),
        })
    }

    /// Sink to hand to hub connections
    pub fn sink(&self) -> Arc<dyn EventSink> {
        Arc::new(StoreSink {
            queue: self.queue.clone(),
        })
    }

    pub fn view(&self) -> StateView {
        self.view.clone()
    }

    /// Change notifications from now on. A receiver that falls more than
    /// the change buffer behind observes `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.changes.subscribe()
    }

    pub fn add_listener(&self, listener: impl ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(listener, _)| *listener != id);
        listeners.len() != before
    }

    pub fn register_hub(&self, hub: HubId, settings: HubSettings) -> Result<()> {
        self.send(StoreInput::Register { hub, settings })
    }

    /// Queue one event as if a connection had delivered it
    pub fn apply_event(&self, hub: HubId, event: HubEvent) -> Result<()> {
        self.send(StoreInput::Event {
            hub,
            event: Box::new(event),
        })
    }

    /// Reconcile a snapshot and wait for the outcome
    pub async fn reconcile(
        &self,
        hub: HubId,
        snapshot: HubSnapshot,
        mode: ReconcileMode,
    ) -> Result<ReconcileReport> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreInput::Snapshot {
            hub,
            snapshot: Box::new(snapshot),
            mode,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| StoreError::WorkerStopped)
    }

    /// Forget a hub; returns how many entities were removed
    pub async fn remove_hub(&self, hub: HubId) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreInput::RemoveHub {
            hub,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| StoreError::WorkerStopped)
    }

    /// Wait until everything queued so far has been applied and published
    pub async fn flush(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreInput::Barrier { reply })?;
        rx.await.map_err(|_| StoreError::WorkerStopped)
    }

    /// Events discarded because the inbound queue was full
    pub fn dropped_events(&self) -> u64 {
        self.queue.dropped_count()
    }

    /// Stop accepting input, drain what is queued and wait for the task
    pub async fn shutdown(&self) {
        self.queue.close();
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn send(&self, input: StoreInput) -> Result<()> {
        if self.queue.push(input) {
            Ok(())
        } else {
            Err(StoreError::WorkerStopped)
        }
    }
}

impl Drop for StateWorker {
    fn drop(&mut self) {
        self.queue.close();
    }
}

async fn run(
    mut store: EntityStore,
    queue: InboundQueue<StoreInput>,
    config: StoreConfig,
    changes: broadcast::Sender<ChangeNotification>,
    listeners: Listeners,
) {
    info!("State worker started");

    let mut heartbeats = tokio::time::interval(config.heartbeat_check_interval);
    heartbeats.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sweep = tokio::time::interval(config.pending_sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let notifications = tokio::select! {
            input = queue.pop() => match input {
                Some(input) => handle(&mut store, input),
                None => break,
            },
            _ = heartbeats.tick() => store.check_heartbeats(Utc::now()),
            _ = sweep.tick() => {
                store.expire_pending(Utc::now());
                Vec::new()
            }
        };
        deliver(&listeners, &changes, notifications);
    }

    info!("State worker stopped");
}

fn handle(store: &mut EntityStore, input: StoreInput) -> Vec<ChangeNotification> {
    match input {
        StoreInput::Register { hub, settings } => {
            store.register_hub(hub, settings);
            Vec::new()
        }
        StoreInput::Snapshot {
            hub,
            snapshot,
            mode,
            reply,
        } => {
            let reconciled = store.apply_snapshot(&hub, &snapshot, mode);
            if let Some(reply) = reply {
                let _ = reply.send(reconciled.report);
            }
            reconciled.notifications
        }
        StoreInput::Event { hub, event } => store.apply_event(&hub, &event),
        StoreInput::Connection { hub, state } => {
            debug!(hub = %hub, state = %state, "Connection state changed");
            store.set_connection_state(&hub, state);
            Vec::new()
        }
        StoreInput::RemoveHub { hub, reply } => {
            let notifications = store.remove_hub(&hub, Utc::now());
            if let Some(reply) = reply {
                let _ = reply.send(notifications.len());
            }
            notifications
        }
        StoreInput::Barrier { reply } => {
            let _ = reply.send(());
            Vec::new()
        }
    }
}

fn deliver(
    listeners: &Listeners,
    changes: &broadcast::Sender<ChangeNotification>,
    notifications: Vec<ChangeNotification>,
) {
    if notifications.is_empty() {
        return;
    }
    let listeners: Vec<Arc<dyn ChangeListener>> = listeners
        .read()
        .iter()
        .map(|(_, listener)| Arc::clone(listener))
        .collect();
    for notification in notifications {
        for listener in &listeners {
            listener.on_change(&notification);
        }
        // No subscribers is fine
        let _ = changes.send(notification);
    }
}
