//! ISY Entity State
//!
//! Classifies hub nodes, scenes, variables and program folders into
//! entities and keeps their state current as events stream in.
//!
//! # Architecture
//!
//! ```text
//! HubConnection → StoreSink → InboundQueue → StateWorker → EntityStore
//!                                                ↓             ↓
//!                                          ChangeListener   StateView
//! ```
//!
//! The store has a single writer. Every snapshot or event is applied and
//! published as one unit, so a [`StateView`] never shows half an update.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use isy_state::{HubSettings, StateWorker, StoreConfig};
//!
//! let worker = StateWorker::spawn(StoreConfig::default())?;
//! worker.register_hub(hub_id.clone(), HubSettings::default())?;
//! let connection = HubConnection::start(hub_id, client, transport, config, worker.sink());
//!
//! let mut changes = worker.subscribe();
//! while let Ok(change) = changes.recv().await {
//!     println!("{} {:?}", change.entity_id, change.kind);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod uom;
pub mod view;
pub mod worker;

mod derive;
mod import;
mod pending;

// ============================================================================
// Re-exports
// ============================================================================

pub use classifier::{Classifier, EntityClass, NodeClass};
pub use config::{ClassifierOptions, HubSettings, StoreConfig};
pub use model::{
    state, AttributeValue, Attributes, ChangeKind, ChangeNotification, DeviceClass, EntityId,
    EntityKey, EntityRecord, EntitySource, HubId, Platform, ProgramKey, ProgramRecord,
    ReconcileMode, ReconcileReport, SubNodeRole, UnitInfo, VariableKey, VariableRecord,
};
pub use store::{EntityStore, Reconciled};
pub use view::StateView;
pub use worker::{ChangeListener, ListenerId, StateWorker, StoreInput, StoreSink};

pub use error::{Result, StoreError};

pub use logging::{init_logging, init_logging_from_env, init_silent, LoggingError, LoggingMode};
