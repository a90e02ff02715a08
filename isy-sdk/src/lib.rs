//! # ISY SDK - Multi-hub client for ISY994 controllers
//!
//! Connects to one or more hubs, mirrors their nodes, scenes, variables and
//! programs as typed entities, and sends commands that are checked against
//! each entity's platform before they reach the wire:
//!
//! ```rust,no_run
//! use isy_sdk::{Credentials, HubEndpoint, HubOptions, Intent, IsySystem, Target};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let system = IsySystem::new()?;
//!     let hub = system
//!         .configure(
//!             HubEndpoint::parse("http://192.168.1.10")?,
//!             Credentials::new("admin", "admin"),
//!             HubOptions::default(),
//!         )
//!         .await?;
//!     system.wait_until_ready(&hub.id, Duration::from_secs(30)).await?;
//!
//!     system
//!         .issue_intent(Target::address("12 34 56 1"), Intent::TurnOn { level: Some(128) })
//!         .await?;
//!
//!     let mut changes = system.subscribe();
//!     while let Ok(change) = changes.recv().await {
//!         println!("{} {:?} {:?}", change.entity_id, change.kind, change.attributes);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! isy-sdk (IsySystem: coordinator, dispatcher, reload)
//!     ↓
//! isy-state (classifier, entity store, worker)
//!     ↓
//! isy-stream (HubConnection per hub)
//!     ↓
//! isy-api / isy-parser / rest-client (REST + event codec)
//! ```

mod config;
mod coordinator;
mod dispatcher;
mod error;
mod system;
mod target;

pub use config::HubOptions;
pub use coordinator::HubHandle;
pub use dispatcher::{FanMode, FanSpeed, HvacMode, Intent, Setpoint};
pub use error::{Result, SdkError};
pub use system::IsySystem;
pub use target::{Named, ProgramTarget, ResourceTarget, Target, VariableTarget};

// Re-export commonly used types from the layers below
pub use isy_api::{
    Ack, Command, Credentials, HubEndpoint, NodeCommand, ProgramAction, RawCommand,
    ZWaveParameter, ZWaveParameterValue,
};
pub use isy_parser::{FixedPoint, HubInfo, VariableType};
pub use isy_state::{
    init_logging, init_logging_from_env, AttributeValue, ChangeKind, ChangeListener,
    ChangeNotification, ClassifierOptions, DeviceClass, EntityId, EntityRecord, ListenerId,
    Platform, ReconcileReport, StateView, StoreConfig,
};
pub use isy_stream::{ConnectionConfig, ConnectionState, HubId, HubTransport};
