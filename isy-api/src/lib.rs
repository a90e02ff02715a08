//! Typed ISY hub API
//!
//! Builds on the private `rest-client` crate: [`HubClient`] fetches and
//! decodes the hub's configuration, node tree, programs, variables and
//! network resources, and executes command frames. The command vocabulary
//! in [`commands`] validates parameters before anything reaches the wire.
//!
//! ```rust,ignore
//! use isy_api::{Command, HubClient, Validate};
//! use rest_client::{Credentials, HubEndpoint};
//!
//! let client = HubClient::new(HubEndpoint::parse("http://192.168.1.10")?, Credentials::new("admin", "admin"))?;
//! let snapshot = client.fetch_snapshot(true).await?;
//!
//! let command = Command::SetOnLevel(128);
//! command.validate()?;
//! client.execute(&command.to_frame("12 34 56 1")).await?;
//! ```

pub mod client;
pub mod commands;
pub mod error;
pub mod validation;

pub use client::{Ack, HubClient, HubSnapshot, ZWaveParameterValue};
pub use commands::{Command, NodeCommand, RawCommand, ZWaveParameter};
pub use error::{ApiError, Result};
pub use validation::{Validate, ValidationError};

pub use isy_parser::{CommandFrame, ProgramAction};
pub use rest_client::{Credentials, HubEndpoint};
