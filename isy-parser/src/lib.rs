//! # isy-parser
//!
//! Wire codec for the ISY hub: decodes websocket event frames and REST
//! payloads into structured records, and encodes outbound command frames.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use isy_parser::{decode, EventKind};
//!
//! let event = decode(frame_bytes)?;
//! if let EventKind::Property(update) = event.kind {
//!     println!("{} {} = {:?}", update.address, update.property, update.value);
//! }
//! ```
//!
//! Decoding never panics. Malformed input is a [`ParseError`] the caller
//! logs and discards.

pub mod command;
pub mod common;
pub mod error;
pub mod event;
pub mod responses;

pub use command::{decode_command, CommandFrame, ProgramAction};
pub use common::FixedPoint;
pub use error::{ParseError, ParseResult};
pub use event::{
    decode, normalize_program_id, ControlEvent, EventKind, HubEvent, NodeChange,
    NodeChangeAction, ProgramUpdate, PropertyUpdate, SystemStatus, VariableUpdate,
};
pub use responses::{
    FolderDescriptor, GroupDescriptor, HubInfo, NetworkResource, NodeDescriptor, NodeProperty,
    NodeTree, ProgramDescriptor, ProgramList, ProgramRunning, Protocol, VariableDescriptor,
    VariableType,
};
