//! # isy-stream
//!
//! Connection management for ISY hubs. Each hub gets a [`HubConnection`]
//! that authenticates, loads a full snapshot, subscribes to the event
//! websocket and keeps that session alive with backoff-driven reconnects.
//! Decoded events from every hub land in one shared [`InboundQueue`]
//! through an [`EventSink`].

mod backoff;
mod config;
mod connection;
mod error;
mod queue;
mod state;
mod transport;

pub use backoff::Backoff;
pub use config::ConnectionConfig;
pub use connection::HubConnection;
pub use error::{ConnectionError, Result, TransportError};
pub use queue::{Droppable, EventSink, InboundQueue};
pub use state::{ConnectionState, HubId};
pub use transport::{
    EventSource, HubTransport, IsyTransport, WebSocketSource, SUBSCRIBE_ORIGIN,
    SUBSCRIBE_PROTOCOL,
};
