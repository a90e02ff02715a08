//! Connection state and hub identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol session state of one hub connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    /// Credentials accepted, full-state query in progress
    Authenticated,
    /// Snapshot delivered, events flowing
    Streaming,
    /// Waiting out a backoff delay after a failure
    Reconnecting,
    /// Credentials rejected. Terminal.
    ConfigInvalid,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::ConfigInvalid)
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Authenticated => "authenticated",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::ConfigInvalid => "config_invalid",
        };
        f.write_str(name)
    }
}

/// Identity of one hub: its uuid with separators removed, lower-cased
///
/// `00:21:b9:02:1a:2b` becomes `0021b9021a2b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HubId(String);

impl HubId {
    pub fn new(uuid: &str) -> Self {
        Self(
            uuid.chars()
                .filter(|c| !matches!(c, ':' | '-' | ' ' | '.'))
                .flat_map(char::to_lowercase)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HubId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
