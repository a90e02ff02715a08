//! Error types for the isy-stream crate.

use isy_api::ApiError;

/// Failures talking to one hub over a [`HubTransport`](crate::HubTransport).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Socket, DNS, TLS or HTTP failure. Triggers a reconnect.
    #[error("I/O error: {0}")]
    Io(String),

    /// Credentials rejected. Terminal until reconfigured.
    #[error("Authentication rejected")]
    Auth,

    /// The hub sent something we could not decode
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timed out")]
    Timeout,

    /// The hub refused a command
    #[error("Rejected by hub: status {0}")]
    Rejected(u16),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The request itself was malformed
    #[error("Invalid request: {0}")]
    Invalid(String),
}

impl From<ApiError> for TransportError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::NetworkError(msg) => TransportError::Io(msg),
            ApiError::Unauthorized => TransportError::Auth,
            ApiError::Timeout => TransportError::Timeout,
            ApiError::ParseError(msg) => TransportError::Parse(msg),
            ApiError::Rejected(code) => TransportError::Rejected(code),
            ApiError::NotFound(what) => TransportError::NotFound(what),
            ApiError::InvalidParameter(msg) | ApiError::InvalidEndpoint(msg) => {
                TransportError::Invalid(msg)
            }
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match error {
            WsError::Http(response) if response.status().as_u16() == 401 => TransportError::Auth,
            WsError::Http(response) => TransportError::Rejected(response.status().as_u16()),
            WsError::Url(e) => TransportError::Invalid(e.to_string()),
            other => TransportError::Io(other.to_string()),
        }
    }
}

/// Errors surfaced by a [`HubConnection`](crate::HubConnection).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("Transport error: {0}")]
    Transport(TransportError),

    /// The connection is in the terminal credentials-rejected state
    #[error("Authentication rejected; reconfiguration required")]
    Auth,

    /// No acknowledgement after one retry
    #[error("Command timed out")]
    CommandTimeout,

    /// The hub refused the command
    #[error("Command rejected by hub: status {0}")]
    Rejected(u16),

    /// The command could not be delivered: queue overflow, reconnect wait
    /// exceeded, or connection shut down
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<TransportError> for ConnectionError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Auth => ConnectionError::Auth,
            TransportError::Rejected(code) => ConnectionError::Rejected(code),
            TransportError::Timeout => ConnectionError::CommandTimeout,
            other => ConnectionError::Transport(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
