use isy_api::{ApiError, ValidationError};
use isy_state::StoreError;
use isy_stream::{ConnectionError, TransportError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    /// Socket, DNS or HTTP failure talking to a hub
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// Credentials rejected; the hub must be reconfigured
    #[error("Authentication rejected by hub")]
    Auth,

    /// The hub could not be reached or did not answer at setup
    #[error("Hub unreachable: {0}")]
    Unreachable(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    /// A name matched more than one candidate
    #[error("Ambiguous target {name}: matches {candidates:?}")]
    AmbiguousTarget {
        name: String,
        candidates: Vec<String>,
    },

    #[error("Command timed out")]
    CommandTimeout,

    #[error("Configuration conflict: {0}")]
    ConfigConflict(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Illegal for the target's platform, or out of range
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Command rejected by hub: status {0}")]
    Rejected(u16),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State error: {0}")]
    State(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, SdkError>;

impl SdkError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SdkError::InvalidCommand(message.into())
    }

    pub(crate) fn unknown(target: impl std::fmt::Display) -> Self {
        SdkError::UnknownTarget(target.to_string())
    }
}

impl From<ConnectionError> for SdkError {
    fn from(error: ConnectionError) -> Self {
        match error {
            ConnectionError::Transport(transport) => transport.into(),
            ConnectionError::Auth => SdkError::Auth,
            ConnectionError::CommandTimeout => SdkError::CommandTimeout,
            ConnectionError::Rejected(code) => SdkError::Rejected(code),
            ConnectionError::ConnectionLost(reason) => SdkError::ConnectionLost(reason),
            ConnectionError::InvalidConfig(reason) => SdkError::InvalidConfig(reason),
        }
    }
}

impl From<TransportError> for SdkError {
    fn from(error: TransportError) -> Self {
        match error {
            TransportError::Io(msg) => SdkError::Transport(msg),
            TransportError::Auth => SdkError::Auth,
            TransportError::Parse(msg) => SdkError::ProtocolParse(msg),
            TransportError::Timeout => SdkError::CommandTimeout,
            TransportError::Rejected(code) => SdkError::Rejected(code),
            TransportError::NotFound(what) => SdkError::UnknownTarget(what),
            TransportError::Invalid(msg) => SdkError::InvalidCommand(msg),
        }
    }
}

impl From<ApiError> for SdkError {
    fn from(error: ApiError) -> Self {
        TransportError::from(error).into()
    }
}

impl From<ValidationError> for SdkError {
    fn from(error: ValidationError) -> Self {
        SdkError::InvalidCommand(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_map_onto_taxonomy() {
        assert!(matches!(
            SdkError::from(ConnectionError::Transport(TransportError::Parse("bad".into()))),
            SdkError::ProtocolParse(_)
        ));
        assert!(matches!(SdkError::from(ConnectionError::Auth), SdkError::Auth));
        assert!(matches!(
            SdkError::from(ConnectionError::Rejected(404)),
            SdkError::Rejected(404)
        ));
        assert!(matches!(
            SdkError::from(ApiError::NetworkError("refused".into())),
            SdkError::Transport(_)
        ));
    }

    #[test]
    fn test_validation_error_is_invalid_command() {
        let err = SdkError::from(ValidationError::range_error("on_level", 0, 255, 300));
        assert!(matches!(err, SdkError::InvalidCommand(_)));
    }
}
