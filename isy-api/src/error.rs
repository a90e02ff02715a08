use isy_parser::ParseError;
use rest_client::RestError;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors from hub queries and commands
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, DNS failure, TLS failure or a non-HTTP answer.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The hub rejected the credentials
    #[error("Authentication rejected")]
    Unauthorized,

    #[error("Request timed out")]
    Timeout,

    /// The hub answered with a payload we could not decode
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The hub answered but refused the command
    #[error("Hub rejected command: status {0}")]
    Rejected(u16),

    /// The addressed object does not exist on the hub
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid parameter value
    ///
    /// Raised before anything is sent: level out of range, bad parameter
    /// size, malformed command code.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// Whether retrying the same call could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::NetworkError(_) | ApiError::Timeout)
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

impl From<RestError> for ApiError {
    fn from(error: RestError) -> Self {
        match error {
            RestError::Network(msg) => ApiError::NetworkError(msg),
            RestError::Unauthorized => ApiError::Unauthorized,
            RestError::Parse(msg) => ApiError::ParseError(msg),
            RestError::Rejected(code) => ApiError::Rejected(code),
            RestError::Timeout => ApiError::Timeout,
            RestError::InvalidEndpoint(msg) => ApiError::InvalidEndpoint(msg),
            RestError::NotFound(path) => ApiError::NotFound(path),
        }
    }
}

impl From<ParseError> for ApiError {
    fn from(error: ParseError) -> Self {
        ApiError::ParseError(error.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::InvalidParameter(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_error_conversion() {
        assert_eq!(ApiError::from(RestError::Unauthorized), ApiError::Unauthorized);
        assert_eq!(ApiError::from(RestError::Timeout), ApiError::Timeout);
        assert_eq!(ApiError::from(RestError::Rejected(404)), ApiError::Rejected(404));
        assert!(matches!(
            ApiError::from(RestError::Network("refused".to_string())),
            ApiError::NetworkError(_)
        ));
    }

    #[test]
    fn test_validation_error_conversion() {
        let err: ApiError = ValidationError::range_error("ramp_rate", 0, 31, 40).into();
        match err {
            ApiError::InvalidParameter(msg) => assert!(msg.contains("ramp_rate")),
            other => panic!("Expected InvalidParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_transient() {
        assert!(ApiError::Timeout.is_transient());
        assert!(!ApiError::Unauthorized.is_transient());
        assert!(!ApiError::Rejected(500).is_transient());
    }
}
