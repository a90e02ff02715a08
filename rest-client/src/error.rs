//! Error types for the REST client

use thiserror::Error;

/// Errors that can occur during REST communication
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestError {
    /// Connection, DNS or HTTP transport failure
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The hub rejected the credentials (HTTP 401)
    #[error("Authentication rejected by hub")]
    Unauthorized,

    /// Response body was not the XML we expected
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// The hub answered but reported failure
    #[error("Hub rejected request: status {0}")]
    Rejected(u16),

    #[error("Request timed out")]
    Timeout,

    /// The endpoint URL is unusable
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The addressed resource does not exist on the hub (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for RestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RestError::Timeout
        } else {
            RestError::Network(err.to_string())
        }
    }
}
