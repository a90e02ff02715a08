//! Error types for isy-state

use thiserror::Error;

/// Result type for isy-state operations
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The worker task has stopped or the reply was abandoned
    #[error("state worker is not running")]
    WorkerStopped,

    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}
