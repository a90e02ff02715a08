//! Error types for wire decoding

use thiserror::Error;

/// Errors that can occur while decoding hub payloads
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// XML could not be read at all
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// XML was well-formed but not the shape we expected
    #[error("Invalid XML structure: {0}")]
    InvalidXmlStructure(String),

    /// Missing required element
    #[error("Missing required element: {0}")]
    MissingRequiredElement(String),

    /// A field was present but its content is unusable
    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },

    /// A command path that does not match any known command shape
    #[error("Unrecognized command frame: {0}")]
    UnknownCommandFrame(String),
}

impl ParseError {
    pub(crate) fn invalid(field: &str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.into(),
        }
    }
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
