//! Parameter validation for outbound commands

use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Parameter '{parameter}' value '{value}' is out of range ({min}..={max})")]
    RangeError {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },

    #[error("Parameter '{parameter}' value '{value}' is invalid: {reason}")]
    InvalidValue {
        parameter: String,
        value: String,
        reason: String,
    },

    #[error("Required parameter '{parameter}' is missing")]
    MissingParameter { parameter: String },
}

impl ValidationError {
    pub fn range_error(parameter: &str, min: impl Display, max: impl Display, value: impl Display) -> Self {
        Self::RangeError {
            parameter: parameter.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn invalid_value(parameter: &str, value: impl Display, reason: &str) -> Self {
        Self::InvalidValue {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Types that check their own parameters before being sent
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Inclusive range check
pub fn check_range<T>(parameter: &str, value: T, min: T, max: T) -> Result<(), ValidationError>
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        return Err(ValidationError::range_error(parameter, min, max, value));
    }
    Ok(())
}

/// Command and property codes are short upper-case identifiers (`DON`, `CLISPH`, `GV1`).
pub fn check_code(parameter: &str, code: &str) -> Result<(), ValidationError> {
    if code.is_empty() {
        return Err(ValidationError::MissingParameter {
            parameter: parameter.to_string(),
        });
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::invalid_value(
            parameter,
            code,
            "expected upper-case letters, digits or '_'",
        ));
    }
    Ok(())
}
