//! Typed attribute values

use chrono::{DateTime, Utc};
use isy_parser::FixedPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attribute map of one entity, or the changed subset of one
pub type Attributes = BTreeMap<String, AttributeValue>;

/// State names used by derived `state` attributes
pub mod state {
    pub const ON: &str = "on";
    pub const OFF: &str = "off";
    pub const LOCKED: &str = "locked";
    pub const UNLOCKED: &str = "unlocked";
    pub const OPEN: &str = "open";
    pub const CLOSED: &str = "closed";
    pub const OPENING: &str = "opening";
    pub const CLOSING: &str = "closing";
    pub const STOPPED: &str = "stopped";
    pub const UNKNOWN: &str = "unknown";
    pub const PROBLEM: &str = "problem";
    pub const LOW: &str = "low";
    pub const MEDIUM: &str = "medium";
    pub const HIGH: &str = "high";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeValue {
    Bool(bool),
    Number(FixedPoint),
    Text(String),
    Time(DateTime<Utc>),
    /// The hub reported no value
    Unknown,
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Text(value.into())
    }

    pub fn integer(value: i64) -> Self {
        AttributeValue::Number(FixedPoint::integer(value))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<FixedPoint> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, AttributeValue::Unknown)
    }
}

impl From<Option<FixedPoint>> for AttributeValue {
    fn from(value: Option<FixedPoint>) -> Self {
        value.map_or(AttributeValue::Unknown, AttributeValue::Number)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Number(n) => write!(f, "{n}"),
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            AttributeValue::Unknown => f.write_str(state::UNKNOWN),
        }
    }
}
