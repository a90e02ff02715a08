//! Store tuning and per-hub classification options

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::StoreError;

/// Naming conventions that steer classification.
///
/// Matching is case-insensitive substring matching against the node name
/// and its folder path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierOptions {
    /// Nodes and scenes carrying this string are not imported
    /// Default: `{IGNORE ME}`
    pub ignore_string: String,

    /// Nodes no table recognises become binary sensors or sensors when
    /// carrying this string
    /// Default: `sensor`
    pub sensor_string: String,

    /// Variables carrying this string in their name become sensor entities
    /// Default: `HA.`
    pub variable_sensor_string: String,

    /// Program folders named `{prefix}{platform}` hold program entities
    /// Default: `HA.`
    pub program_folder_prefix: String,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self {
            ignore_string: "{IGNORE ME}".to_string(),
            sensor_string: "sensor".to_string(),
            variable_sensor_string: "HA.".to_string(),
            program_folder_prefix: "HA.".to_string(),
        }
    }
}

impl ClassifierOptions {
    pub fn with_ignore_string(mut self, value: impl Into<String>) -> Self {
        self.ignore_string = value.into();
        self
    }

    pub fn with_sensor_string(mut self, value: impl Into<String>) -> Self {
        self.sensor_string = value.into();
        self
    }

    pub fn with_variable_sensor_string(mut self, value: impl Into<String>) -> Self {
        self.variable_sensor_string = value.into();
        self
    }

    pub fn with_program_folder_prefix(mut self, value: impl Into<String>) -> Self {
        self.program_folder_prefix = value.into();
        self
    }

    pub fn is_ignored(&self, name: &str, folder_path: &str) -> bool {
        contains(name, &self.ignore_string) || contains(folder_path, &self.ignore_string)
    }

    pub fn is_sensor_named(&self, name: &str, folder_path: &str) -> bool {
        contains(name, &self.sensor_string) || contains(folder_path, &self.sensor_string)
    }

    /// An empty marker exposes every variable
    pub fn is_variable_sensor(&self, name: &str) -> bool {
        self.variable_sensor_string.is_empty() || contains(name, &self.variable_sensor_string)
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// What the store needs to know about a hub before its first snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HubSettings {
    pub options: ClassifierOptions,
    /// Whether variable records and events are tracked for this hub
    pub variables_enabled: bool,
}

impl HubSettings {
    pub fn new(options: ClassifierOptions, variables_enabled: bool) -> Self {
        Self {
            options,
            variables_enabled,
        }
    }
}

/// Tuning for the entity store and its worker
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// How long events for not-yet-known addresses are held
    /// Default: 30 seconds
    pub pending_ttl: Duration,

    /// Events held per unknown address; older ones are dropped first
    /// Default: 32
    pub pending_per_address: usize,

    /// Silence after which a heartbeat entity reports a problem
    /// Default: 25 hours
    pub heartbeat_timeout: Duration,

    /// Capacity of the broadcast channel for change notifications
    /// Default: 1000
    pub change_buffer: usize,

    /// Capacity of the worker's inbound queue
    /// Default: 1000
    pub queue_capacity: usize,

    /// Period of the heartbeat check
    /// Default: 60 seconds
    pub heartbeat_check_interval: Duration,

    /// Period of the pending-event sweep
    /// Default: 5 seconds
    pub pending_sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(30),
            pending_per_address: 32,
            heartbeat_timeout: Duration::from_secs(25 * 60 * 60),
            change_buffer: 1000,
            queue_capacity: 1000,
            heartbeat_check_interval: Duration::from_secs(60),
            pending_sweep_interval: Duration::from_secs(5),
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.change_buffer == 0 || self.queue_capacity == 0 {
            return Err(StoreError::InvalidConfig(
                "Channel capacities must be greater than 0".to_string(),
            ));
        }

        if self.pending_per_address == 0 {
            return Err(StoreError::InvalidConfig(
                "Pending events per address must be greater than 0".to_string(),
            ));
        }

        if self.heartbeat_check_interval.is_zero() || self.pending_sweep_interval.is_zero() {
            return Err(StoreError::InvalidConfig(
                "Sweep intervals must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_pending(mut self, ttl: Duration, per_address: usize) -> Self {
        self.pending_ttl = ttl;
        self.pending_per_address = per_address;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_change_buffer(mut self, capacity: usize) -> Self {
        self.change_buffer = capacity;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
