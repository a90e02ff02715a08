//! Configuration for hub connections

use std::time::Duration;

use crate::error::ConnectionError;

/// Tuning for one [`HubConnection`](crate::HubConnection)
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// First reconnect delay
    /// Default: 1 second
    pub initial_backoff: Duration,

    /// Reconnect delay cap
    /// Default: 60 seconds
    pub max_backoff: Duration,

    /// Growth factor between consecutive reconnect delays
    /// Default: 2.0
    pub backoff_multiplier: f64,

    /// Capacity of the shared inbound event queue. When full the oldest
    /// events are dropped.
    /// Default: 1000
    pub inbound_queue_capacity: usize,

    /// Commands buffered while the connection is down
    /// Default: 64
    pub command_queue_capacity: usize,

    /// Time to wait for a command acknowledgement (retried once)
    /// Default: 10 seconds
    pub command_timeout: Duration,

    /// Longest a command may wait for a reconnect before failing
    /// Default: 30 seconds
    pub reconnect_command_wait: Duration,

    /// Budget for the initial configuration query at setup
    /// Default: 30 seconds
    pub setup_timeout: Duration,

    /// Silence on the event stream after which the session is considered
    /// dead. The hub heartbeats well inside this.
    /// Default: 300 seconds
    pub keepalive_timeout: Duration,

    /// Time in-flight commands get to finish on shutdown
    /// Default: 2 seconds
    pub shutdown_grace: Duration,

    /// Commands executed concurrently
    /// Default: 4
    pub command_concurrency: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            inbound_queue_capacity: 1000,
            command_queue_capacity: 64,
            command_timeout: Duration::from_secs(10),
            reconnect_command_wait: Duration::from_secs(30),
            setup_timeout: Duration::from_secs(30),
            keepalive_timeout: Duration::from_secs(300),
            shutdown_grace: Duration::from_secs(2),
            command_concurrency: 4,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect quickly; for hubs on a reliable local network
    pub fn fast_reconnect() -> Self {
        Self {
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(10),
            keepalive_timeout: Duration::from_secs(120),
            ..Default::default()
        }
    }

    /// Smaller buffers and serialized commands
    pub fn resource_efficient() -> Self {
        Self {
            inbound_queue_capacity: 200,
            command_queue_capacity: 16,
            command_concurrency: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConnectionError> {
        if self.initial_backoff.is_zero() {
            return Err(ConnectionError::InvalidConfig(
                "Initial backoff must be greater than 0".to_string(),
            ));
        }

        if self.initial_backoff > self.max_backoff {
            return Err(ConnectionError::InvalidConfig(
                "Invalid backoff: initial must not exceed max".to_string(),
            ));
        }

        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConnectionError::InvalidConfig(
                "Backoff multiplier must be a finite number >= 1".to_string(),
            ));
        }

        if self.inbound_queue_capacity == 0 {
            return Err(ConnectionError::InvalidConfig(
                "Inbound queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.command_queue_capacity == 0 {
            return Err(ConnectionError::InvalidConfig(
                "Command queue capacity must be greater than 0".to_string(),
            ));
        }

        if self.command_concurrency == 0 {
            return Err(ConnectionError::InvalidConfig(
                "Command concurrency must be greater than 0".to_string(),
            ));
        }

        if self.command_timeout.is_zero() || self.keepalive_timeout.is_zero() {
            return Err(ConnectionError::InvalidConfig(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builder pattern methods for fluent configuration

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_keepalive_timeout(mut self, timeout: Duration) -> Self {
        self.keepalive_timeout = timeout;
        self
    }

    pub fn with_command_queue(mut self, capacity: usize, max_wait: Duration) -> Self {
        self.command_queue_capacity = capacity;
        self.reconnect_command_wait = max_wait;
        self
    }

    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_queue_capacity = capacity;
        self
    }
}
