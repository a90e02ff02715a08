//! Per-hub setup options

use isy_state::{ClassifierOptions, HubSettings};
use isy_stream::ConnectionConfig;

/// How one hub is brought into the system
#[derive(Debug, Clone, PartialEq)]
pub struct HubOptions {
    pub classifier: ClassifierOptions,

    /// Track variables for this hub. At most one configured hub may set it.
    /// Default: true
    pub enable_variables: bool,

    /// Connection tuning; `None` uses [`ConnectionConfig::default`]
    pub connection: Option<ConnectionConfig>,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            classifier: ClassifierOptions::default(),
            enable_variables: true,
            connection: None,
        }
    }
}

impl HubOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(mut self, classifier: ClassifierOptions) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_variables(mut self, enabled: bool) -> Self {
        self.enable_variables = enabled;
        self
    }

    pub fn with_connection(mut self, config: ConnectionConfig) -> Self {
        self.connection = Some(config);
        self
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        self.connection.clone().unwrap_or_default()
    }

    pub(crate) fn settings(&self) -> HubSettings {
        HubSettings::new(self.classifier.clone(), self.enable_variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults_enable_variables() {
        let options = HubOptions::default();
        assert!(options.enable_variables);
        assert_eq!(options.connection_config(), ConnectionConfig::default());
        assert!(options.settings().variables_enabled);
    }

    #[test]
    fn test_builder() {
        let options = HubOptions::new()
            .with_variables(false)
            .with_connection(ConnectionConfig::default().with_command_timeout(Duration::from_secs(3)));
        assert!(!options.settings().variables_enabled);
        assert_eq!(options.connection_config().command_timeout, Duration::from_secs(3));
    }
}
