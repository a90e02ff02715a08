//! Platform kinds and device classes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity kind a node is exposed as. Fixed for the life of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Sensor,
    Lock,
    Fan,
    Cover,
    Light,
    Switch,
    Climate,
}

impl Platform {
    /// Table lookup order
    pub const ALL: [Platform; 8] = [
        Platform::BinarySensor,
        Platform::Sensor,
        Platform::Lock,
        Platform::Fan,
        Platform::Cover,
        Platform::Light,
        Platform::Switch,
        Platform::Climate,
    ];

    /// Platforms that programs can back
    pub const PROGRAMMABLE: [Platform; 5] = [
        Platform::BinarySensor,
        Platform::Lock,
        Platform::Fan,
        Platform::Cover,
        Platform::Switch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::BinarySensor => "binary_sensor",
            Platform::Sensor => "sensor",
            Platform::Lock => "lock",
            Platform::Fan => "fan",
            Platform::Cover => "cover",
            Platform::Light => "light",
            Platform::Switch => "switch",
            Platform::Climate => "climate",
        }
    }

    /// Whether the platform accepts on/off style commands
    pub fn is_controllable(&self) -> bool {
        !matches!(self, Platform::BinarySensor | Platform::Sensor)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown platform: {s}"))
    }
}

/// Refinement of a binary sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Battery,
    Cold,
    Door,
    Gas,
    Heat,
    Light,
    Moisture,
    Motion,
    Opening,
    Problem,
    Safety,
    Smoke,
    Sound,
    Vibration,
}

/// Role of an Insteon sub-node under a multi-node sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubNodeRole {
    /// Sends the parent's "off" as DON. Has no entity of its own.
    Negative,
    /// Beats periodically; silence means a low battery
    Heartbeat,
    DuskDawn,
    LowBattery,
    Tamper,
    MotionDisabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_names_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(platform.as_str().parse::<Platform>(), Ok(platform));
        }
        assert!("scene".parse::<Platform>().is_err());
    }
}
