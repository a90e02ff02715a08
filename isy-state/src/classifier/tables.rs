//! Classification tables
//!
//! One filter per platform, consulted in [`Platform::ALL`] order. Insteon
//! types match by prefix; Z-Wave categories and units of measure by value.

use std::ops::RangeInclusive;

use crate::model::{DeviceClass, Platform};

pub(crate) struct PlatformFilter {
    pub platform: Platform,
    pub uom: &'static [RangeInclusive<u16>],
    /// Lower-cased state names of a `/`-separated uom list
    pub states: &'static [&'static str],
    pub node_def_id: &'static [&'static str],
    pub insteon_type: &'static [&'static str],
    pub zwave_cat: &'static [RangeInclusive<u16>],
}

pub(crate) static FILTERS: [PlatformFilter; 8] = [
    PlatformFilter {
        platform: Platform::BinarySensor,
        uom: &[],
        states: &[],
        node_def_id: &[
            "BinaryAlarm",
            "BinaryAlarm_ADV",
            "BinaryControl",
            "BinaryControl_ADV",
            "EZIO2x4_Input",
            "EZRAIN_Input",
            "OnOffControl",
            "OnOffControl_ADV",
        ],
        insteon_type: &["7.0.", "7.13.", "16."],
        zwave_cat: &[104..=104, 112..=112, 138..=138, 148..=179],
    },
    PlatformFilter {
        platform: Platform::Sensor,
        uom: &[
            1..=1,
            3..=10,
            12..=50,
            52..=65,
            69..=77,
            79..=79,
            82..=96,
        ],
        states: &[],
        node_def_id: &["IMETER_SOLO", "EZIO2x4_Input_ADV"],
        insteon_type: &["9.0.", "9.7."],
        zwave_cat: &[118..=118, 143..=143, 180..=184],
    },
    PlatformFilter {
        platform: Platform::Lock,
        uom: &[11..=11],
        states: &["locked", "unlocked"],
        node_def_id: &["DoorLock"],
        insteon_type: &["15.", "4.64."],
        zwave_cat: &[111..=111],
    },
    PlatformFilter {
        platform: Platform::Fan,
        uom: &[],
        states: &["off", "low", "med", "high"],
        node_def_id: &["FanLincMotor"],
        insteon_type: &["1.46."],
        zwave_cat: &[],
    },
    PlatformFilter {
        platform: Platform::Cover,
        uom: &[97..=97],
        states: &["open", "closed", "closing", "opening", "stopped"],
        node_def_id: &[],
        insteon_type: &[],
        zwave_cat: &[],
    },
    PlatformFilter {
        platform: Platform::Light,
        uom: &[51..=51],
        states: &["on", "off", "%"],
        node_def_id: &[
            "BallastRelayLampSwitch",
            "BallastRelayLampSwitch_ADV",
            "DimmerLampOnly",
            "DimmerLampSwitch",
            "DimmerLampSwitch_ADV",
            "DimmerSwitchOnly",
            "DimmerSwitchOnly_ADV",
        ],
        insteon_type: &["1."],
        zwave_cat: &[109..=109, 119..=119],
    },
    PlatformFilter {
        platform: Platform::Switch,
        uom: &[2..=2, 78..=78],
        states: &["on", "off"],
        node_def_id: &[
            "AlertModuleArmed",
            "AlertModuleSiren",
            "AlertModuleSiren_ADV",
            "EZIO2x4_Output",
            "EZRAIN_Output",
            "KeypadButton",
            "KeypadButton_ADV",
            "KeypadRelay",
            "KeypadRelay_ADV",
            "RelayLampOnly",
            "RelayLampOnly_ADV",
            "RelayLampSwitch",
            "RelayLampSwitch_ADV",
            "RelaySwitchOnlyPlusQuery",
            "RelaySwitchOnlyPlusQuery_ADV",
            "Siren",
            "Siren_ADV",
            "X10",
        ],
        insteon_type: &["2.", "7.3.255.", "9.10.", "9.11.", "113."],
        zwave_cat: &[121..=123, 137..=137, 141..=141, 147..=147],
    },
    PlatformFilter {
        platform: Platform::Climate,
        uom: &[2..=2],
        states: &["heating", "cooling", "idle", "fan_only", "off"],
        node_def_id: &["TempLinc", "Thermostat"],
        insteon_type: &["4.8", "5."],
        zwave_cat: &[140..=140],
    },
];

/// Input-only remote buttons. They must never become switches.
pub(crate) const OVERRIDE_NODE_DEF_ID: &[(&str, Platform)] = &[
    ("RemoteLinc2", Platform::BinarySensor),
    ("RemoteLinc2_ADV", Platform::BinarySensor),
];

pub(crate) const OVERRIDE_INSTEON_TYPE: &[(&str, Platform)] = &[
    ("0.16.", Platform::BinarySensor),
    ("0.17.", Platform::BinarySensor),
    ("0.18.", Platform::BinarySensor),
];

pub(crate) const INSTEON_DEVICE_CLASSES: &[(DeviceClass, &[&str])] = &[
    (DeviceClass::Moisture, &["16.8.", "16.13.", "16.14."]),
    (
        DeviceClass::Opening,
        &["16.9.", "16.6.", "16.7.", "16.2.", "16.17.", "16.20.", "16.21."],
    ),
    (DeviceClass::Motion, &["16.1.", "16.4.", "16.5.", "16.3.", "16.22."]),
];

pub(crate) const ZWAVE_DEVICE_CLASSES: &[(DeviceClass, &[u16])] = &[
    (DeviceClass::Safety, &[137, 172, 176, 177, 178]),
    (DeviceClass::Smoke, &[138, 156]),
    (DeviceClass::Problem, &[148, 149, 157, 158, 164, 174, 175]),
    (DeviceClass::Gas, &[150, 151]),
    (DeviceClass::Sound, &[153]),
    (DeviceClass::Cold, &[152, 168]),
    (DeviceClass::Heat, &[154, 166, 167]),
    (DeviceClass::Moisture, &[159, 169]),
    (DeviceClass::Door, &[160]),
    (DeviceClass::Battery, &[162]),
    (DeviceClass::Motion, &[155]),
    (DeviceClass::Vibration, &[173]),
];

/// Insteon motion sensors I and II, whose sub-nodes carry distinct roles
pub(crate) const INSTEON_MOTION_TYPES: &[&str] = &["16.1.", "16.22."];

/// Status units and state lists that make a sensor-named node binary
pub(crate) const BINARY_SENSOR_UOMS: &[u16] = &[2, 78];
pub(crate) const BINARY_SENSOR_STATES: &[&str] = &["on", "off"];

pub(crate) const TYPE_CATEGORY_CLIMATE: &str = "5.";
pub(crate) const TYPE_CATEGORY_SENSOR_ACTUATOR: &str = "7.";
pub(crate) const TYPE_EZIO2X4: &str = "7.3.255.";

pub(crate) const SUBNODE_FANLINC_LIGHT: u32 = 1;
pub(crate) const SUBNODE_IOLINC_RELAY: u32 = 2;
pub(crate) const SUBNODE_CLIMATE_COOL: u32 = 2;
pub(crate) const SUBNODE_CLIMATE_HEAT: u32 = 3;
pub(crate) const SUBNODE_NEGATIVE: u32 = 2;
pub(crate) const SUBNODE_HEARTBEAT: u32 = 4;
pub(crate) const SUBNODE_DUSK_DAWN: u32 = 2;
pub(crate) const SUBNODE_LOW_BATTERY: u32 = 3;
pub(crate) const SUBNODE_EZIO2X4_SENSORS: RangeInclusive<u32> = 9..=12;
/// Reported as `A` or as `10`, depending on firmware
pub(crate) const SUBNODE_TAMPER: [u32; 2] = [0x0A, 0x10];
pub(crate) const SUBNODE_MOTION_DISABLED: [u32; 2] = [0x0D, 0x13];
