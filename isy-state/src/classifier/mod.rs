//! Device classification
//!
//! Resolution order for a node:
//!
//! 1. override table (input-only remotes)
//! 2. generic tables: node definition, Insteon type, Z-Wave category,
//!    unit of measure, then state list
//! 3. the configured sensor string in the name or folder path
//! 4. fallback: a sensor exposing the raw value
//!
//! Insteon sub-nodes are then refined against their primary node: some
//! carry a distinct role (heartbeat, tamper...) and the "negative" sub-node
//! of door and leak sensors folds into its parent.

mod tables;

use isy_parser::{NodeDescriptor, Protocol};
use tracing::warn;

use crate::config::ClassifierOptions;
use crate::model::{DeviceClass, Platform, SubNodeRole};
use tables::*;

/// What a node becomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeClass {
    /// Not imported
    Ignored,
    /// Folds into `parent`: a DON here turns the parent off
    Negative { parent: String },
    Entity(EntityClass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityClass {
    pub platform: Platform,
    pub device_class: Option<DeviceClass>,
    pub role: Option<SubNodeRole>,
}

impl EntityClass {
    pub fn plain(platform: Platform) -> Self {
        Self {
            platform,
            device_class: None,
            role: None,
        }
    }
}

/// Classifies nodes for one hub
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    options: ClassifierOptions,
}

impl Classifier {
    pub fn new(options: ClassifierOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ClassifierOptions {
        &self.options
    }

    /// Full classification of a node.
    ///
    /// `primary` is the node's primary node when it is a sub-node;
    /// `folder_path` the folders it is filed under.
    pub fn classify_node(
        &self,
        node: &NodeDescriptor,
        primary: Option<&NodeDescriptor>,
        folder_path: &str,
    ) -> NodeClass {
        if self.options.is_ignored(&node.name, folder_path) {
            return NodeClass::Ignored;
        }

        let platform = classify_platform(node, folder_path, &self.options);
        if platform != Platform::BinarySensor {
            return NodeClass::Entity(EntityClass::plain(platform));
        }

        let device_class = binary_device_class(node);
        let sub_node = node.sub_node_id().filter(|id| node.is_sub_node() && *id > 1);
        let Some(sub_node) = sub_node else {
            return NodeClass::Entity(EntityClass {
                platform,
                device_class,
                role: None,
            });
        };

        self.classify_sub_node(node, primary, sub_node, device_class)
    }

    fn classify_sub_node(
        &self,
        node: &NodeDescriptor,
        primary: Option<&NodeDescriptor>,
        sub_node: u32,
        device_class: Option<DeviceClass>,
    ) -> NodeClass {
        let type_code = node.type_code.as_deref().unwrap_or_default();
        let entity = |device_class, role| {
            NodeClass::Entity(EntityClass {
                platform: Platform::BinarySensor,
                device_class,
                role,
            })
        };

        if type_code.starts_with(TYPE_CATEGORY_CLIMATE) {
            return match sub_node {
                SUBNODE_CLIMATE_COOL => entity(Some(DeviceClass::Cold), None),
                SUBNODE_CLIMATE_HEAT => entity(Some(DeviceClass::Heat), None),
                _ => entity(None, None),
            };
        }

        let needs_parent = matches!(
            device_class,
            Some(DeviceClass::Opening | DeviceClass::Moisture | DeviceClass::Motion)
        );
        let parent = match (needs_parent, primary) {
            (true, None) => {
                warn!(
                    address = %node.address,
                    primary = ?node.primary,
                    "Sub-node has no primary node; skipping"
                );
                return NodeClass::Ignored;
            }
            (_, parent) => parent,
        };

        match device_class {
            Some(DeviceClass::Opening | DeviceClass::Moisture) => match sub_node {
                SUBNODE_NEGATIVE => match parent {
                    Some(parent) => NodeClass::Negative {
                        parent: parent.address.clone(),
                    },
                    None => NodeClass::Ignored,
                },
                SUBNODE_HEARTBEAT => {
                    entity(Some(DeviceClass::Battery), Some(SubNodeRole::Heartbeat))
                }
                _ => NodeClass::Ignored,
            },
            Some(DeviceClass::Motion)
                if INSTEON_MOTION_TYPES.iter().any(|t| type_code.starts_with(t)) =>
            {
                match sub_node {
                    SUBNODE_DUSK_DAWN => {
                        entity(Some(DeviceClass::Light), Some(SubNodeRole::DuskDawn))
                    }
                    SUBNODE_LOW_BATTERY => {
                        entity(Some(DeviceClass::Battery), Some(SubNodeRole::LowBattery))
                    }
                    id if SUBNODE_TAMPER.contains(&id) => {
                        entity(Some(DeviceClass::Problem), Some(SubNodeRole::Tamper))
                    }
                    id if SUBNODE_MOTION_DISABLED.contains(&id) => {
                        entity(None, Some(SubNodeRole::MotionDisabled))
                    }
                    _ => entity(device_class, None),
                }
            }
            _ => entity(device_class, None),
        }
    }
}

/// Platform of a node, ignoring sub-node roles.
pub fn classify_platform(
    node: &NodeDescriptor,
    folder_path: &str,
    options: &ClassifierOptions,
) -> Platform {
    if let Some(platform) = override_platform(node) {
        return platform;
    }
    if let Some(platform) = code_table_platform(node) {
        return platform;
    }
    if options.is_sensor_named(&node.name, folder_path) {
        return if looks_binary(node) {
            Platform::BinarySensor
        } else {
            Platform::Sensor
        };
    }
    unit_table_platform(node).unwrap_or(Platform::Sensor)
}

fn override_platform(node: &NodeDescriptor) -> Option<Platform> {
    if let Some(node_def) = node.node_def_id.as_deref() {
        if let Some((_, platform)) = OVERRIDE_NODE_DEF_ID.iter().find(|(d, _)| *d == node_def) {
            return Some(*platform);
        }
    }
    let type_code = insteon_type(node)?;
    OVERRIDE_INSTEON_TYPE
        .iter()
        .find(|(prefix, _)| type_code.starts_with(prefix))
        .map(|(_, platform)| *platform)
}

/// Filter tables keyed by device identity
fn code_table_platform(node: &NodeDescriptor) -> Option<Platform> {
    if let Some(node_def) = node.node_def_id.as_deref() {
        if let Some(filter) = FILTERS.iter().find(|f| f.node_def_id.contains(&node_def)) {
            return Some(filter.platform);
        }
    }

    if let Some(type_code) = insteon_type(node) {
        if let Some(filter) = FILTERS
            .iter()
            .find(|f| f.insteon_type.iter().any(|t| type_code.starts_with(t)))
        {
            return Some(insteon_sub_node_platform(node, type_code, filter.platform));
        }
    }

    if let Some(category) = zwave_category(node) {
        if let Some(filter) = FILTERS
            .iter()
            .find(|f| f.zwave_cat.iter().any(|r| r.contains(&category)))
        {
            return Some(filter.platform);
        }
    }
    None
}

/// Filter tables keyed by the status unit, consulted after naming
fn unit_table_platform(node: &NodeDescriptor) -> Option<Platform> {
    if let Some(uom) = status_uom_id(node) {
        if let Some(filter) = FILTERS.iter().find(|f| f.uom.iter().any(|r| r.contains(&uom))) {
            return Some(filter.platform);
        }
    }

    let states = status_states(node)?;
    FILTERS
        .iter()
        .find(|f| !f.states.is_empty() && same_set(f.states, &states))
        .map(|f| f.platform)
}

/// Sub-nodes of some Insteon devices are a different kind than the device
fn insteon_sub_node_platform(node: &NodeDescriptor, type_code: &str, platform: Platform) -> Platform {
    let Some(sub_node) = node.sub_node_id() else {
        return platform;
    };
    match platform {
        Platform::Fan if sub_node == SUBNODE_FANLINC_LIGHT => Platform::Light,
        Platform::Climate if [SUBNODE_CLIMATE_COOL, SUBNODE_CLIMATE_HEAT].contains(&sub_node) => {
            Platform::BinarySensor
        }
        Platform::BinarySensor
            if type_code.starts_with(TYPE_CATEGORY_SENSOR_ACTUATOR)
                && sub_node == SUBNODE_IOLINC_RELAY =>
        {
            Platform::Switch
        }
        Platform::Switch
            if type_code.starts_with(TYPE_EZIO2X4) && SUBNODE_EZIO2X4_SENSORS.contains(&sub_node) =>
        {
            Platform::BinarySensor
        }
        other => other,
    }
}

/// Sensor-named nodes reporting a boolean unit or on/off states
fn looks_binary(node: &NodeDescriptor) -> bool {
    if let Some(uom) = status_uom_id(node) {
        return BINARY_SENSOR_UOMS.contains(&uom);
    }
    status_states(node).is_some_and(|states| same_set(BINARY_SENSOR_STATES, &states))
}

/// Binary sensor refinement from the Insteon type or Z-Wave category
pub fn binary_device_class(node: &NodeDescriptor) -> Option<DeviceClass> {
    if let Some(category) = zwave_category(node) {
        return ZWAVE_DEVICE_CLASSES
            .iter()
            .find(|(_, categories)| categories.contains(&category))
            .map(|(class, _)| *class);
    }
    let type_code = node.type_code.as_deref()?;
    INSTEON_DEVICE_CLASSES
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| type_code.starts_with(p)))
        .map(|(class, _)| *class)
}

fn insteon_type(node: &NodeDescriptor) -> Option<&str> {
    match node.protocol {
        Protocol::Insteon => node.type_code.as_deref(),
        _ => None,
    }
}

fn zwave_category(node: &NodeDescriptor) -> Option<u16> {
    match node.protocol {
        Protocol::ZWave => node.zwave_category.as_deref()?.trim().parse().ok(),
        _ => None,
    }
}

fn status_uom_id(node: &NodeDescriptor) -> Option<u16> {
    node.status()?.uom.as_deref()?.trim().parse().ok()
}

/// Older firmware reports a `/`-separated list of state names as the uom
fn status_states(node: &NodeDescriptor) -> Option<Vec<String>> {
    let uom = node.status()?.uom.as_deref()?;
    if uom.trim().parse::<u16>().is_ok() {
        return None;
    }
    Some(
        uom.split('/')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

fn same_set(expected: &[&str], actual: &[String]) -> bool {
    expected.len() == actual.len() && actual.iter().all(|s| expected.contains(&s.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use isy_parser::NodeProperty;

    fn insteon(address: &str, type_code: &str) -> NodeDescriptor {
        NodeDescriptor {
            address: address.to_string(),
            name: "Node".to_string(),
            parent: None,
            primary: None,
            family: None,
            protocol: Protocol::Insteon,
            node_def_id: None,
            type_code: Some(type_code.to_string()),
            zwave_category: None,
            enabled: true,
            flag: 128,
            properties: Vec::new(),
        }
    }

    #[test]
    fn test_remote_buttons_override_switch_tables() {
        let mut remote = insteon("1A 2B 3C 1", "0.16.65.0");
        remote.node_def_id = Some("RemoteLinc2".to_string());
        let options = ClassifierOptions::default();
        assert_eq!(classify_platform(&remote, "", &options), Platform::BinarySensor);
    }

    #[test]
    fn test_fallback_is_sensor() {
        let mut unknown = insteon("1A 2B 3C 1", "250.1.0.0");
        unknown.protocol = Protocol::NodeServer;
        let options = ClassifierOptions::default();
        assert_eq!(classify_platform(&unknown, "", &options), Platform::Sensor);
    }

    #[test]
    fn test_code_tables_win_over_sensor_string() {
        let mut node = insteon("1A 2B 3C 1", "2.42.67.0");
        node.name = "Gate sensor".to_string();
        let options = ClassifierOptions::default();
        assert_eq!(classify_platform(&node, "", &options), Platform::Switch);
    }

    #[test]
    fn test_sensor_string_wins_over_unit_tables() {
        let mut node = insteon("1A 2B 3C 1", "250.1.0.0");
        node.protocol = Protocol::Other;
        node.properties.push(NodeProperty {
            id: "ST".to_string(),
            value: None,
            formatted: None,
            uom: Some("78".to_string()),
            precision: 0,
        });
        let options = ClassifierOptions::default();
        assert_eq!(classify_platform(&node, "", &options), Platform::Switch);

        node.name = "Gate sensor".to_string();
        assert_eq!(classify_platform(&node, "", &options), Platform::BinarySensor);

        node.properties[0].uom = Some("on/off".to_string());
        assert_eq!(classify_platform(&node, "", &options), Platform::BinarySensor);
    }

    #[test]
    fn test_sensor_string_decides_residual_nodes() {
        let mut node = insteon("n001_gate", "");
        node.protocol = Protocol::NodeServer;
        node.type_code = None;
        node.properties.push(NodeProperty {
            id: "ST".to_string(),
            value: None,
            formatted: None,
            uom: Some("Open/Shut".to_string()),
            precision: 0,
        });
        let options = ClassifierOptions::default();
        assert_eq!(classify_platform(&node, "", &options), Platform::Sensor);

        node.name = "Gate Sensor".to_string();
        assert_eq!(classify_platform(&node, "", &options), Platform::Sensor);

        node.properties[0].uom = Some("Off/On".to_string());
        assert_eq!(classify_platform(&node, "", &options), Platform::BinarySensor);

        node.properties[0].uom = Some("low/mid/high".to_string());
        assert_eq!(classify_platform(&node, "", &options), Platform::Sensor);
    }

    #[test]
    fn test_orphaned_motion_sub_node_is_skipped() {
        let mut tamper = insteon("1A 2B 3C A", "16.22.1.0");
        tamper.primary = Some("1A 2B 3C 1".to_string());
        let classifier = Classifier::default();
        assert_eq!(classifier.classify_node(&tamper, None, ""), NodeClass::Ignored);
    }
}
