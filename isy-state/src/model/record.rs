//! Entity, variable and program records

use chrono::{DateTime, Utc};
use isy_parser::{FixedPoint, ProgramRunning, Protocol, VariableType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{EntityId, HubId};
use super::platform::{DeviceClass, Platform, SubNodeRole};
use super::value::{AttributeValue, Attributes};

/// Where an entity's state comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntitySource {
    Node {
        address: String,
        /// Primary node address when this is a sub-node
        primary: Option<String>,
        protocol: Protocol,
        node_def_id: Option<String>,
        type_code: Option<String>,
        role: Option<SubNodeRole>,
    },
    Group {
        address: String,
        members: Vec<String>,
    },
    Variable {
        var_type: VariableType,
        id: u32,
    },
    Program {
        status_id: String,
        /// Absent only for program-backed binary sensors
        actions_id: Option<String>,
    },
}

impl EntitySource {
    pub fn address(&self) -> Option<&str> {
        match self {
            EntitySource::Node { address, .. } | EntitySource::Group { address, .. } => {
                Some(address)
            }
            _ => None,
        }
    }

    pub fn role(&self) -> Option<SubNodeRole> {
        match self {
            EntitySource::Node { role, .. } => *role,
            _ => None,
        }
    }
}

/// Unit of measure and precision last reported for one attribute
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnitInfo {
    pub uom: Option<String>,
    pub precision: u8,
}

/// Reconciled state of one entity
///
/// Attributes only ever merge: an update overwrites the keys it carries and
/// leaves every other key alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    id: EntityId,
    name: String,
    platform: Platform,
    device_class: Option<DeviceClass>,
    source: EntitySource,
    attributes: Attributes,
    units: BTreeMap<String, UnitInfo>,
    updated_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        platform: Platform,
        device_class: Option<DeviceClass>,
        source: EntitySource,
        at: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        let mut attributes = Attributes::new();
        attributes.insert("name".to_string(), AttributeValue::Text(name.clone()));
        Self {
            id,
            name,
            platform,
            device_class,
            source,
            attributes,
            units: BTreeMap::new(),
            updated_at: at,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn hub(&self) -> &HubId {
        self.id.hub()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.device_class
    }

    pub fn source(&self) -> &EntitySource {
        &self.source
    }

    pub fn role(&self) -> Option<SubNodeRole> {
        self.source.role()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Numeric attribute, if present and known
    pub fn number(&self, key: &str) -> Option<FixedPoint> {
        self.attribute(key).and_then(AttributeValue::as_number)
    }

    pub fn state(&self) -> Option<&AttributeValue> {
        self.attribute("state")
    }

    pub fn is_on(&self) -> bool {
        self.state().and_then(AttributeValue::as_text) == Some(super::value::state::ON)
    }

    pub fn units(&self) -> &BTreeMap<String, UnitInfo> {
        &self.units
    }

    pub fn unit(&self, key: &str) -> Option<&UnitInfo> {
        self.units.get(key)
    }

    /// Unit of measure last seen for `key`
    pub fn uom(&self, key: &str) -> Option<&str> {
        self.unit(key).and_then(|u| u.uom.as_deref())
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merge one attribute. Returns whether the stored value changed.
    pub(crate) fn set(&mut self, key: &str, value: AttributeValue, at: DateTime<Utc>) -> bool {
        if self.attributes.get(key) == Some(&value) {
            return false;
        }
        self.attributes.insert(key.to_string(), value);
        self.updated_at = at;
        true
    }

    pub(crate) fn set_unit(&mut self, key: &str, unit: UnitInfo) {
        self.units.insert(key.to_string(), unit);
    }

    pub(crate) fn rename(&mut self, name: &str, at: DateTime<Utc>) -> bool {
        self.name = name.to_string();
        self.set("name", AttributeValue::text(name), at)
    }

    pub(crate) fn set_source(&mut self, source: EntitySource) {
        self.source = source;
    }

    /// Same kind of entity: platform, device class and role all match
    pub fn same_kind(&self, other: &EntityRecord) -> bool {
        self.platform == other.platform
            && self.device_class == other.device_class
            && self.role() == other.role()
    }
}

/// A hub variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub hub: HubId,
    pub var_type: VariableType,
    pub id: u32,
    pub name: String,
    /// Raw integer; scale by `precision`
    pub value: i64,
    pub init: i64,
    /// Cached so events without `prec` still scale correctly
    pub precision: u8,
    pub timestamp: Option<String>,
}

impl VariableRecord {
    pub fn current(&self) -> FixedPoint {
        FixedPoint::new(self.value, self.precision)
    }

    pub fn initial(&self) -> FixedPoint {
        FixedPoint::new(self.init, self.precision)
    }
}

/// A hub program or program folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub hub: HubId,
    pub id: String,
    pub name: String,
    /// Folder names above this program
    pub path: String,
    pub is_folder: bool,
    pub status: Option<bool>,
    pub running: ProgramRunning,
    pub enabled: Option<bool>,
    pub run_at_startup: Option<bool>,
    pub last_run: Option<String>,
    pub last_finished: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> EntityRecord {
        EntityRecord::new(
            EntityId::node(&HubId::new("hub"), "1A 2B 3C 1"),
            "Porch",
            Platform::Light,
            None,
            EntitySource::Node {
                address: "1A 2B 3C 1".to_string(),
                primary: None,
                protocol: Protocol::Insteon,
                node_def_id: None,
                type_code: None,
                role: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_set_reports_changes_only() {
        let mut record = record();
        let now = Utc::now();
        assert!(record.set("ST", AttributeValue::integer(255), now));
        assert!(!record.set("ST", AttributeValue::integer(255), now));
        assert!(record.set("OL", AttributeValue::integer(128), now));
        assert_eq!(record.number("ST"), Some(FixedPoint::integer(255)));
        assert_eq!(record.attributes().len(), 3);
    }

    #[test]
    fn test_rename_updates_name_attribute() {
        let mut record = record();
        assert!(record.rename("Back Porch", Utc::now()));
        assert_eq!(record.name(), "Back Porch");
        assert_eq!(
            record.attribute("name"),
            Some(&AttributeValue::text("Back Porch"))
        );
    }
}
