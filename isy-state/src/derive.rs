//! Attribute merging and derived state
//!
//! Every function here mutates one record and returns the attributes that
//! actually changed. Derived keys are recomputed in the same call as the raw
//! keys they depend on.

use chrono::{DateTime, Utc};
use isy_parser::{FixedPoint, PropertyUpdate};

use crate::model::{
    state, AttributeValue, Attributes, DeviceClass, EntityRecord, Platform, SubNodeRole, UnitInfo,
    VariableRecord,
};
use crate::uom::{
    has_state_table, state_name, UOM_BARRIER_STATUS, UOM_HALF_DEGREES, UOM_HVAC_STATE,
    UOM_INSTEON_FAN_MODE, UOM_INSTEON_THERMOSTAT_MODE, UOM_LOCK_STATUS, UOM_PERCENT,
};

pub(crate) const STATUS: &str = "ST";

/// Climate properties that feed the composite attributes
const CLIMATE_INPUTS: &[&str] = &[STATUS, "CLIHCS", "CLIMD", "CLIFS", "CLISPH", "CLISPC"];

/// Records changed keys while merging into one record
struct Delta<'a> {
    record: &'a mut EntityRecord,
    changes: Attributes,
    at: DateTime<Utc>,
}

impl<'a> Delta<'a> {
    fn new(record: &'a mut EntityRecord, at: DateTime<Utc>) -> Self {
        Self {
            record,
            changes: Attributes::new(),
            at,
        }
    }

    fn put(&mut self, key: &str, value: AttributeValue) {
        if self.record.set(key, value.clone(), self.at) {
            self.changes.insert(key.to_string(), value);
        }
    }

    fn finish(self) -> Attributes {
        self.changes
    }
}

/// Half-degree readings are halved exactly
pub(crate) fn scaled_value(value: Option<FixedPoint>, uom: Option<&str>) -> Option<FixedPoint> {
    match uom {
        Some(UOM_HALF_DEGREES) => value.map(FixedPoint::halved),
        _ => value,
    }
}

/// Merge one property into a record and recompute what depends on it
pub(crate) fn apply_property(
    record: &mut EntityRecord,
    update: &PropertyUpdate,
    at: DateTime<Utc>,
) -> Attributes {
    let cached = record.unit(&update.property).cloned().unwrap_or_default();
    let uom = update.uom.clone().or(cached.uom);
    let value = scaled_value(update.value, uom.as_deref());
    let precision = value
        .map(|v| v.precision())
        .or(update.precision)
        .unwrap_or(cached.precision);

    record.set_unit(
        &update.property,
        UnitInfo {
            uom: uom.clone(),
            precision,
        },
    );

    let mut delta = Delta::new(record, at);
    delta.put(&update.property, value.into());

    if update.property == STATUS {
        derive_status(&mut delta, value, uom.as_deref());
    }
    if delta.record.platform() == Platform::Climate
        && CLIMATE_INPUTS.contains(&update.property.as_str())
    {
        derive_climate(&mut delta);
    }
    delta.finish()
}

fn derive_status(delta: &mut Delta<'_>, value: Option<FixedPoint>, uom: Option<&str>) {
    let platform = delta.record.platform();
    if platform == Platform::BinarySensor && delta.record.role() == Some(SubNodeRole::Heartbeat) {
        // Driven by beats, not by the reported value
        return;
    }
    let Some(value) = value else {
        delta.put("state", AttributeValue::Unknown);
        return;
    };

    let state = match platform {
        Platform::BinarySensor => binary_state(delta.record, !value.is_zero()),
        Platform::Switch => on_off(value.raw() > 0),
        Platform::Light => {
            delta.put("brightness", AttributeValue::integer(brightness(value, uom)));
            on_off(value.raw() > 0)
        }
        Platform::Fan => AttributeValue::text(fan_speed(value)),
        Platform::Lock => match (uom, value.as_integer()) {
            (Some(UOM_LOCK_STATUS), Some(v)) => named_or_number(UOM_LOCK_STATUS, v, value),
            _ if value.is_zero() => AttributeValue::text(state::UNLOCKED),
            _ => AttributeValue::text(state::LOCKED),
        },
        Platform::Cover => match (uom, value.as_integer()) {
            (Some(UOM_BARRIER_STATUS), Some(v)) => named_or_number(UOM_BARRIER_STATUS, v, value),
            _ if value.is_zero() => AttributeValue::text(state::CLOSED),
            _ => AttributeValue::text(state::OPEN),
        },
        Platform::Climate => {
            delta.put("current_temperature", AttributeValue::Number(value));
            return;
        }
        Platform::Sensor => match (uom, value.as_integer()) {
            (Some(uom), Some(v)) if has_state_table(uom) => named_or_number(uom, v, value),
            _ => AttributeValue::Number(value),
        },
    };
    delta.put("state", state);
}

fn named_or_number(uom: &str, raw: i64, value: FixedPoint) -> AttributeValue {
    match state_name(uom, raw) {
        Some(name) => AttributeValue::Text(name.into_owned()),
        None => AttributeValue::Number(value),
    }
}

fn on_off(on: bool) -> AttributeValue {
    AttributeValue::text(if on { state::ON } else { state::OFF })
}

/// Leak sensors report "dry" as on; their exposed state is inverted
fn binary_state(record: &EntityRecord, computed: bool) -> AttributeValue {
    let on = match record.device_class() {
        Some(DeviceClass::Moisture) => !computed,
        _ => computed,
    };
    on_off(on)
}

/// 0-255 brightness; percent-based dimmers are rescaled
pub(crate) fn brightness(value: FixedPoint, uom: Option<&str>) -> i64 {
    match uom {
        Some(UOM_PERCENT) => (value.to_f64() * 255.0 / 100.0).round() as i64,
        _ => value.to_f64().round() as i64,
    }
}

pub(crate) fn fan_speed(value: FixedPoint) -> &'static str {
    match value.to_f64() {
        v if v <= 0.0 => state::OFF,
        v if v <= 85.0 => state::LOW,
        v if v <= 191.0 => state::MEDIUM,
        _ => state::HIGH,
    }
}

fn derive_climate(delta: &mut Delta<'_>) {
    let record = &*delta.record;
    let named = |key: &str, default_uom: &str| -> Option<String> {
        let raw = record.number(key)?.as_integer()?;
        state_name(record.uom(key).unwrap_or(default_uom), raw).map(|n| n.into_owned())
    };
    let action = named("CLIHCS", UOM_HVAC_STATE);
    let mode = named("CLIMD", UOM_INSTEON_THERMOSTAT_MODE);
    let fan = named("CLIFS", UOM_INSTEON_FAN_MODE);
    let current = record.number(STATUS);
    let heat = record.number("CLISPH");
    let cool = record.number("CLISPC");

    if let Some(action) = action {
        delta.put("hvac_action", AttributeValue::Text(action));
    }
    if let Some(fan) = fan {
        delta.put("fan_mode", AttributeValue::Text(fan));
    }
    if let Some(current) = current {
        delta.put("current_temperature", AttributeValue::Number(current));
    }
    let Some(mode) = mode else {
        return;
    };
    let (target, low, high) = match mode.as_str() {
        "heat" => (heat, None, None),
        "cool" => (cool, None, None),
        "auto" | "heat_cool" => (None, heat, cool),
        _ => (None, None, None),
    };
    delta.put("hvac_mode", AttributeValue::Text(mode));
    delta.put("target_temperature", target.into());
    delta.put("target_temperature_low", low.into());
    delta.put("target_temperature_high", high.into());
}

/// DON/DOF on a binary sensor's primary node, or DON on its negative node
pub(crate) fn set_binary(record: &mut EntityRecord, on: bool, at: DateTime<Utc>) -> Attributes {
    let state = binary_state(record, on);
    let mut delta = Delta::new(record, at);
    delta.put("state", state);
    delta.finish()
}

/// A beat: back to normal
pub(crate) fn heartbeat(record: &mut EntityRecord, at: DateTime<Utc>) -> Attributes {
    let mut delta = Delta::new(record, at);
    delta.put("state", AttributeValue::text(state::OFF));
    delta.put("last_heartbeat", AttributeValue::Time(at));
    delta.finish()
}

/// No beat within the timeout: report low battery
pub(crate) fn heartbeat_missed(record: &mut EntityRecord, at: DateTime<Utc>) -> Attributes {
    let mut delta = Delta::new(record, at);
    delta.put("state", AttributeValue::text(state::ON));
    delta.finish()
}

pub(crate) fn program_state(platform: Platform, status: Option<bool>) -> AttributeValue {
    let Some(status) = status else {
        return AttributeValue::Unknown;
    };
    let name = match (platform, status) {
        (Platform::Lock, true) => state::LOCKED,
        (Platform::Lock, false) => state::UNLOCKED,
        (Platform::Cover, true) => state::OPEN,
        (Platform::Cover, false) => state::CLOSED,
        (_, true) => state::ON,
        (_, false) => state::OFF,
    };
    AttributeValue::text(name)
}

pub(crate) fn set_program_status(
    record: &mut EntityRecord,
    status: Option<bool>,
    at: DateTime<Utc>,
) -> Attributes {
    let state = program_state(record.platform(), status);
    let mut delta = Delta::new(record, at);
    delta.put("state", state);
    delta.finish()
}

pub(crate) fn set_variable(
    record: &mut EntityRecord,
    variable: &VariableRecord,
    at: DateTime<Utc>,
) -> Attributes {
    let mut delta = Delta::new(record, at);
    delta.put("state", AttributeValue::Number(variable.current()));
    delta.put("init", AttributeValue::Number(variable.initial()));
    delta.finish()
}

/// Scene state from the on/off state of its known members
pub(crate) fn set_group(
    record: &mut EntityRecord,
    members_on: &[bool],
    at: DateTime<Utc>,
) -> Attributes {
    let all_on = !members_on.is_empty() && members_on.iter().all(|on| *on);
    let any_on = members_on.iter().any(|on| *on);
    let mut delta = Delta::new(record, at);
    delta.put("all_on", AttributeValue::Bool(all_on));
    delta.put("state", on_off(any_on));
    delta.finish()
}

pub(crate) fn set_attribute(
    record: &mut EntityRecord,
    key: &str,
    value: AttributeValue,
    at: DateTime<Utc>,
) -> Attributes {
    let mut delta = Delta::new(record, at);
    delta.put(key, value);
    delta.finish()
}

/// Fold a freshly imported record into the known one. Keys the fresh
/// record lacks keep their values; beat-driven keys keep theirs too.
pub(crate) fn merge_record(
    current: &mut EntityRecord,
    fresh: &EntityRecord,
    at: DateTime<Utc>,
) -> Attributes {
    current.set_source(fresh.source().clone());
    for (key, unit) in fresh.units() {
        current.set_unit(key, unit.clone());
    }
    if current.name() != fresh.name() {
        current.rename(fresh.name(), at);
    }

    let beat_driven = current.role() == Some(SubNodeRole::Heartbeat);
    let mut delta = Delta::new(current, at);
    for (key, value) in fresh.attributes() {
        if beat_driven && (key == "state" || key == "last_heartbeat") {
            continue;
        }
        delta.put(key, value.clone());
    }
    delta.finish()
}
