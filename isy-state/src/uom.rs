//! Named states for enumerated units of measure

use std::borrow::Cow;

/// Degrees reported in half steps; divided by two on ingestion
pub const UOM_HALF_DEGREES: &str = "101";
pub const UOM_PERCENT: &str = "51";
pub const UOM_LOCK_STATUS: &str = "11";
pub const UOM_BARRIER_STATUS: &str = "97";
pub const UOM_HVAC_STATE: &str = "66";
pub const UOM_THERMOSTAT_MODE: &str = "67";
pub const UOM_FAN_MODE: &str = "68";
pub const UOM_INSTEON_THERMOSTAT_MODE: &str = "98";
pub const UOM_INSTEON_FAN_MODE: &str = "99";

/// Name of `value` under `uom`, for units that enumerate states
pub fn state_name(uom: &str, value: i64) -> Option<Cow<'static, str>> {
    let name = match (uom.trim(), value) {
        ("11", 0) => "unlocked",
        ("11", 100) => "locked",
        ("11", 101) => "unknown",
        ("11", 102) => "problem",

        ("15", v) => return door_lock_alarm(v).map(Cow::Borrowed),

        ("66", 0 | 6) => "idle",
        ("66", 1 | 4 | 7 | 8 | 10 | 11) => "heating",
        ("66", 2 | 5 | 9) => "cooling",
        ("66", 3) => "fan",

        ("67", 0) => "off",
        ("67", 1) => "heat",
        ("67", 2) => "cool",
        ("67", 3 | 14..=16) => "auto",
        ("67", 4) => "boost",
        ("67", 5) => "resume",
        ("67", 6) => "fan_only",
        ("67", 7) => "furnace",
        ("67", 8) => "dry",
        ("67", 9) => "moist air",
        ("67", 10) => "auto changeover",
        ("67", 11) => "energy save heat",
        ("67", 12) => "energy save cool",
        ("67", 13) => "away",

        ("68", 0) => "auto",
        ("68", 1) => "on",
        ("68", 2 | 3) => "high",
        ("68", 4 | 5) => "medium",
        ("68", 6) => "circulation",
        ("68", 7) => "humidity circulation",

        ("78", 0) => "off",
        ("78", 100) => "on",

        ("79", 0) => "open",
        ("79", 100) => "closed",

        ("80", 0) => "off",
        ("80", 1) => "on",
        ("80", 2) => "on high",
        ("80", 3) => "on medium",
        ("80", 4) => "circulation",
        ("80", 5) => "humidity circulation",
        ("80", 6) => "right/left circulation",
        ("80", 7) => "up/down circulation",
        ("80", 8) => "quiet circulation",

        ("84", 0) => "lock",
        ("84", 1) => "unlock",

        ("93", v) => return power_alarm(v).map(Cow::Borrowed),
        ("94", v) => return appliance_alarm(v).map(Cow::Borrowed),

        ("95", 1) => "leaving bed",
        ("95", 2) => "sitting on bed",
        ("95", 3) => "lying on bed",
        ("95", 4) => "posture changed",
        ("95", 5) => "sitting on edge of bed",

        ("96", 1) => "clean",
        ("96", 2) => "slightly polluted",
        ("96", 3) => "moderately polluted",
        ("96", 4) => "highly polluted",

        ("97", 0) => "closed",
        ("97", 100) => "open",
        ("97", 101) => "unknown",
        ("97", 102) => "stopped",
        ("97", 103) => "closing",
        ("97", 104) => "opening",
        ("97", v @ 1..=99) => return Some(Cow::Owned(format!("{v} %"))),

        ("98", 0) => "off",
        ("98", 1) => "heat",
        ("98", 2) => "cool",
        ("98", 3) => "heat_cool",
        ("98", 4) => "fan_only",
        ("98", 5..=7) => "auto",

        ("99", 7) => "on",
        ("99", 8) => "auto",

        _ => return None,
    };
    Some(Cow::Borrowed(name))
}

/// Whether `uom` enumerates states
pub fn has_state_table(uom: &str) -> bool {
    matches!(
        uom.trim(),
        "11" | "15" | "66" | "67" | "68" | "78" | "79" | "80" | "84" | "93" | "94" | "95" | "96"
            | "97" | "98" | "99"
    )
}

fn door_lock_alarm(value: i64) -> Option<&'static str> {
    Some(match value {
        1 => "master code changed",
        2 => "tamper code entry limit",
        3 => "escutcheon removed",
        4 => "key/manually locked",
        5 => "locked by touch",
        6 => "key/manually unlocked",
        7 => "remote locking jammed bolt",
        8 => "remotely locked",
        9 => "remotely unlocked",
        10 => "deadbolt jammed",
        11 => "battery too low to operate",
        12 => "critical low battery",
        13 => "low battery",
        14 => "automatically locked",
        15 => "automatic locking jammed bolt",
        16 => "remotely power cycled",
        17 => "lock handling complete",
        19 => "user deleted",
        20 => "user added",
        21 => "duplicate pin",
        22 => "jammed bolt by locking with keypad",
        23 => "locked by keypad",
        24 => "unlocked by keypad",
        25 => "keypad attempt outside schedule",
        26 => "hardware failure",
        27 => "factory reset",
        _ => return None,
    })
}

fn power_alarm(value: i64) -> Option<&'static str> {
    Some(match value {
        1 => "power applied",
        2 => "ac mains disconnected",
        3 => "ac mains reconnected",
        4 => "surge detection",
        5 => "volt drop or drift",
        6 => "over current detected",
        7 => "over voltage detected",
        8 => "over load detected",
        9 => "load error",
        10 => "replace battery soon",
        11 => "replace battery now",
        12 => "battery is charging",
        13 => "battery is fully charged",
        14 => "charge battery soon",
        15 => "charge battery now",
        _ => return None,
    })
}

fn appliance_alarm(value: i64) -> Option<&'static str> {
    Some(match value {
        1 => "program started",
        2 => "program in progress",
        3 => "program completed",
        4 => "replace main filter",
        5 => "failure to set target temperature",
        6 => "supplying water",
        7 => "water supply failure",
        8 => "boiling",
        9 => "boiling failure",
        10 => "washing",
        11 => "washing failure",
        12 => "rinsing",
        13 => "rinsing failure",
        14 => "draining",
        15 => "draining failure",
        16 => "spinning",
        17 => "spinning failure",
        18 => "drying",
        19 => "drying failure",
        20 => "fan failure",
        21 => "compressor failure",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_percentages() {
        assert_eq!(state_name("97", 42).as_deref(), Some("42 %"));
        assert_eq!(state_name("97", 103).as_deref(), Some("closing"));
        assert_eq!(state_name("97", 105), None);
    }

    #[test]
    fn test_unlisted_unit_has_no_names() {
        assert_eq!(state_name("17", 1), None);
        assert!(!has_state_table("17"));
        assert!(has_state_table(" 98 "));
    }
}
