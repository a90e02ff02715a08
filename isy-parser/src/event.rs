//! Event frame decoding.
//!
//! The hub pushes one XML document per change over the subscription socket:
//!
//! ```xml
//! <Event seqnum="1234" sid="uuid:40">
//!   <control>ST</control>
//!   <action uom="100" prec="0">255</action>
//!   <node>12 34 56 1</node>
//!   <eventInfo></eventInfo>
//!   <fmtAct>On</fmtAct>
//! </Event>
//! ```
//!
//! `control` selects the kind: a node property id (`ST`, `OL`, `CLISPH`...),
//! a node command (`DON`, `DOF`...), or an underscore-prefixed system
//! channel (`_0` heartbeat, `_1` trigger, `_3` node changed, `_5` status).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xmltree::Element;

use crate::common::xml_decode::{attribute, child_text, element_text, parse_element, parse_flag};
use crate::common::FixedPoint;
use crate::error::{ParseError, ParseResult};
use crate::responses::{ProgramRunning, VariableType};

/// Node commands that arrive as `control` values. Everything else without a
/// leading underscore is a property update.
pub const CONTROL_COMMANDS: &[&str] = &[
    "DON", "DOF", "DFON", "DFOF", "BRT", "DIM", "FDUP", "FDDOWN", "FDSTOP", "BEEP",
];

pub const CONTROL_HEARTBEAT: &str = "_0";
pub const CONTROL_TRIGGER: &str = "_1";
pub const CONTROL_NODE_CHANGED: &str = "_3";
pub const CONTROL_SYSTEM_STATUS: &str = "_5";

const TRIGGER_PROGRAM: &str = "0";
const TRIGGER_VARIABLE_VALUE: &str = "6";
const TRIGGER_VARIABLE_INIT: &str = "7";

/// One decoded frame from the event stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubEvent {
    /// Hub-assigned sequence number, when present
    pub seqnum: Option<u64>,
    /// Subscription id the frame belongs to
    pub sid: Option<String>,
    pub kind: EventKind,
    /// Local receive time
    pub received_at: DateTime<Utc>,
}

impl HubEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            seqnum: None,
            sid: None,
            kind,
            received_at: Utc::now(),
        }
    }

    /// Node address this event targets, if it targets a node
    pub fn node_address(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Property(update) => Some(&update.address),
            EventKind::Control(control) => Some(&control.address),
            EventKind::NodeChanged(change) => Some(&change.address),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventKind {
    /// A node property value changed
    Property(PropertyUpdate),
    /// A node sent or received a command (physical button press, heartbeat beat)
    Control(ControlEvent),
    /// Keep-alive from the hub; `interval` is the promised period in seconds
    Heartbeat { interval: Option<u64> },
    Program(ProgramUpdate),
    Variable(VariableUpdate),
    NodeChanged(NodeChange),
    SystemStatus(SystemStatus),
    /// Reply to the websocket subscribe handshake
    Subscribed { sid: String },
    /// Anything the decoder does not model
    Other {
        control: String,
        action: Option<String>,
        node: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    pub address: String,
    /// Property id such as `ST`, `OL` or `CLISPH`
    pub property: String,
    /// `None` when the hub reports the value as unknown
    pub value: Option<FixedPoint>,
    pub uom: Option<String>,
    /// Precision declared on the frame, if any
    pub precision: Option<u8>,
    pub formatted: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEvent {
    pub address: String,
    pub control: String,
    pub value: Option<FixedPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgramUpdate {
    pub id: String,
    pub status: Option<bool>,
    pub running: Option<ProgramRunning>,
    pub last_run: Option<String>,
    pub last_finished: Option<String>,
    pub enabled: Option<bool>,
    pub run_at_startup: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub var_type: VariableType,
    pub id: u32,
    /// Raw integer value; scale with the cached precision
    pub value: Option<i64>,
    pub init: Option<i64>,
    pub precision: Option<u8>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeChange {
    pub address: String,
    pub action: NodeChangeAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeChangeAction {
    Renamed { name: String },
    Added,
    Removed,
    EnabledChanged { enabled: bool },
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    NotBusy,
    Busy,
    Idle,
    SafeMode,
}

/// Decode one event frame.
///
/// Never panics. Malformed input yields a [`ParseError`] that callers are
/// expected to log and discard.
pub fn decode(bytes: &[u8]) -> ParseResult<HubEvent> {
    let root = parse_element(bytes)?;

    if root.name == "SubscriptionResponse" {
        let sid = child_text(&root, "SID")
            .ok_or_else(|| ParseError::MissingRequiredElement("SID".to_string()))?;
        return Ok(HubEvent::new(EventKind::Subscribed { sid }));
    }

    if root.name != "Event" {
        return Err(ParseError::InvalidXmlStructure(format!(
            "expected <Event>, found <{}>",
            root.name
        )));
    }

    let control = child_text(&root, "control")
        .ok_or_else(|| ParseError::MissingRequiredElement("control".to_string()))?;
    let node = child_text(&root, "node");
    let action_el = root.get_child("action");
    let action = action_el.and_then(element_text);
    let event_info = root.get_child("eventInfo");

    let kind = match control.as_str() {
        CONTROL_HEARTBEAT => EventKind::Heartbeat {
            interval: action.as_deref().and_then(|a| a.parse().ok()),
        },
        CONTROL_TRIGGER => decode_trigger(action.as_deref(), event_info)?,
        CONTROL_NODE_CHANGED => decode_node_changed(node, action, event_info),
        CONTROL_SYSTEM_STATUS => match action.as_deref() {
            Some("0") => EventKind::SystemStatus(SystemStatus::NotBusy),
            Some("1") => EventKind::SystemStatus(SystemStatus::Busy),
            Some("2") => EventKind::SystemStatus(SystemStatus::Idle),
            Some("3") => EventKind::SystemStatus(SystemStatus::SafeMode),
            _ => EventKind::Other {
                control,
                action,
                node,
            },
        },
        c if c.starts_with('_') => EventKind::Other {
            control,
            action,
            node,
        },
        _ => match node {
            Some(address) => decode_node_event(address, control, action_el, &root)?,
            None => EventKind::Other {
                control,
                action,
                node: None,
            },
        },
    };

    Ok(HubEvent {
        seqnum: attribute(&root, "seqnum").and_then(|s| s.parse().ok()),
        sid: attribute(&root, "sid"),
        kind,
        received_at: Utc::now(),
    })
}

fn decode_node_event(
    address: String,
    control: String,
    action_el: Option<&Element>,
    root: &Element,
) -> ParseResult<EventKind> {
    let precision = match action_el.and_then(|a| attribute(a, "prec")) {
        Some(p) => Some(p.parse::<u8>().map_err(|_| ParseError::invalid("prec", p))?),
        None => None,
    };
    let value = action_el
        .and_then(element_text)
        .and_then(|v| FixedPoint::parse(&v, precision.unwrap_or(0)));

    if CONTROL_COMMANDS.contains(&control.as_str()) {
        return Ok(EventKind::Control(ControlEvent {
            address,
            control,
            value,
        }));
    }

    Ok(EventKind::Property(PropertyUpdate {
        address,
        property: control,
        value,
        uom: action_el.and_then(|a| attribute(a, "uom")),
        precision,
        formatted: child_text(root, "fmtAct"),
    }))
}

fn decode_trigger(action: Option<&str>, event_info: Option<&Element>) -> ParseResult<EventKind> {
    let info = match event_info {
        Some(info) => info,
        None => {
            return Ok(EventKind::Other {
                control: CONTROL_TRIGGER.to_string(),
                action: action.map(str::to_string),
                node: None,
            })
        }
    };

    match action {
        Some(TRIGGER_PROGRAM) => decode_program(info).map(EventKind::Program),
        Some(TRIGGER_VARIABLE_VALUE) | Some(TRIGGER_VARIABLE_INIT) => {
            decode_variable(info).map(EventKind::Variable)
        }
        _ => Ok(EventKind::Other {
            control: CONTROL_TRIGGER.to_string(),
            action: action.map(str::to_string),
            node: None,
        }),
    }
}

fn decode_program(info: &Element) -> ParseResult<ProgramUpdate> {
    let id = child_text(info, "id")
        .ok_or_else(|| ParseError::MissingRequiredElement("eventInfo/id".to_string()))?;

    let mut update = ProgramUpdate {
        id: normalize_program_id(&id),
        last_run: child_text(info, "r"),
        last_finished: child_text(info, "f"),
        ..Default::default()
    };

    if let Some(code) = child_text(info, "s") {
        let code = u8::from_str_radix(&code, 16).map_err(|_| ParseError::invalid("s", code))?;
        update.status = match code & 0x0F {
            0x1 => Some(true),
            0x2 => Some(false),
            _ => None,
        };
        update.running = Some(match code >> 4 {
            0x2 => ProgramRunning::Then,
            0x3 => ProgramRunning::Else,
            _ => ProgramRunning::Idle,
        });
    }

    if info.get_child("on").is_some() {
        update.enabled = Some(true);
    } else if info.get_child("off").is_some() {
        update.enabled = Some(false);
    }

    if info.get_child("rr").is_some() {
        update.run_at_startup = Some(true);
    } else if info.get_child("nr").is_some() {
        update.run_at_startup = Some(false);
    }

    Ok(update)
}

fn decode_variable(info: &Element) -> ParseResult<VariableUpdate> {
    let var = info
        .get_child("var")
        .ok_or_else(|| ParseError::MissingRequiredElement("eventInfo/var".to_string()))?;

    let var_type = attribute(var, "type")
        .ok_or_else(|| ParseError::MissingRequiredElement("var@type".to_string()))?;
    let var_type = VariableType::from_code(&var_type).ok_or_else(|| ParseError::invalid("var@type", var_type))?;

    let id = attribute(var, "id")
        .ok_or_else(|| ParseError::MissingRequiredElement("var@id".to_string()))?;
    let id = id.parse::<u32>().map_err(|_| ParseError::invalid("var@id", id))?;

    let int_child = |name: &str| -> ParseResult<Option<i64>> {
        match child_text(var, name) {
            Some(v) => v.parse::<i64>().map(Some).map_err(|_| ParseError::invalid(name, v)),
            None => Ok(None),
        }
    };

    let precision = match child_text(var, "prec") {
        Some(p) => Some(p.parse::<u8>().map_err(|_| ParseError::invalid("prec", p))?),
        None => None,
    };

    Ok(VariableUpdate {
        var_type,
        id,
        value: int_child("val")?,
        init: int_child("init")?,
        precision,
        timestamp: child_text(var, "ts"),
    })
}

fn decode_node_changed(
    node: Option<String>,
    action: Option<String>,
    event_info: Option<&Element>,
) -> EventKind {
    let address = match node {
        Some(address) => address,
        None => {
            return EventKind::Other {
                control: CONTROL_NODE_CHANGED.to_string(),
                action,
                node: None,
            }
        }
    };

    let action = match action.as_deref() {
        Some("NN") => match event_info.and_then(|i| child_text(i, "newName")) {
            Some(name) => NodeChangeAction::Renamed { name },
            None => NodeChangeAction::Other("NN".to_string()),
        },
        Some("ND") => NodeChangeAction::Added,
        Some("NR") => NodeChangeAction::Removed,
        Some("CE") | Some("EN") => {
            match event_info
                .and_then(|i| child_text(i, "enabled"))
                .and_then(|e| parse_flag(&e))
            {
                Some(enabled) => NodeChangeAction::EnabledChanged { enabled },
                None => NodeChangeAction::Other(action.unwrap_or_default()),
            }
        }
        other => NodeChangeAction::Other(other.unwrap_or_default().to_string()),
    };

    EventKind::NodeChanged(NodeChange { address, action })
}

/// Program ids are four uppercase hex digits in REST payloads; events
/// sometimes drop the leading zeros.
pub fn normalize_program_id(id: &str) -> String {
    format!("{:0>4}", id.trim().to_ascii_uppercase())
}
