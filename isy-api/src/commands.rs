//! Outbound command vocabulary.
//!
//! [`NodeCommand`] names the fixed node operations callers can request by
//! name. [`Command`] is everything that can be sent to one node address,
//! from a validated level change down to a raw passthrough. Hub-level
//! requests (variables, programs, network resources, parameters) are built
//! as frames directly by the helpers at the bottom of this module.

use isy_parser::{CommandFrame, FixedPoint, ProgramAction, VariableType};
use serde::{Deserialize, Serialize};

use crate::validation::{check_code, check_range, Validate, ValidationError};

pub const CMD_ON: &str = "DON";
pub const CMD_OFF: &str = "DOF";
pub const CMD_FAST_ON: &str = "DFON";
pub const CMD_FAST_OFF: &str = "DFOF";
pub const CMD_ON_LEVEL: &str = "OL";
pub const CMD_RAMP_RATE: &str = "RR";

pub const MAX_LEVEL: i64 = 255;
pub const MAX_RAMP_RATE: i64 = 31;

/// Named node operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeCommand {
    Beep,
    Brighten,
    Dim,
    Disable,
    Enable,
    FadeDown,
    FadeStop,
    FadeUp,
    FastOff,
    FastOn,
    Query,
}

impl NodeCommand {
    pub const ALL: [NodeCommand; 11] = [
        NodeCommand::Beep,
        NodeCommand::Brighten,
        NodeCommand::Dim,
        NodeCommand::Disable,
        NodeCommand::Enable,
        NodeCommand::FadeDown,
        NodeCommand::FadeStop,
        NodeCommand::FadeUp,
        NodeCommand::FastOff,
        NodeCommand::FastOn,
        NodeCommand::Query,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NodeCommand::Beep => "beep",
            NodeCommand::Brighten => "brighten",
            NodeCommand::Dim => "dim",
            NodeCommand::Disable => "disable",
            NodeCommand::Enable => "enable",
            NodeCommand::FadeDown => "fade_down",
            NodeCommand::FadeStop => "fade_stop",
            NodeCommand::FadeUp => "fade_up",
            NodeCommand::FastOff => "fast_off",
            NodeCommand::FastOn => "fast_on",
            NodeCommand::Query => "query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Hub command code, for the commands sent through `/cmd/`
    pub fn code(&self) -> Option<&'static str> {
        match self {
            NodeCommand::Beep => Some("BEEP"),
            NodeCommand::Brighten => Some("BRT"),
            NodeCommand::Dim => Some("DIM"),
            NodeCommand::FadeDown => Some("FDDOWN"),
            NodeCommand::FadeStop => Some("FDSTOP"),
            NodeCommand::FadeUp => Some("FDUP"),
            NodeCommand::FastOff => Some(CMD_FAST_OFF),
            NodeCommand::FastOn => Some(CMD_FAST_ON),
            NodeCommand::Disable | NodeCommand::Enable | NodeCommand::Query => None,
        }
    }

    pub fn to_frame(&self, address: &str) -> CommandFrame {
        match self {
            NodeCommand::Enable => CommandFrame::NodeEnable {
                address: address.to_string(),
                enabled: true,
            },
            NodeCommand::Disable => CommandFrame::NodeEnable {
                address: address.to_string(),
                enabled: false,
            },
            NodeCommand::Query => CommandFrame::Query {
                address: Some(address.to_string()),
            },
            other => CommandFrame::NodeCommand {
                address: address.to_string(),
                command: other.code().unwrap_or_default().to_string(),
                value: None,
                uom: None,
                params: Vec::new(),
            },
        }
    }
}

/// A raw node command, sent verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommand {
    pub command: String,
    pub value: Option<FixedPoint>,
    pub uom: Option<String>,
    pub parameters: Vec<(String, String)>,
}

impl RawCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            value: None,
            uom: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: FixedPoint) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_uom(mut self, uom: impl Into<String>) -> Self {
        self.uom = Some(uom.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }
}

/// Anything that can be sent to a single node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Escape hatch: no validation at all
    Raw(RawCommand),
    Named(NodeCommand),
    /// `DON`, optionally at a level 0-255
    On { level: Option<i64> },
    /// `DOF`
    Off,
    /// Default on-level, 0-255
    SetOnLevel(i64),
    /// Ramp rate index, 0-31
    SetRampRate(i64),
    /// Set a property or send a coded command with a value (setpoints,
    /// modes, lock codes). The code is validated; the value is not.
    Set {
        control: String,
        value: FixedPoint,
        uom: Option<String>,
    },
}

impl Command {
    pub fn is_raw(&self) -> bool {
        matches!(self, Command::Raw(_))
    }

    /// Render the frame for `address`. Call [`Validate::validate`] first;
    /// this does not check anything.
    pub fn to_frame(&self, address: &str) -> CommandFrame {
        let node_command = |command: &str, value: Option<FixedPoint>, uom: Option<String>| {
            CommandFrame::NodeCommand {
                address: address.to_string(),
                command: command.to_string(),
                value,
                uom,
                params: Vec::new(),
            }
        };

        match self {
            Command::Raw(raw) => CommandFrame::NodeCommand {
                address: address.to_string(),
                command: raw.command.clone(),
                value: raw.value,
                uom: raw.uom.clone(),
                params: raw.parameters.clone(),
            },
            Command::Named(named) => named.to_frame(address),
            Command::On { level } => node_command(CMD_ON, level.map(FixedPoint::integer), None),
            Command::Off => node_command(CMD_OFF, None, None),
            Command::SetOnLevel(level) => {
                node_command(CMD_ON_LEVEL, Some(FixedPoint::integer(*level)), None)
            }
            Command::SetRampRate(rate) => {
                node_command(CMD_RAMP_RATE, Some(FixedPoint::integer(*rate)), None)
            }
            Command::Set {
                control,
                value,
                uom,
            } => node_command(control.as_str(), Some(*value), uom.clone()),
        }
    }
}

impl Validate for Command {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Command::Raw(_) | Command::Named(_) | Command::Off => Ok(()),
            Command::On { level: None } => Ok(()),
            Command::On { level: Some(level) } => check_range("level", *level, 0, MAX_LEVEL),
            Command::SetOnLevel(level) => check_range("on_level", *level, 0, MAX_LEVEL),
            Command::SetRampRate(rate) => check_range("ramp_rate", *rate, 0, MAX_RAMP_RATE),
            Command::Set { control, uom, .. } => {
                check_code("control", control)?;
                match uom {
                    Some(uom) if uom.parse::<u16>().is_err() => Err(
                        ValidationError::invalid_value("uom", uom, "expected a numeric unit code"),
                    ),
                    _ => Ok(()),
                }
            }
        }
    }
}

/// A Z-Wave configuration parameter write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZWaveParameter {
    pub parameter: u16,
    pub value: i64,
    /// Byte width: 1, 2 or 4
    pub size: u8,
}

impl Validate for ZWaveParameter {
    fn validate(&self) -> Result<(), ValidationError> {
        check_range("parameter", self.parameter, 1, 255)?;
        if !matches!(self.size, 1 | 2 | 4) {
            return Err(ValidationError::invalid_value(
                "size",
                self.size,
                "must be 1, 2 or 4",
            ));
        }
        // Signed minimum through unsigned maximum of the byte width
        let bits = u32::from(self.size) * 8;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << bits) - 1;
        check_range("value", self.value, min, max)
    }
}

pub fn zwave_set_frame(address: &str, param: &ZWaveParameter) -> CommandFrame {
    CommandFrame::ZWaveSetParameter {
        address: address.to_string(),
        parameter: param.parameter,
        value: param.value,
        size: param.size,
    }
}

pub fn zwave_query_frame(address: &str, parameter: u16) -> CommandFrame {
    CommandFrame::ZWaveQueryParameter {
        address: address.to_string(),
        parameter,
    }
}

pub fn variable_frame(var_type: VariableType, id: u32, value: i64, init: bool) -> CommandFrame {
    CommandFrame::SetVariable {
        var_type,
        id,
        value,
        init,
    }
}

pub fn program_frame(id: &str, action: ProgramAction) -> CommandFrame {
    CommandFrame::Program {
        id: isy_parser::normalize_program_id(id),
        action,
    }
}

pub fn network_resource_frame(id: u32) -> CommandFrame {
    CommandFrame::NetworkResource { id }
}

pub fn rename_frame(address: &str, name: &str) -> CommandFrame {
    CommandFrame::RenameNode {
        address: address.to_string(),
        name: name.to_string(),
    }
}

/// `/rest/query[/{addr}]`
pub fn query_frame(address: Option<&str>) -> CommandFrame {
    CommandFrame::Query {
        address: address.map(str::to_string),
    }
}
