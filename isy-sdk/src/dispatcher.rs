//! Turning caller requests into command frames
//!
//! Everything here is pure: given the target's current record, decide
//! whether the request is legal for its platform and which frame carries
//! it. Raw commands skip every check except having an address to go to.

use isy_api::commands::{program_frame, MAX_LEVEL};
use isy_api::validation::check_range;
use isy_api::{Command, CommandFrame, NodeCommand, ProgramAction, Validate};
use isy_parser::FixedPoint;
use isy_state::uom::{UOM_FAN_MODE, UOM_HALF_DEGREES, UOM_THERMOSTAT_MODE};
use isy_state::{EntityRecord, EntitySource, Platform, VariableRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, SdkError};

const CMD_SECURE: &str = "SECMD";
const CMD_CLIMATE_MODE: &str = "CLIMD";
const CMD_FAN_MODE: &str = "CLIFS";

/// Fan speed presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    High,
}

impl FanSpeed {
    /// Motor level sent with `DON`; `None` means `DOF`
    pub fn level(&self) -> Option<i64> {
        match self {
            FanSpeed::Off => None,
            FanSpeed::Low => Some(63),
            FanSpeed::Medium => Some(191),
            FanSpeed::High => Some(255),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    FanOnly,
    /// Thermostat's own schedule
    Auto,
}

impl HvacMode {
    /// Mode code for the thermostat's mode unit
    pub fn code(&self, uom: &str) -> i64 {
        let zwave = uom == UOM_THERMOSTAT_MODE;
        match self {
            HvacMode::Off => 0,
            HvacMode::Heat => 1,
            HvacMode::Cool => 2,
            HvacMode::HeatCool => 3,
            HvacMode::FanOnly if zwave => 6,
            HvacMode::FanOnly => 4,
            HvacMode::Auto if zwave => 3,
            HvacMode::Auto => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanMode {
    On,
    Auto,
}

impl FanMode {
    pub fn code(&self, uom: &str) -> i64 {
        match (self, uom == UOM_FAN_MODE) {
            (FanMode::Auto, true) => 0,
            (FanMode::On, true) => 1,
            (FanMode::On, false) => 7,
            (FanMode::Auto, false) => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Setpoint {
    Heat,
    Cool,
}

impl Setpoint {
    pub fn control(&self) -> &'static str {
        match self {
            Setpoint::Heat => "CLISPH",
            Setpoint::Cool => "CLISPC",
        }
    }
}

/// What a caller wants an entity to do, independent of the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    /// Optional level 0-255; only lights and fans take one
    TurnOn { level: Option<i64> },
    TurnOff,
    Lock,
    Unlock,
    Open,
    Close,
    Stop,
    SetFanSpeed(FanSpeed),
    SetClimateMode(HvacMode),
    SetFanMode(FanMode),
    SetSetpoint { target: Setpoint, value: FixedPoint },
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::TurnOn { .. } => "turn_on",
            Intent::TurnOff => "turn_off",
            Intent::Lock => "lock",
            Intent::Unlock => "unlock",
            Intent::Open => "open",
            Intent::Close => "close",
            Intent::Stop => "stop",
            Intent::SetFanSpeed(_) => "set_fan_speed",
            Intent::SetClimateMode(_) => "set_climate_mode",
            Intent::SetFanMode(_) => "set_fan_mode",
            Intent::SetSetpoint { .. } => "set_setpoint",
        }
    }

    pub fn is_supported_by(&self, platform: Platform) -> bool {
        match self {
            Intent::TurnOn { .. } | Intent::TurnOff => {
                matches!(platform, Platform::Light | Platform::Switch | Platform::Fan)
            }
            Intent::Lock | Intent::Unlock => platform == Platform::Lock,
            Intent::Open | Intent::Close | Intent::Stop => platform == Platform::Cover,
            Intent::SetFanSpeed(_) => platform == Platform::Fan,
            Intent::SetClimateMode(_) | Intent::SetFanMode(_) | Intent::SetSetpoint { .. } => {
                platform == Platform::Climate
            }
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub(crate) fn plan_intent(record: &EntityRecord, intent: &Intent) -> Result<CommandFrame> {
    if !intent.is_supported_by(record.platform()) {
        return Err(SdkError::invalid(format!(
            "{intent} is not supported by {} entity {}",
            record.platform(),
            record.id()
        )));
    }

    match record.source() {
        EntitySource::Program { actions_id, .. } => {
            let action = match intent {
                Intent::TurnOn { level: None } | Intent::Lock | Intent::Open => {
                    ProgramAction::RunThen
                }
                Intent::TurnOff | Intent::Unlock | Intent::Close => ProgramAction::RunElse,
                _ => {
                    return Err(SdkError::invalid(format!(
                        "{intent} is not supported by program entity {}",
                        record.id()
                    )))
                }
            };
            program_action(record, actions_id.as_deref(), action)
        }
        EntitySource::Node { address, .. } | EntitySource::Group { address, .. } => {
            let command = node_command(record, intent)?;
            command.validate()?;
            Ok(command.to_frame(address))
        }
        EntitySource::Variable { .. } => Err(SdkError::invalid(format!(
            "variable entity {} takes set_variable",
            record.id()
        ))),
    }
}

fn node_command(record: &EntityRecord, intent: &Intent) -> Result<Command> {
    let command = match intent {
        Intent::TurnOn { level: Some(level) } => {
            if !matches!(record.platform(), Platform::Light | Platform::Fan) {
                return Err(no_level(record));
            }
            check_range("level", *level, 0, MAX_LEVEL)?;
            Command::On {
                level: Some(*level),
            }
        }
        Intent::TurnOn { level: None } | Intent::Open => Command::On { level: None },
        Intent::TurnOff | Intent::Close => Command::Off,
        Intent::Lock => set(CMD_SECURE, FixedPoint::integer(1)),
        Intent::Unlock => set(CMD_SECURE, FixedPoint::integer(0)),
        Intent::Stop => Command::Named(NodeCommand::FadeStop),
        Intent::SetFanSpeed(speed) => match speed.level() {
            Some(level) => Command::On { level: Some(level) },
            None => Command::Off,
        },
        Intent::SetClimateMode(mode) => {
            let uom = record.uom(CMD_CLIMATE_MODE).unwrap_or_default();
            set(CMD_CLIMATE_MODE, FixedPoint::integer(mode.code(uom)))
        }
        Intent::SetFanMode(mode) => {
            let uom = record.uom(CMD_FAN_MODE).unwrap_or_default();
            set(CMD_FAN_MODE, FixedPoint::integer(mode.code(uom)))
        }
        Intent::SetSetpoint { target, value } => {
            let control = target.control();
            let value = if record.uom(control) == Some(UOM_HALF_DEGREES) {
                doubled(*value)?
            } else {
                *value
            };
            set(control, value)
        }
    };
    Ok(command)
}

/// Validate a low-level command against the target and render its frame
pub(crate) fn plan_command(record: &EntityRecord, command: &Command) -> Result<CommandFrame> {
    if let EntitySource::Program { actions_id, .. } = record.source() {
        let action = match command {
            Command::On { level: None } => ProgramAction::RunThen,
            Command::Off => ProgramAction::RunElse,
            _ => {
                return Err(SdkError::invalid(format!(
                    "program entity {} only takes on and off",
                    record.id()
                )))
            }
        };
        return program_action(record, actions_id.as_deref(), action);
    }

    let address = record
        .source()
        .address()
        .ok_or_else(|| SdkError::invalid(format!("{} has no node address", record.id())))?;

    if !command.is_raw() {
        command.validate()?;
        check_platform(record, command)?;
    }
    Ok(command.to_frame(address))
}

fn check_platform(record: &EntityRecord, command: &Command) -> Result<()> {
    let platform = record.platform();
    match command {
        Command::On { level: Some(_) } if !matches!(platform, Platform::Light | Platform::Fan) => {
            Err(no_level(record))
        }
        Command::On { .. } | Command::Off | Command::SetOnLevel(_) | Command::SetRampRate(_)
            if !platform.is_controllable() =>
        {
            Err(SdkError::invalid(format!(
                "{platform} entity {} cannot be switched",
                record.id()
            )))
        }
        _ => Ok(()),
    }
}

/// Raw value for a variable write at the variable's cached precision
pub(crate) fn variable_raw(record: &VariableRecord, value: FixedPoint) -> Result<i64> {
    value
        .normalized()
        .with_precision(record.precision)
        .filter(|scaled| scaled.precision() == record.precision)
        .map(|scaled| scaled.raw())
        .ok_or_else(|| {
            SdkError::invalid(format!(
                "{value} does not fit variable {} with precision {}",
                record.name, record.precision
            ))
        })
}

fn program_action(
    record: &EntityRecord,
    actions_id: Option<&str>,
    action: ProgramAction,
) -> Result<CommandFrame> {
    let actions = actions_id.ok_or_else(|| {
        SdkError::invalid(format!("program entity {} has no actions program", record.id()))
    })?;
    Ok(program_frame(actions, action))
}

fn set(control: &str, value: FixedPoint) -> Command {
    Command::Set {
        control: control.to_string(),
        value,
        uom: None,
    }
}

fn doubled(value: FixedPoint) -> Result<FixedPoint> {
    value
        .raw()
        .checked_mul(2)
        .map(|raw| FixedPoint::new(raw, value.precision()))
        .ok_or_else(|| SdkError::invalid(format!("setpoint {value} out of range")))
}

fn no_level(record: &EntityRecord) -> SdkError {
    SdkError::invalid(format!(
        "{} entity {} does not take a level",
        record.platform(),
        record.id()
    ))
}
