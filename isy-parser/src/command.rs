//! Outbound command frames.
//!
//! Every command the hub accepts is a GET against a REST path. A
//! [`CommandFrame`] is the structured form of such a path; [`CommandFrame::encode`]
//! renders it and [`decode_command`] parses it back. The two are inverse on
//! canonical paths (the ones `encode` produces).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::FixedPoint;
use crate::error::{ParseError, ParseResult};
use crate::responses::VariableType;

const REST_PREFIX: &str = "/rest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgramAction {
    /// Evaluate conditions and run the matching branch
    Run,
    RunThen,
    RunElse,
    Stop,
    Enable,
    Disable,
    EnableRunAtStartup,
    DisableRunAtStartup,
}

impl ProgramAction {
    pub const ALL: [ProgramAction; 8] = [
        ProgramAction::Run,
        ProgramAction::RunThen,
        ProgramAction::RunElse,
        ProgramAction::Stop,
        ProgramAction::Enable,
        ProgramAction::Disable,
        ProgramAction::EnableRunAtStartup,
        ProgramAction::DisableRunAtStartup,
    ];

    pub fn path_segment(&self) -> &'static str {
        match self {
            ProgramAction::Run => "runIf",
            ProgramAction::RunThen => "runThen",
            ProgramAction::RunElse => "runElse",
            ProgramAction::Stop => "stop",
            ProgramAction::Enable => "enable",
            ProgramAction::Disable => "disable",
            ProgramAction::EnableRunAtStartup => "enableRunAtStartup",
            ProgramAction::DisableRunAtStartup => "disableRunAtStartup",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.path_segment() == segment)
    }

    /// Caller-facing name, e.g. `run_then`
    pub fn name(&self) -> &'static str {
        match self {
            ProgramAction::Run => "run",
            ProgramAction::RunThen => "run_then",
            ProgramAction::RunElse => "run_else",
            ProgramAction::Stop => "stop",
            ProgramAction::Enable => "enable",
            ProgramAction::Disable => "disable",
            ProgramAction::EnableRunAtStartup => "enable_run_at_startup",
            ProgramAction::DisableRunAtStartup => "disable_run_at_startup",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandFrame {
    /// `/rest/nodes/{addr}/cmd/{CMD}[/{value}[/{uom}]][?k=v..]`
    NodeCommand {
        address: String,
        command: String,
        value: Option<FixedPoint>,
        uom: Option<String>,
        params: Vec<(String, String)>,
    },
    /// `/rest/nodes/{addr}/{enable|disable}`
    NodeEnable { address: String, enabled: bool },
    /// `/rest/query[/{addr}]`
    Query { address: Option<String> },
    /// `/rest/vars/{set|init}/{type}/{id}/{value}`
    SetVariable {
        var_type: VariableType,
        id: u32,
        value: i64,
        init: bool,
    },
    /// `/rest/programs/{id}/{action}`
    Program { id: String, action: ProgramAction },
    /// `/rest/networking/resources/{id}`
    NetworkResource { id: u32 },
    /// `/rest/nodes/{addr}/change?name=..`
    RenameNode { address: String, name: String },
    /// `/rest/zwave/node/{addr}/config/query/{param}`
    ZWaveQueryParameter { address: String, parameter: u16 },
    /// `/rest/zwave/node/{addr}/config/set/{param}/{value}/{size}`
    ZWaveSetParameter {
        address: String,
        parameter: u16,
        value: i64,
        size: u8,
    },
}

impl CommandFrame {
    /// Render the REST path. Total: every frame has a path.
    pub fn encode(&self) -> String {
        match self {
            CommandFrame::NodeCommand {
                address,
                command,
                value,
                uom,
                params,
            } => {
                let mut path = format!(
                    "{}/nodes/{}/cmd/{}",
                    REST_PREFIX,
                    encode_segment(address),
                    encode_segment(command)
                );
                if let Some(value) = value {
                    path.push('/');
                    path.push_str(&value.to_string());
                    if let Some(uom) = uom {
                        path.push('/');
                        path.push_str(&encode_segment(uom));
                    }
                }
                path.push_str(&encode_query(params));
                path
            }
            CommandFrame::NodeEnable { address, enabled } => format!(
                "{}/nodes/{}/{}",
                REST_PREFIX,
                encode_segment(address),
                if *enabled { "enable" } else { "disable" }
            ),
            CommandFrame::Query { address: None } => format!("{}/query", REST_PREFIX),
            CommandFrame::Query {
                address: Some(address),
            } => format!("{}/query/{}", REST_PREFIX, encode_segment(address)),
            CommandFrame::SetVariable {
                var_type,
                id,
                value,
                init,
            } => format!(
                "{}/vars/{}/{}/{}/{}",
                REST_PREFIX,
                if *init { "init" } else { "set" },
                var_type.code(),
                id,
                value
            ),
            CommandFrame::Program { id, action } => format!(
                "{}/programs/{}/{}",
                REST_PREFIX,
                encode_segment(id),
                action.path_segment()
            ),
            CommandFrame::NetworkResource { id } => {
                format!("{}/networking/resources/{}", REST_PREFIX, id)
            }
            CommandFrame::RenameNode { address, name } => format!(
                "{}/nodes/{}/change{}",
                REST_PREFIX,
                encode_segment(address),
                encode_query(&[("name".to_string(), name.clone())])
            ),
            CommandFrame::ZWaveQueryParameter { address, parameter } => format!(
                "{}/zwave/node/{}/config/query/{}",
                REST_PREFIX,
                encode_segment(address),
                parameter
            ),
            CommandFrame::ZWaveSetParameter {
                address,
                parameter,
                value,
                size,
            } => format!(
                "{}/zwave/node/{}/config/set/{}/{}/{}",
                REST_PREFIX,
                encode_segment(address),
                parameter,
                value,
                size
            ),
        }
    }

    /// Node address the frame targets, if any
    pub fn address(&self) -> Option<&str> {
        match self {
            CommandFrame::NodeCommand { address, .. }
            | CommandFrame::NodeEnable { address, .. }
            | CommandFrame::RenameNode { address, .. }
            | CommandFrame::ZWaveQueryParameter { address, .. }
            | CommandFrame::ZWaveSetParameter { address, .. } => Some(address),
            CommandFrame::Query { address } => address.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Parse a REST command path back into a frame.
///
/// Surrounding whitespace is ignored. Anything that is not one of the known
/// command shapes is [`ParseError::UnknownCommandFrame`].
pub fn decode_command(path: &str) -> ParseResult<CommandFrame> {
    let path = path.trim();
    let unknown = || ParseError::UnknownCommandFrame(path.to_string());

    let (path_part, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };
    let rest = path_part.strip_prefix(REST_PREFIX).ok_or_else(unknown)?;
    let raw_segments: Vec<&str> = rest.split('/').skip(1).collect();
    if rest.is_empty() || !rest.starts_with('/') || raw_segments.iter().any(|s| s.is_empty()) {
        return Err(unknown());
    }
    let segments: Vec<String> = raw_segments
        .iter()
        .map(|s| decode_component(s))
        .collect::<ParseResult<_>>()?;
    let params = match query {
        Some(q) => decode_query(q)?,
        None => Vec::new(),
    };
    let seg: Vec<&str> = segments.iter().map(String::as_str).collect();

    let frame = match seg.as_slice() {
        ["nodes", address, "cmd", command, tail @ ..] => {
            let (value, uom) = match tail {
                [] => (None, None),
                [value] => (Some(parse_value(value)?), None),
                [value, uom] => (Some(parse_value(value)?), Some(uom.to_string())),
                _ => return Err(unknown()),
            };
            CommandFrame::NodeCommand {
                address: address.to_string(),
                command: command.to_string(),
                value,
                uom,
                params,
            }
        }
        ["nodes", address, "enable"] if params.is_empty() => CommandFrame::NodeEnable {
            address: address.to_string(),
            enabled: true,
        },
        ["nodes", address, "disable"] if params.is_empty() => CommandFrame::NodeEnable {
            address: address.to_string(),
            enabled: false,
        },
        ["nodes", address, "change"] => match params.as_slice() {
            [(key, name)] if key == "name" => CommandFrame::RenameNode {
                address: address.to_string(),
                name: name.clone(),
            },
            _ => return Err(unknown()),
        },
        ["query"] => CommandFrame::Query { address: None },
        ["query", address] => CommandFrame::Query {
            address: Some(address.to_string()),
        },
        ["vars", op @ ("set" | "init"), var_type, id, value] => CommandFrame::SetVariable {
            var_type: VariableType::from_code(var_type).ok_or_else(unknown)?,
            id: parse_number(id)?,
            value: parse_number(value)?,
            init: *op == "init",
        },
        ["programs", id, action] => CommandFrame::Program {
            id: id.to_string(),
            action: ProgramAction::from_path_segment(action).ok_or_else(unknown)?,
        },
        ["networking", "resources", id] => CommandFrame::NetworkResource {
            id: parse_number(id)?,
        },
        ["zwave", "node", address, "config", "query", parameter] => {
            CommandFrame::ZWaveQueryParameter {
                address: address.to_string(),
                parameter: parse_number(parameter)?,
            }
        }
        ["zwave", "node", address, "config", "set", parameter, value, size] => {
            CommandFrame::ZWaveSetParameter {
                address: address.to_string(),
                parameter: parse_number(parameter)?,
                value: parse_number(value)?,
                size: parse_number(size)?,
            }
        }
        _ => return Err(unknown()),
    };
    Ok(frame)
}

fn parse_value(raw: &str) -> ParseResult<FixedPoint> {
    FixedPoint::parse(raw, 0).ok_or_else(|| ParseError::invalid("value", raw))
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> ParseResult<T> {
    raw.parse().map_err(|_| ParseError::invalid("number", raw))
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode one path segment or query component.
pub fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if is_unreserved(byte) {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_component(raw: &str) -> ParseResult<String> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = raw
                .get(i + 1..i + 3)
                .ok_or_else(|| ParseError::invalid("percent-encoding", raw))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| ParseError::invalid("percent-encoding", raw))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| ParseError::invalid("percent-encoding", raw))
}

fn encode_query(params: &[(String, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_segment(k), encode_segment(v)))
        .collect();
    format!("?{}", pairs.join("&"))
}

fn decode_query(query: &str) -> ParseResult<Vec<(String, String)>> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((decode_component(k)?, decode_component(v)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_node_command() {
        let frame = CommandFrame::NodeCommand {
            address: "12 34 56 1".to_string(),
            command: "DON".to_string(),
            value: Some(FixedPoint::integer(128)),
            uom: None,
            params: vec![],
        };
        assert_eq!(frame.encode(), "/rest/nodes/12%2034%2056%201/cmd/DON/128");
    }

    #[test]
    fn test_encode_params_and_uom() {
        let frame = CommandFrame::NodeCommand {
            address: "n001_t1".to_string(),
            command: "CLISPH".to_string(),
            value: Some(FixedPoint::new(725, 1)),
            uom: Some("17".to_string()),
            params: vec![("mode".to_string(), "a b".to_string())],
        };
        assert_eq!(frame.encode(), "/rest/nodes/n001_t1/cmd/CLISPH/72.5/17?mode=a%20b");
    }

    #[test]
    fn test_uom_without_value_is_not_rendered() {
        let frame = CommandFrame::NodeCommand {
            address: "a".to_string(),
            command: "DOF".to_string(),
            value: None,
            uom: Some("100".to_string()),
            params: vec![],
        };
        assert_eq!(frame.encode(), "/rest/nodes/a/cmd/DOF");
    }

    #[test]
    fn test_decode_set_variable() {
        let frame = decode_command("  /rest/vars/init/2/14/125 ").unwrap();
        assert_eq!(
            frame,
            CommandFrame::SetVariable {
                var_type: VariableType::State,
                id: 14,
                value: 125,
                init: true
            }
        );
    }

    #[test]
    fn test_decode_rejects_unknown_shapes() {
        assert!(decode_command("/rest/unknown").is_err());
        assert!(decode_command("/rest/nodes/a/cmd").is_err());
        assert!(decode_command("/rest/programs/0001/explode").is_err());
        assert!(decode_command("/rest/vars/set/3/1/1").is_err());
        assert!(decode_command("/rest//query").is_err());
        assert!(decode_command("/rest/query/%ZZ").is_err());
        assert!(decode_command("nodes/a/enable").is_err());
    }

    #[test]
    fn test_program_action_names() {
        for action in ProgramAction::ALL {
            assert_eq!(ProgramAction::from_name(action.name()), Some(action));
            assert_eq!(ProgramAction::from_path_segment(action.path_segment()), Some(action));
        }
    }
}
