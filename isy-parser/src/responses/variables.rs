//! `/rest/vars/definitions/{type}` and `/rest/vars/get/{type}`
//!
//! Names and values come from separate endpoints and are joined on id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::xml_decode::{self, non_empty};
use crate::error::{ParseError, ParseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariableType {
    Integer = 1,
    State = 2,
}

impl VariableType {
    pub const ALL: [VariableType; 2] = [VariableType::Integer, VariableType::State];

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(VariableType::Integer),
            "2" => Some(VariableType::State),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDefinition {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableValue {
    pub var_type: VariableType,
    pub id: u32,
    pub value: i64,
    pub init: i64,
    pub precision: u8,
    pub timestamp: Option<String>,
}

/// A variable with its name and current values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDescriptor {
    pub var_type: VariableType,
    pub id: u32,
    pub name: String,
    pub value: i64,
    pub init: i64,
    pub precision: u8,
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDefinitions {
    #[serde(rename = "e", default)]
    entries: Vec<RawDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawDefinition {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@name", default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawValues {
    #[serde(rename = "var", default)]
    vars: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    #[serde(rename = "@type", default)]
    var_type: String,
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(default)]
    init: Option<String>,
    #[serde(default)]
    prec: Option<String>,
    #[serde(default)]
    val: Option<String>,
    #[serde(default)]
    ts: Option<String>,
}

/// Entries without a numeric id are skipped.
pub fn parse_variable_definitions(xml: &str) -> ParseResult<Vec<VariableDefinition>> {
    let raw: RawDefinitions = xml_decode::parse(xml)?;
    Ok(raw
        .entries
        .into_iter()
        .filter_map(|e| {
            let id = e.id.trim().parse().ok()?;
            Some(VariableDefinition {
                id,
                name: e.name.trim().to_string(),
            })
        })
        .collect())
}

pub fn parse_variable_values(xml: &str) -> ParseResult<Vec<VariableValue>> {
    let raw: RawValues = xml_decode::parse(xml)?;
    raw.vars
        .into_iter()
        .map(|v| {
            let var_type = VariableType::from_code(&v.var_type)
                .ok_or_else(|| ParseError::invalid("var@type", v.var_type.clone()))?;
            let id = v
                .id
                .trim()
                .parse()
                .map_err(|_| ParseError::invalid("var@id", v.id.clone()))?;
            let int = |field: &str, raw: Option<String>| -> ParseResult<i64> {
                match non_empty(raw) {
                    Some(s) => s.parse().map_err(|_| ParseError::invalid(field, s)),
                    None => Ok(0),
                }
            };
            Ok(VariableValue {
                var_type,
                id,
                value: int("val", v.val)?,
                init: int("init", v.init)?,
                precision: u8::try_from(int("prec", v.prec)?)
                    .map_err(|_| ParseError::invalid("prec", "out of range"))?,
                timestamp: non_empty(v.ts),
            })
        })
        .collect()
}

/// Join definitions and values of one type. Defined variables without a
/// value entry start at zero; values without a definition are dropped.
pub fn merge_variables(
    var_type: VariableType,
    definitions: Vec<VariableDefinition>,
    values: Vec<VariableValue>,
) -> Vec<VariableDescriptor> {
    let mut by_id: HashMap<u32, VariableValue> = values
        .into_iter()
        .filter(|v| v.var_type == var_type)
        .map(|v| (v.id, v))
        .collect();

    definitions
        .into_iter()
        .map(|def| {
            let value = by_id.remove(&def.id);
            VariableDescriptor {
                var_type,
                id: def.id,
                name: def.name,
                value: value.as_ref().map(|v| v.value).unwrap_or(0),
                init: value.as_ref().map(|v| v.init).unwrap_or(0),
                precision: value.as_ref().map(|v| v.precision).unwrap_or(0),
                timestamp: value.and_then(|v| v.timestamp),
            }
        })
        .collect()
}
