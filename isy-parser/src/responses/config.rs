//! `/rest/config`

use serde::Deserialize;

use crate::common::xml_decode::{self, non_empty, parse_flag};
use crate::error::{ParseError, ParseResult};

/// Identity and version information for one hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubInfo {
    /// Hub identity as reported, e.g. `00:21:b9:02:1a:2b`
    pub uuid: String,
    pub name: String,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub platform: Option<String>,
    /// Whether the firmware exposes variables at all
    pub variables_supported: bool,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "deviceSpecs", default)]
    device_specs: Option<RawDeviceSpecs>,
    #[serde(default)]
    app_version: Option<String>,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    root: Option<RawRoot>,
    #[serde(default)]
    variables: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDeviceSpecs {
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRoot {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub fn parse_config(xml: &str) -> ParseResult<HubInfo> {
    let raw: RawConfig = xml_decode::parse(xml)?;

    let root = raw
        .root
        .ok_or_else(|| ParseError::MissingRequiredElement("root".to_string()))?;
    let uuid = non_empty(root.id)
        .ok_or_else(|| ParseError::MissingRequiredElement("root/id".to_string()))?;
    let name = non_empty(root.name).unwrap_or_else(|| uuid.clone());

    Ok(HubInfo {
        uuid,
        name,
        model: non_empty(raw.device_specs.and_then(|d| d.model)),
        firmware: non_empty(raw.app_version),
        platform: non_empty(raw.platform),
        variables_supported: non_empty(raw.variables)
            .and_then(|v| parse_flag(&v))
            .unwrap_or(true),
    })
}
