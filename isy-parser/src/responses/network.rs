//! `/rest/networking/resources`

use serde::Deserialize;

use crate::common::xml_decode::{self, non_empty};
use crate::error::ParseResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkResource {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct RawNetConfig {
    #[serde(rename = "NetRule", default)]
    rules: Vec<RawNetRule>,
}

#[derive(Debug, Deserialize)]
struct RawNetRule {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Rules without a numeric id are skipped.
pub fn parse_network_resources(xml: &str) -> ParseResult<Vec<NetworkResource>> {
    let raw: RawNetConfig = xml_decode::parse(xml)?;
    Ok(raw
        .rules
        .into_iter()
        .filter_map(|rule| {
            let id = non_empty(rule.id)?.parse().ok()?;
            let name = non_empty(rule.name).unwrap_or_else(|| format!("resource {}", id));
            Some(NetworkResource { id, name })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_network_resources() {
        let xml = r#"<NetConfig>
  <NetRule><isModified>false</isModified><id>1</id><name>Garage Door Open</name></NetRule>
  <NetRule><id>2</id><name>Doorbell</name></NetRule>
  <NetRule><id>x</id><name>Broken</name></NetRule>
</NetConfig>"#;
        let resources = parse_network_resources(xml).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].id, 1);
        assert_eq!(resources[1].name, "Doorbell");
    }

    #[test]
    fn test_empty_resource_list() {
        assert!(parse_network_resources("<NetConfig/>").unwrap().is_empty());
    }
}
