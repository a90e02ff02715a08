//! `/rest/nodes`: folders, devices and scenes.
//!
//! The three element kinds are interleaved in document order, which is why
//! the crate enables quick-xml's `overlapped-lists`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::xml_decode::{self, non_empty, parse_flag};
use crate::common::FixedPoint;
use crate::error::ParseResult;

/// Parent reference type for nodes whose parent is another node
pub const PARENT_TYPE_NODE: &str = "1";
/// Parent reference type for nodes filed under a folder
pub const PARENT_TYPE_FOLDER: &str = "3";

/// Group flag marking the hub's implicit root scene
const GROUP_FLAG_ROOT: u32 = 0x04;
/// Scene link type for controller members
const LINK_TYPE_CONTROLLER: &str = "16";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Insteon,
    ZWave,
    NodeServer,
    Other,
}

impl Protocol {
    /// Family codes: absent or `1` is Insteon, `4`/`12` Z-Wave, `10` node server.
    pub fn from_family(family: Option<&str>) -> Self {
        match family {
            None | Some("1") | Some("") => Protocol::Insteon,
            Some("4") | Some("12") => Protocol::ZWave,
            Some("10") => Protocol::NodeServer,
            Some(_) => Protocol::Other,
        }
    }
}

/// One property snapshot carried inline in the node listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeProperty {
    pub id: String,
    pub value: Option<FixedPoint>,
    pub formatted: Option<String>,
    pub uom: Option<String>,
    pub precision: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub address: String,
    pub name: String,
    /// Folder or node this one is filed under
    pub parent: Option<String>,
    /// Primary node address when this is a sub-node
    pub primary: Option<String>,
    pub family: Option<String>,
    pub protocol: Protocol,
    pub node_def_id: Option<String>,
    /// Insteon device type, e.g. `1.32.65.0`
    pub type_code: Option<String>,
    pub zwave_category: Option<String>,
    pub enabled: bool,
    pub flag: u32,
    pub properties: Vec<NodeProperty>,
}

impl NodeDescriptor {
    pub fn is_sub_node(&self) -> bool {
        self.primary.is_some()
    }

    /// Sub-node number: the last address token read as hex (`1` for
    /// `12 34 56 1`, `10` for `12 34 56 A`).
    pub fn sub_node_id(&self) -> Option<u32> {
        if self.protocol != Protocol::Insteon {
            return None;
        }
        self.address
            .split_whitespace()
            .nth(3)
            .and_then(|token| u32::from_str_radix(token, 16).ok())
    }

    pub fn property(&self, id: &str) -> Option<&NodeProperty> {
        self.properties.iter().find(|p| p.id == id)
    }

    /// The main status property, `ST`
    pub fn status(&self) -> Option<&NodeProperty> {
        self.property("ST")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescriptor {
    pub address: String,
    pub name: String,
    pub parent: Option<String>,
    pub flag: u32,
    pub members: Vec<String>,
    pub controllers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    pub address: String,
    pub name: String,
    pub parent: Option<String>,
}

/// Decoded node listing with folder lookups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeTree {
    pub root_name: Option<String>,
    pub nodes: Vec<NodeDescriptor>,
    pub groups: Vec<GroupDescriptor>,
    pub folders: Vec<FolderDescriptor>,
    /// Entries skipped because they had no address
    pub skipped: usize,
}

impl NodeTree {
    pub fn node(&self, address: &str) -> Option<&NodeDescriptor> {
        self.nodes.iter().find(|n| n.address == address)
    }

    /// Slash-joined folder path of an entry, excluding the entry itself.
    ///
    /// Only folder parents contribute; a sub-node's parent node does not.
    pub fn folder_path(&self, parent: Option<&str>) -> String {
        let folders: HashMap<&str, &FolderDescriptor> = self
            .folders
            .iter()
            .map(|f| (f.address.as_str(), f))
            .collect();

        let mut segments = Vec::new();
        let mut cursor = parent;
        while let Some(address) = cursor {
            match folders.get(address) {
                Some(folder) => {
                    // Guard against a malformed cycle
                    if segments.len() > folders.len() {
                        break;
                    }
                    segments.push(folder.name.as_str());
                    cursor = folder.parent.as_deref();
                }
                None => break,
            }
        }
        segments.reverse();
        segments.join("/")
    }
}

#[derive(Debug, Deserialize)]
struct RawNodes {
    #[serde(default)]
    root: Option<String>,
    #[serde(rename = "folder", default)]
    folders: Vec<RawFolder>,
    #[serde(rename = "node", default)]
    nodes: Vec<RawNode>,
    #[serde(rename = "group", default)]
    groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
struct RawParent {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct RawFamily {
    #[serde(rename = "$text", default)]
    code: String,
}

#[derive(Debug, Deserialize)]
struct RawDevType {
    #[serde(default)]
    cat: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProperty {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@value", default)]
    value: String,
    #[serde(rename = "@formatted", default)]
    formatted: Option<String>,
    #[serde(rename = "@uom", default)]
    uom: Option<String>,
    #[serde(rename = "@prec", default)]
    prec: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "@flag", default)]
    flag: Option<String>,
    #[serde(rename = "@nodeDefId", default)]
    node_def_id: Option<String>,
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent: Option<RawParent>,
    #[serde(default)]
    family: Option<RawFamily>,
    #[serde(rename = "type", default)]
    type_code: Option<String>,
    #[serde(default)]
    enabled: Option<String>,
    #[serde(default)]
    pnode: Option<String>,
    #[serde(default)]
    devtype: Option<RawDevType>,
    #[serde(rename = "property", default)]
    properties: Vec<RawProperty>,
}

#[derive(Debug, Deserialize)]
struct RawFolder {
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent: Option<RawParent>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "$text", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct RawMembers {
    #[serde(rename = "link", default)]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(rename = "@flag", default)]
    flag: Option<String>,
    #[serde(default)]
    address: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    parent: Option<RawParent>,
    #[serde(default)]
    members: Option<RawMembers>,
}

fn parse_flags(raw: Option<String>) -> u32 {
    non_empty(raw).and_then(|f| f.parse().ok()).unwrap_or(0)
}

fn parent_address(parent: Option<RawParent>) -> Option<String> {
    parent.and_then(|p| non_empty(Some(p.address)))
}

impl From<RawProperty> for NodeProperty {
    fn from(raw: RawProperty) -> Self {
        let precision = non_empty(raw.prec)
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        NodeProperty {
            value: FixedPoint::parse(&raw.value, precision),
            formatted: non_empty(raw.formatted),
            uom: non_empty(raw.uom),
            precision,
            id: raw.id,
        }
    }
}

/// Decode the node listing.
///
/// Entries with no address are counted in [`NodeTree::skipped`] rather than
/// failing the whole document. The hub's implicit root scene is dropped.
pub fn parse_nodes(xml: &str) -> ParseResult<NodeTree> {
    let raw: RawNodes = xml_decode::parse(xml)?;
    let mut tree = NodeTree {
        root_name: non_empty(raw.root),
        ..Default::default()
    };

    for folder in raw.folders {
        let address = folder.address.trim().to_string();
        if address.is_empty() {
            tree.skipped += 1;
            continue;
        }
        tree.folders.push(FolderDescriptor {
            name: non_empty(folder.name).unwrap_or_else(|| address.clone()),
            parent: parent_address(folder.parent),
            address,
        });
    }

    for node in raw.nodes {
        let address = node.address.trim().to_string();
        if address.is_empty() {
            tree.skipped += 1;
            continue;
        }

        let family = node.family.and_then(|f| non_empty(Some(f.code)));
        let protocol = Protocol::from_family(family.as_deref());
        let primary = non_empty(node.pnode).filter(|p| *p != address);
        let parent = match node.parent {
            Some(p) if p.kind.as_deref() == Some(PARENT_TYPE_NODE) => non_empty(Some(p.address)),
            other => parent_address(other),
        };

        tree.nodes.push(NodeDescriptor {
            name: non_empty(node.name).unwrap_or_else(|| address.clone()),
            parent,
            primary,
            family,
            protocol,
            node_def_id: non_empty(node.node_def_id),
            type_code: non_empty(node.type_code),
            zwave_category: node.devtype.and_then(|d| non_empty(d.cat)),
            enabled: non_empty(node.enabled)
                .and_then(|e| parse_flag(&e))
                .unwrap_or(true),
            flag: parse_flags(node.flag),
            properties: node
                .properties
                .into_iter()
                .filter(|p| !p.id.is_empty())
                .map(NodeProperty::from)
                .collect(),
            address,
        });
    }

    for group in raw.groups {
        let address = group.address.trim().to_string();
        let flag = parse_flags(group.flag);
        if address.is_empty() {
            tree.skipped += 1;
            continue;
        }
        if flag & GROUP_FLAG_ROOT != 0 {
            continue;
        }

        let links = group.members.map(|m| m.links).unwrap_or_default();
        let mut members = Vec::with_capacity(links.len());
        let mut controllers = Vec::new();
        for link in links {
            let member = link.address.trim().to_string();
            if member.is_empty() {
                continue;
            }
            if link.kind.as_deref() == Some(LINK_TYPE_CONTROLLER) {
                controllers.push(member.clone());
            }
            members.push(member);
        }

        tree.groups.push(GroupDescriptor {
            name: non_empty(group.name).unwrap_or_else(|| address.clone()),
            parent: parent_address(group.parent),
            flag,
            members,
            controllers,
            address,
        });
    }

    Ok(tree)
}
