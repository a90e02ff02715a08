//! Decoders for the hub's bulk REST payloads.
//!
//! Each submodule holds the raw serde shape of one endpoint's XML plus the
//! conversion into the structured descriptor the rest of the workspace uses.
//! Raw shapes are private; only descriptors leave this crate.

pub mod config;
pub mod network;
pub mod nodes;
pub mod programs;
pub mod variables;

pub use config::{parse_config, HubInfo};
pub use network::{parse_network_resources, NetworkResource};
pub use nodes::{
    parse_nodes, FolderDescriptor, GroupDescriptor, NodeDescriptor, NodeProperty, NodeTree,
    Protocol,
};
pub use programs::{parse_programs, ProgramDescriptor, ProgramList, ProgramRunning};
pub use variables::{
    merge_variables, parse_variable_definitions, parse_variable_values, VariableDefinition,
    VariableDescriptor, VariableType, VariableValue,
};
