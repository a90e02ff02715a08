//! Turning a hub snapshot into entity records and routing tables

use chrono::{DateTime, Utc};
use isy_api::HubSnapshot;
use isy_parser::{
    GroupDescriptor, NodeDescriptor, ProgramDescriptor, ProgramList, PropertyUpdate,
    VariableDescriptor,
};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::classifier::{Classifier, EntityClass, NodeClass};
use crate::config::HubSettings;
use crate::derive;
use crate::model::{
    state, AttributeValue, DeviceClass, EntityId, EntityRecord, EntitySource, HubId, Platform,
    ProgramRecord, SubNodeRole, VariableRecord,
};

/// Where events for one address go
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Route {
    Entity(EntityId),
    /// Negative sub-node; DON turns the parent entity off
    Negative(EntityId),
    Ignored,
}

/// A node as last described by the hub
#[derive(Debug, Clone)]
pub(crate) struct KnownNode {
    pub descriptor: NodeDescriptor,
    pub folder_path: String,
}

/// Per-hub lookup tables rebuilt from each full snapshot
#[derive(Debug, Default)]
pub(crate) struct HubIndex {
    pub nodes: HashMap<String, KnownNode>,
    pub routes: HashMap<String, Route>,
    /// Primary address to the heartbeat entity watching it
    pub heartbeat_of: HashMap<String, EntityId>,
    /// Member address to the scenes containing it
    pub groups_of: HashMap<String, Vec<EntityId>>,
    /// Status program id to the entity it drives
    pub program_entities: HashMap<String, EntityId>,
}

pub(crate) struct ImportPlan {
    pub records: Vec<EntityRecord>,
    pub index: HubIndex,
    pub variables: Vec<VariableRecord>,
    pub programs: Vec<ProgramRecord>,
}

pub(crate) fn plan(
    hub: &HubId,
    snapshot: &HubSnapshot,
    settings: &HubSettings,
    at: DateTime<Utc>,
) -> ImportPlan {
    let classifier = Classifier::new(settings.options.clone());
    let mut index = HubIndex::default();
    let mut records = Vec::new();

    let tree = &snapshot.nodes;
    let by_address: HashMap<&str, &NodeDescriptor> =
        tree.nodes.iter().map(|n| (n.address.as_str(), n)).collect();

    for node in &tree.nodes {
        let folder_path = tree.folder_path(node.parent.as_deref());
        let primary = node
            .primary
            .as_deref()
            .and_then(|p| by_address.get(p).copied());
        let class = classifier.classify_node(node, primary, &folder_path);

        let route = match class {
            NodeClass::Ignored => Route::Ignored,
            NodeClass::Negative { parent } => Route::Negative(EntityId::node(hub, &parent)),
            NodeClass::Entity(class) => {
                let record = node_record(hub, node, class, at);
                if class.role == Some(SubNodeRole::Heartbeat) {
                    if let Some(primary) = node.primary.as_ref() {
                        index.heartbeat_of.insert(primary.clone(), record.id().clone());
                    }
                }
                let route = Route::Entity(record.id().clone());
                records.push(record);
                route
            }
        };
        index.routes.insert(node.address.clone(), route);
        index.nodes.insert(
            node.address.clone(),
            KnownNode {
                descriptor: node.clone(),
                folder_path,
            },
        );
    }

    for group in &tree.groups {
        let folder_path = tree.folder_path(group.parent.as_deref());
        if settings.options.is_ignored(&group.name, &folder_path) {
            index.routes.insert(group.address.clone(), Route::Ignored);
            continue;
        }
        let record = group_record(hub, group, at);
        if let EntitySource::Group { members, .. } = record.source() {
            for member in members {
                index
                    .groups_of
                    .entry(member.clone())
                    .or_default()
                    .push(record.id().clone());
            }
        }
        index
            .routes
            .insert(group.address.clone(), Route::Entity(record.id().clone()));
        records.push(record);
    }

    let mut variables = Vec::new();
    if settings.variables_enabled {
        for variable in &snapshot.variables {
            let record = variable_record(hub, variable);
            if settings.options.is_variable_sensor(&variable.name) {
                records.push(variable_entity(hub, &record, at));
            }
            variables.push(record);
        }
    }

    let programs = snapshot
        .programs
        .programs
        .iter()
        .map(|p| program_record(hub, &snapshot.programs, p))
        .collect();

    for record in program_entities(hub, &snapshot.programs, &settings.options.program_folder_prefix, at) {
        if let EntitySource::Program { status_id, .. } = record.source() {
            index
                .program_entities
                .insert(status_id.clone(), record.id().clone());
        }
        records.push(record);
    }

    debug!(
        hub = %hub,
        entities = records.len(),
        variables = variables.len(),
        "Planned snapshot import"
    );

    ImportPlan {
        records,
        index,
        variables,
        programs,
    }
}

/// Entity for one node, seeded from the properties in its descriptor
pub(crate) fn node_record(
    hub: &HubId,
    node: &NodeDescriptor,
    class: EntityClass,
    at: DateTime<Utc>,
) -> EntityRecord {
    let mut record = EntityRecord::new(
        EntityId::node(hub, &node.address),
        node.name.clone(),
        class.platform,
        class.device_class,
        EntitySource::Node {
            address: node.address.clone(),
            primary: node.primary.clone(),
            protocol: node.protocol,
            node_def_id: node.node_def_id.clone(),
            type_code: node.type_code.clone(),
            role: class.role,
        },
        at,
    );
    record.set("enabled", AttributeValue::Bool(node.enabled), at);

    for property in &node.properties {
        let update = PropertyUpdate {
            address: node.address.clone(),
            property: property.id.clone(),
            value: property.value,
            uom: property.uom.clone(),
            precision: Some(property.precision),
            formatted: property.formatted.clone(),
        };
        derive::apply_property(&mut record, &update, at);
    }

    // Sub-nodes that only report once used start out normal
    let starts_off = class.role == Some(SubNodeRole::Heartbeat)
        || matches!(class.device_class, Some(DeviceClass::Cold | DeviceClass::Heat));
    if starts_off && record.state().map_or(true, AttributeValue::is_unknown) {
        record.set("state", AttributeValue::text(state::OFF), at);
    }
    record
}

fn group_record(hub: &HubId, group: &GroupDescriptor, at: DateTime<Utc>) -> EntityRecord {
    let mut members = group.members.clone();
    for controller in &group.controllers {
        if !members.contains(controller) {
            members.push(controller.clone());
        }
    }
    EntityRecord::new(
        EntityId::node(hub, &group.address),
        group.name.clone(),
        Platform::Switch,
        None,
        EntitySource::Group {
            address: group.address.clone(),
            members,
        },
        at,
    )
}

fn variable_record(hub: &HubId, variable: &VariableDescriptor) -> VariableRecord {
    VariableRecord {
        hub: hub.clone(),
        var_type: variable.var_type,
        id: variable.id,
        name: variable.name.clone(),
        value: variable.value,
        init: variable.init,
        precision: variable.precision,
        timestamp: variable.timestamp.clone(),
    }
}

pub(crate) fn variable_entity(hub: &HubId, variable: &VariableRecord, at: DateTime<Utc>) -> EntityRecord {
    let mut record = EntityRecord::new(
        EntityId::variable(hub, variable.var_type, variable.id),
        variable.name.clone(),
        Platform::Sensor,
        None,
        EntitySource::Variable {
            var_type: variable.var_type,
            id: variable.id,
        },
        at,
    );
    derive::set_variable(&mut record, variable, at);
    record
}

fn program_record(hub: &HubId, list: &ProgramList, program: &ProgramDescriptor) -> ProgramRecord {
    ProgramRecord {
        hub: hub.clone(),
        id: program.id.clone(),
        name: program.name.clone(),
        path: list.path_of(&program.id),
        is_folder: program.is_folder,
        status: program.status,
        running: program.running,
        enabled: program.enabled,
        run_at_startup: program.run_at_startup,
        last_run: program.last_run.clone(),
        last_finished: program.last_finished.clone(),
    }
}

/// Entities defined by `{prefix}{platform}/<name>/status|actions` folders
fn program_entities(
    hub: &HubId,
    list: &ProgramList,
    prefix: &str,
    at: DateTime<Utc>,
) -> Vec<EntityRecord> {
    let mut records = Vec::new();

    for platform in Platform::PROGRAMMABLE {
        let folder_name = format!("{prefix}{platform}");
        let roots = list
            .programs
            .iter()
            .filter(|p| p.is_folder && p.name == folder_name);

        for root in roots {
            for entity_folder in list.children(&root.id).filter(|p| p.is_folder) {
                let child = |name: &str| {
                    list.children(&entity_folder.id)
                        .find(|p| !p.is_folder && p.name.eq_ignore_ascii_case(name))
                };
                let Some(status) = child("status") else {
                    warn!(
                        hub = %hub,
                        folder = %entity_folder.name,
                        "Program entity folder has no 'status' program; skipping"
                    );
                    continue;
                };
                let actions = child("actions");
                if actions.is_none() && platform != Platform::BinarySensor {
                    warn!(
                        hub = %hub,
                        folder = %entity_folder.name,
                        platform = %platform,
                        "Program entity folder has no 'actions' program; skipping"
                    );
                    continue;
                }

                let mut record = EntityRecord::new(
                    EntityId::program(hub, &status.id),
                    entity_folder.name.clone(),
                    platform,
                    None,
                    EntitySource::Program {
                        status_id: status.id.clone(),
                        actions_id: actions.map(|a| a.id.clone()),
                    },
                    at,
                );
                derive::set_program_status(&mut record, status.status, at);
                records.push(record);
            }
        }
    }
    records
}
