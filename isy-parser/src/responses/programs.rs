//! `/rest/programs?subfolders=true`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::common::xml_decode::{self, non_empty, parse_flag};
use crate::error::ParseResult;
use crate::event::normalize_program_id;

/// What a program is executing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProgramRunning {
    #[default]
    Idle,
    Then,
    Else,
}

impl ProgramRunning {
    pub fn from_rest(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "then" | "running then" => ProgramRunning::Then,
            "else" | "running else" => ProgramRunning::Else,
            _ => ProgramRunning::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramRunning::Idle => "idle",
            ProgramRunning::Then => "then",
            ProgramRunning::Else => "else",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDescriptor {
    /// Four uppercase hex digits
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub is_folder: bool,
    pub status: Option<bool>,
    pub enabled: Option<bool>,
    pub run_at_startup: Option<bool>,
    pub running: ProgramRunning,
    pub last_run: Option<String>,
    pub last_finished: Option<String>,
    pub next_scheduled: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramList {
    pub programs: Vec<ProgramDescriptor>,
}

impl ProgramList {
    pub fn get(&self, id: &str) -> Option<&ProgramDescriptor> {
        let id = normalize_program_id(id);
        self.programs.iter().find(|p| p.id == id)
    }

    pub fn children<'a>(&'a self, folder_id: &'a str) -> impl Iterator<Item = &'a ProgramDescriptor> + 'a {
        self.programs
            .iter()
            .filter(move |p| p.parent_id.as_deref() == Some(folder_id))
    }

    /// Slash-joined path of folder names above `id`, including the top-level
    /// "My Programs" folder.
    pub fn path_of(&self, id: &str) -> String {
        let by_id: HashMap<&str, &ProgramDescriptor> =
            self.programs.iter().map(|p| (p.id.as_str(), p)).collect();

        let mut segments = Vec::new();
        let mut cursor = by_id.get(id).and_then(|p| p.parent_id.as_deref());
        while let Some(parent) = cursor.and_then(|c| by_id.get(c)) {
            if segments.len() > by_id.len() {
                break;
            }
            segments.push(parent.name.as_str());
            cursor = parent.parent_id.as_deref();
        }
        segments.reverse();
        segments.join("/")
    }
}

#[derive(Debug, Deserialize)]
struct RawPrograms {
    #[serde(rename = "program", default)]
    programs: Vec<RawProgram>,
}

#[derive(Debug, Deserialize)]
struct RawProgram {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@parentId", default)]
    parent_id: Option<String>,
    #[serde(rename = "@status", default)]
    status: Option<String>,
    #[serde(rename = "@folder", default)]
    folder: Option<String>,
    #[serde(rename = "@enabled", default)]
    enabled: Option<String>,
    #[serde(rename = "@runAtStartup", default)]
    run_at_startup: Option<String>,
    #[serde(rename = "@running", default)]
    running: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "lastRunTime", default)]
    last_run: Option<String>,
    #[serde(rename = "lastFinishTime", default)]
    last_finished: Option<String>,
    #[serde(rename = "nextScheduledRunTime", default)]
    next_scheduled: Option<String>,
}

fn flag(raw: Option<String>) -> Option<bool> {
    non_empty(raw).and_then(|v| parse_flag(&v))
}

pub fn parse_programs(xml: &str) -> ParseResult<ProgramList> {
    let raw: RawPrograms = xml_decode::parse(xml)?;
    let programs = raw
        .programs
        .into_iter()
        .filter(|p| !p.id.trim().is_empty())
        .map(|p| {
            let id = normalize_program_id(&p.id);
            ProgramDescriptor {
                name: non_empty(p.name).unwrap_or_else(|| id.clone()),
                parent_id: non_empty(p.parent_id).map(|pid| normalize_program_id(&pid)),
                is_folder: flag(p.folder).unwrap_or(false),
                status: flag(p.status),
                enabled: flag(p.enabled),
                run_at_startup: flag(p.run_at_startup),
                running: non_empty(p.running)
                    .map(|r| ProgramRunning::from_rest(&r))
                    .unwrap_or_default(),
                last_run: non_empty(p.last_run),
                last_finished: non_empty(p.last_finished),
                next_scheduled: non_empty(p.next_scheduled),
                id,
            }
        })
        .collect();
    Ok(ProgramList { programs })
}
