//! Hub registry
//!
//! Maps hub identity to its live connection, keeps a case-insensitive
//! name index for human-addressed lookups, and owns the rule that variables
//! are tracked on at most one hub.

use isy_parser::HubInfo;
use isy_stream::{HubConnection, HubId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::HubOptions;
use crate::error::{Result, SdkError};

/// Identity and description of a configured hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubHandle {
    pub id: HubId,
    pub info: HubInfo,
    pub variables_enabled: bool,
}

pub(crate) struct HubEntry {
    pub handle: HubHandle,
    pub options: HubOptions,
    pub connection: Arc<HubConnection>,
}

/// Outcome of asking to bring a hub in
pub(crate) enum Admission {
    /// Already configured; nothing was reserved
    Existing(HubHandle),
    /// Reserved. Must be followed by `commit` or `abandon`.
    Admitted,
}

#[derive(Default)]
pub(crate) struct Coordinator {
    hubs: HashMap<HubId, Arc<HubEntry>>,
    names: HashMap<String, Vec<HubId>>,
    reserved: HashSet<HubId>,
    variables_owner: Option<HubId>,
}

impl Coordinator {
    /// Check a hub against the registry and reserve it, claiming variables
    /// when requested. Nothing is reserved on error.
    pub fn admit(&mut self, hub: &HubId, variables: bool) -> Result<Admission> {
        if let Some(entry) = self.hubs.get(hub) {
            return Ok(Admission::Existing(entry.handle.clone()));
        }
        if self.reserved.contains(hub) {
            return Err(SdkError::ConfigConflict(format!(
                "hub {hub} is already being configured"
            )));
        }
        if variables {
            if let Some(owner) = self.variables_owner.as_ref().filter(|owner| *owner != hub) {
                return Err(SdkError::ConfigConflict(format!(
                    "variables are already enabled on hub {owner}"
                )));
            }
            self.variables_owner = Some(hub.clone());
        }
        self.reserved.insert(hub.clone());
        Ok(Admission::Admitted)
    }

    pub fn commit(&mut self, entry: HubEntry) -> Arc<HubEntry> {
        let hub = entry.handle.id.clone();
        self.reserved.remove(&hub);
        let ids = self.names.entry(name_key(&entry.handle.info.name)).or_default();
        if !ids.contains(&hub) {
            ids.push(hub.clone());
            ids.sort();
        }
        let entry = Arc::new(entry);
        self.hubs.insert(hub, Arc::clone(&entry));
        entry
    }

    /// Drop a reservation that never became a hub
    pub fn abandon(&mut self, hub: &HubId) {
        self.reserved.remove(hub);
        self.release_variables(hub);
    }

    pub fn remove(&mut self, hub: &HubId) -> Option<Arc<HubEntry>> {
        let entry = self.hubs.remove(hub)?;
        self.names.retain(|_, ids| {
            ids.retain(|id| id != hub);
            !ids.is_empty()
        });
        self.release_variables(hub);
        Some(entry)
    }

    pub fn get(&self, hub: &HubId) -> Option<Arc<HubEntry>> {
        self.hubs.get(hub).cloned()
    }

    /// Hubs reporting this name, ordered by identity. Names are not unique.
    pub fn by_name(&self, name: &str) -> Vec<Arc<HubEntry>> {
        self.names
            .get(&name_key(name))
            .map(|ids| ids.iter().filter_map(|hub| self.get(hub)).collect())
            .unwrap_or_default()
    }

    /// Every configured hub, ordered by identity
    pub fn entries(&self) -> Vec<Arc<HubEntry>> {
        let mut entries: Vec<_> = self.hubs.values().cloned().collect();
        entries.sort_by(|a, b| a.handle.id.cmp(&b.handle.id));
        entries
    }

    pub fn variables_owner(&self) -> Option<&HubId> {
        self.variables_owner.as_ref()
    }

    fn release_variables(&mut self, hub: &HubId) {
        if self.variables_owner.as_ref() == Some(hub) {
            self.variables_owner = None;
        }
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub(id: &str) -> HubId {
        HubId::new(id)
    }

    #[test]
    fn test_second_variable_claim_conflicts() {
        let mut coordinator = Coordinator::default();
        assert!(matches!(
            coordinator.admit(&hub("aa"), true),
            Ok(Admission::Admitted)
        ));
        assert!(matches!(
            coordinator.admit(&hub("bb"), true),
            Err(SdkError::ConfigConflict(_))
        ));
        // The failed admission reserved nothing
        assert!(matches!(
            coordinator.admit(&hub("bb"), false),
            Ok(Admission::Admitted)
        ));
        assert_eq!(coordinator.variables_owner(), Some(&hub("aa")));
    }

    #[test]
    fn test_abandon_releases_claim() {
        let mut coordinator = Coordinator::default();
        assert!(coordinator.admit(&hub("aa"), true).is_ok());
        coordinator.abandon(&hub("aa"));
        assert_eq!(coordinator.variables_owner(), None);
        assert!(matches!(
            coordinator.admit(&hub("bb"), true),
            Ok(Admission::Admitted)
        ));
    }

    #[test]
    fn test_concurrent_setup_of_same_hub_conflicts() {
        let mut coordinator = Coordinator::default();
        assert!(coordinator.admit(&hub("aa"), false).is_ok());
        assert!(matches!(
            coordinator.admit(&hub("aa"), false),
            Err(SdkError::ConfigConflict(_))
        ));
    }
}
