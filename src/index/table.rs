//! Index implementation
//!
//! Primary maps plus the auxiliary lookups used by deletes.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Result, VislogError};
use crate::log;
use crate::record::{Action, ConfigEntry, Control, DataEntry, Name, Record, Scope, Tag};

use super::{ApplyOutcome, LoadReport};

/// In-memory index derived from the index log
///
/// Not synchronized; the store wraps it in a lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    pub(super) scopes: BTreeMap<u32, Scope>,
    pub(super) names: BTreeMap<u32, Name>,
    pub(super) entries: BTreeMap<u32, DataEntry>,
    pub(super) config_entries: BTreeMap<u32, ConfigEntry>,

    /// (scope, name) -> every live name_id registered under it
    pub(super) tag_to_names: HashMap<Tag, Vec<u32>>,

    /// name_id -> entry_ids of its DataEntries
    pub(super) name_to_entries: HashMap<u32, Vec<u32>>,

    /// scope string -> entry_ids of its ConfigEntries
    pub(super) scope_to_configs: HashMap<String, Vec<u32>>,

    /// Largest id ever applied, across all four id spaces
    pub(super) max_id: u32,

    /// Largest end_offset ever applied
    pub(super) high_water: u64,
}

impl Index {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index by replaying the log at `path`
    pub fn open(path: &Path) -> Result<(Self, LoadReport)> {
        let mut index = Self::new();
        let report = index.load(path)?;
        Ok((index, report))
    }

    /// Replay every frame of the index log at `path`
    ///
    /// A torn or malformed frame ends the replay; it is reported, not
    /// returned as an error. Fails on I/O errors and on duplicate ids.
    pub fn load(&mut self, path: &Path) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        let summary = log::scan(path, |offset, record| {
            match self.apply(record) {
                Ok(ApplyOutcome::Applied) => report.records_applied += 1,
                Ok(ApplyOutcome::Ignored) => report.records_ignored += 1,
                Err(e) => {
                    tracing::error!("Index replay failed at offset {}: {}", offset, e);
                    return Err(e);
                }
            }
            Ok(())
        })?;

        report.valid_len = summary.valid_len;
        report.discarded_bytes = summary.torn_bytes();
        report.tail_error = summary.tail_error;

        Ok(report)
    }

    /// Apply one record
    ///
    /// Duplicate ids return `Corruption` and leave the index untouched.
    pub fn apply(&mut self, record: Record) -> Result<ApplyOutcome> {
        match record {
            Record::Scope(scope) => self.apply_scope(scope),
            Record::Name(name) => self.apply_name(name),
            Record::Control(control) => Ok(self.apply_control(&control)),
            Record::DataEntry(entry) => self.apply_data_entry(entry),
            Record::ConfigEntry(entry) => self.apply_config_entry(entry),
            Record::Data(_) | Record::Config(_) => {
                tracing::warn!("Ignoring {} record found in index log", record.kind());
                Ok(ApplyOutcome::Ignored)
            }
        }
    }

    fn apply_scope(&mut self, scope: Scope) -> Result<ApplyOutcome> {
        if self.scopes.contains_key(&scope.scope_id) {
            return Err(VislogError::Corruption(format!(
                "duplicate scope_id {} ({:?})",
                scope.scope_id, scope.scope
            )));
        }

        self.bump_id(scope.scope_id);
        self.scopes.insert(scope.scope_id, scope);
        Ok(ApplyOutcome::Applied)
    }

    fn apply_name(&mut self, name: Name) -> Result<ApplyOutcome> {
        let scope = match self.scopes.get(&name.scope_id) {
            Some(scope) => scope.scope.clone(),
            None => {
                tracing::debug!(
                    "Dropping name {} ({:?}): unknown scope_id {}",
                    name.name_id,
                    name.name,
                    name.scope_id
                );
                return Ok(ApplyOutcome::Ignored);
            }
        };
        if self.names.contains_key(&name.name_id) {
            return Err(VislogError::Corruption(format!(
                "duplicate name_id {} ({:?}) under scope {:?}",
                name.name_id, name.name, scope
            )));
        }

        self.bump_id(name.name_id);
        self.tag_to_names
            .entry(Tag::new(scope, name.name.clone()))
            .or_default()
            .push(name.name_id);
        self.names.insert(name.name_id, name);
        Ok(ApplyOutcome::Applied)
    }

    fn apply_control(&mut self, control: &Control) -> ApplyOutcome {
        let removed = match control.action {
            Action::DeleteName => {
                self.remove_tag(&Tag::new(control.scope.clone(), control.name.clone()))
            }
            Action::DeleteScope => self.remove_scope(&control.scope),
        };

        if removed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Ignored
        }
    }

    fn apply_data_entry(&mut self, entry: DataEntry) -> Result<ApplyOutcome> {
        if !self.names.contains_key(&entry.name_id) {
            tracing::debug!(
                "Dropping data entry {}: unknown name_id {}",
                entry.entry_id,
                entry.name_id
            );
            return Ok(ApplyOutcome::Ignored);
        }
        if self.entries.contains_key(&entry.entry_id) {
            return Err(VislogError::Corruption(format!(
                "duplicate data entry_id {}",
                entry.entry_id
            )));
        }

        self.bump_id(entry.entry_id);
        self.bump_offset(entry.end_offset);
        self.name_to_entries
            .entry(entry.name_id)
            .or_default()
            .push(entry.entry_id);
        self.entries.insert(entry.entry_id, entry);
        Ok(ApplyOutcome::Applied)
    }

    fn apply_config_entry(&mut self, entry: ConfigEntry) -> Result<ApplyOutcome> {
        let scope = match self.scopes.get(&entry.scope_id) {
            Some(scope) => scope.scope.clone(),
            None => {
                tracing::debug!(
                    "Dropping config entry {}: unknown scope_id {}",
                    entry.entry_id,
                    entry.scope_id
                );
                return Ok(ApplyOutcome::Ignored);
            }
        };
        if self.config_entries.contains_key(&entry.entry_id) {
            return Err(VislogError::Corruption(format!(
                "duplicate config entry_id {}",
                entry.entry_id
            )));
        }

        self.bump_id(entry.entry_id);
        self.bump_offset(entry.end_offset);
        self.scope_to_configs
            .entry(scope)
            .or_default()
            .push(entry.entry_id);
        self.config_entries.insert(entry.entry_id, entry);
        Ok(ApplyOutcome::Applied)
    }

    /// Remove every name registered under `tag`, with their data entries
    fn remove_tag(&mut self, tag: &Tag) -> bool {
        let name_ids = match self.tag_to_names.remove(tag) {
            Some(ids) => ids,
            None => return false,
        };

        for name_id in &name_ids {
            self.names.remove(name_id);
            if let Some(entry_ids) = self.name_to_entries.remove(name_id) {
                for entry_id in entry_ids {
                    self.entries.remove(&entry_id);
                }
            }
        }

        tracing::debug!(
            "Deleted {:?}/{:?}: {} name(s)",
            tag.scope,
            tag.name,
            name_ids.len()
        );
        true
    }

    /// Remove every scope called `scope`, with all of its names and configs
    fn remove_scope(&mut self, scope: &str) -> bool {
        let scope_ids: Vec<u32> = self
            .scopes
            .values()
            .filter(|s| s.scope == scope)
            .map(|s| s.scope_id)
            .collect();
        if scope_ids.is_empty() {
            return false;
        }

        let tags: Vec<Tag> = self
            .tag_to_names
            .keys()
            .filter(|tag| tag.scope == scope)
            .cloned()
            .collect();
        for tag in &tags {
            self.remove_tag(tag);
        }

        if let Some(entry_ids) = self.scope_to_configs.remove(scope) {
            for entry_id in entry_ids {
                self.config_entries.remove(&entry_id);
            }
        }

        for scope_id in &scope_ids {
            self.scopes.remove(scope_id);
        }

        tracing::debug!("Deleted scope {:?}: {} scope record(s)", scope, scope_ids.len());
        true
    }

    fn bump_id(&mut self, id: u32) {
        self.max_id = self.max_id.max(id);
    }

    fn bump_offset(&mut self, end_offset: u64) {
        self.high_water = self.high_water.max(end_offset);
    }
}
