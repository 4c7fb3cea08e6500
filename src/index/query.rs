//! Index queries
//!
//! Read-only lookups over a snapshot of the index.

use std::collections::HashSet;

use regex::Regex;

use crate::record::{ConfigEntry, DataEntry, Name, Scope, Tag};

use super::Index;

impl Index {
    // =========================================================================
    // Entry Lists
    // =========================================================================

    /// Data entries whose name matches `name_pat`, whose scope matches
    /// `scope_pat`, and whose `end_offset > min_offset`, ordered by offset
    pub fn entry_list(&self, scope_pat: &Regex, name_pat: &Regex, min_offset: u64) -> Vec<DataEntry> {
        let mut entries: Vec<DataEntry> = self
            .entries
            .values()
            .filter(|entry| entry.end_offset > min_offset)
            .filter(|entry| {
                self.names
                    .get(&entry.name_id)
                    .map_or(false, |name| self.name_matches(name, scope_pat, name_pat))
            })
            .copied()
            .collect();

        entries.sort_by_key(|entry| (entry.beg_offset, entry.entry_id));
        entries
    }

    /// Config entries whose scope matches `scope_pat` and whose
    /// `end_offset > min_offset`, ordered by offset
    pub fn config_entry_list(&self, scope_pat: &Regex, min_offset: u64) -> Vec<ConfigEntry> {
        let mut entries: Vec<ConfigEntry> = self
            .config_entries
            .values()
            .filter(|entry| entry.end_offset > min_offset)
            .filter(|entry| {
                self.scopes
                    .get(&entry.scope_id)
                    .map_or(false, |scope| scope_pat.is_match(&scope.scope))
            })
            .copied()
            .collect();

        entries.sort_by_key(|entry| (entry.beg_offset, entry.entry_id));
        entries
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Scopes matching `scope_pat` that own at least one live name
    pub fn scopes(&self, scope_pat: &Regex) -> Vec<Scope> {
        let populated: HashSet<u32> = self.names.values().map(|name| name.scope_id).collect();

        self.scopes
            .values()
            .filter(|scope| populated.contains(&scope.scope_id))
            .filter(|scope| scope_pat.is_match(&scope.scope))
            .cloned()
            .collect()
    }

    /// Names matching both patterns that own at least one live data entry
    pub fn names(&self, scope_pat: &Regex, name_pat: &Regex) -> Vec<Name> {
        self.names
            .values()
            .filter(|name| {
                self.name_to_entries
                    .get(&name.name_id)
                    .map_or(false, |entries| !entries.is_empty())
            })
            .filter(|name| self.name_matches(name, scope_pat, name_pat))
            .cloned()
            .collect()
    }

    /// Live name_ids registered under `tag`
    pub fn name_ids(&self, tag: &Tag) -> &[u32] {
        self.tag_to_names
            .get(tag)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // =========================================================================
    // Point Lookups
    // =========================================================================

    pub fn scope(&self, scope_id: u32) -> Option<&Scope> {
        self.scopes.get(&scope_id)
    }

    pub fn name(&self, name_id: u32) -> Option<&Name> {
        self.names.get(&name_id)
    }

    pub fn entry(&self, entry_id: u32) -> Option<&DataEntry> {
        self.entries.get(&entry_id)
    }

    pub fn config_entry(&self, entry_id: u32) -> Option<&ConfigEntry> {
        self.config_entries.get(&entry_id)
    }

    // =========================================================================
    // Counters
    // =========================================================================

    /// Largest id ever applied across scopes, names, entries and config entries
    ///
    /// Deletes never lower it, so seeding an id counter from it can never
    /// reissue an id.
    pub fn max_id(&self) -> u32 {
        self.max_id
    }

    /// Largest data-log `end_offset` ever applied
    pub fn high_water(&self) -> u64 {
        self.high_water
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn config_entry_count(&self) -> usize {
        self.config_entries.len()
    }

    fn name_matches(&self, name: &Name, scope_pat: &Regex, name_pat: &Regex) -> bool {
        name_pat.is_match(&name.name)
            && self
                .scopes
                .get(&name.scope_id)
                .map_or(false, |scope| scope_pat.is_match(&scope.scope))
    }
}
