//! Per-container registration store

use crate::{
    entry::RegistrationEntry,
    key::{RegistryKey, TypeKey},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

/// Concurrent map from key to registration.
///
/// Insertion never overwrites. Lookups hand out `Arc` clones so no shard lock
/// is held while the caller resolves.
#[derive(Debug, Default)]
pub struct Registry {
    entries: DashMap<RegistryKey, Arc<RegistrationEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert iff absent; false when the key is taken
    pub fn insert(&self, key: RegistryKey, entry: Arc<RegistrationEntry>) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(entry);
                true
            }
        }
    }

    /// Insert iff absent and return whichever entry holds the key afterwards
    pub fn insert_or_get(
        &self,
        key: RegistryKey,
        entry: Arc<RegistrationEntry>,
    ) -> Arc<RegistrationEntry> {
        self.entries.entry(key).or_insert(entry).value().clone()
    }

    pub fn get(&self, key: &RegistryKey) -> Option<Arc<RegistrationEntry>> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &RegistryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Every entry whose contract is `contract`, any priority key
    pub fn by_contract(&self, contract: &TypeKey) -> Vec<(RegistryKey, Arc<RegistrationEntry>)> {
        let mut found: Vec<_> = self
            .entries
            .iter()
            .filter(|item| item.key().contract == *contract)
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        found.sort_by(|a, b| a.0.priority.cmp(&b.0.priority));
        found
    }

    pub fn remove(&self, key: &RegistryKey) -> Option<Arc<RegistrationEntry>> {
        self.entries.remove(key).map(|(_, entry)| entry)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
