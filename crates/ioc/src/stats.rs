//! Container counters and the skipped-item ledger

use crate::key::TypeKey;
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

/// A dependency that was left out instead of failing the whole resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    /// Object being built, or the sequence being assembled
    pub owner: TypeKey,
    /// Property name or registry key of the skipped element
    pub item: String,
    pub reason: String,
}

/// Snapshot of container activity
#[derive(Debug, Clone, Default)]
pub struct ContainerStats {
    pub registrations: usize,
    pub resolutions: u64,
    pub cache_hits: u64,
    pub builds: u64,
    pub promotions: u64,
    pub skipped_total: u64,
    pub recent_skips: Vec<SkippedItem>,
}

#[derive(Debug)]
pub(crate) struct StatsRecorder {
    resolutions: AtomicU64,
    cache_hits: AtomicU64,
    builds: AtomicU64,
    promotions: AtomicU64,
    skipped_total: AtomicU64,
    capacity: AtomicUsize,
    recent_skips: Mutex<VecDeque<SkippedItem>>,
}

impl StatsRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            resolutions: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            promotions: AtomicU64::new(0),
            skipped_total: AtomicU64::new(0),
            capacity: AtomicUsize::new(capacity.max(1)),
            recent_skips: Mutex::new(VecDeque::new()),
        }
    }

    pub fn set_capacity(&self, capacity: usize) {
        let capacity = capacity.max(1);
        self.capacity.store(capacity, Ordering::Relaxed);
        let mut ledger = self.recent_skips.lock();
        while ledger.len() > capacity {
            ledger.pop_front();
        }
    }

    pub fn resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Keep the newest `capacity` skips
    pub fn skipped(&self, item: SkippedItem) {
        self.skipped_total.fetch_add(1, Ordering::Relaxed);
        let capacity = self.capacity.load(Ordering::Relaxed);
        let mut ledger = self.recent_skips.lock();
        if ledger.len() >= capacity {
            ledger.pop_front();
        }
        ledger.push_back(item);
    }

    pub fn snapshot(&self, registrations: usize) -> ContainerStats {
        ContainerStats {
            registrations,
            resolutions: self.resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            skipped_total: self.skipped_total.load(Ordering::Relaxed),
            recent_skips: self.recent_skips.lock().iter().cloned().collect(),
        }
    }
}
