//! Memory-bounded heavy-hitter ranking.
//!
//! [`TopK`] tracks at most `capacity` keys. When a new key arrives at a full
//! table, the tracked key with the lowest count is evicted (ties go to the key
//! touched longest ago) and the newcomer starts from its own increment.
//!
//! Error bound: every reported count is a lower bound of the true count. A key
//! that has never been evicted is exact. Keys that recur more often than
//! `capacity - hot_keys` distinct newcomers arrive are never evicted, so under
//! the usual power-law skew with `capacity >= 3 * hot_keys` the reported
//! top-N is exact; only the long tail is approximate.

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKEntry {
    pub key: String,
    pub count: u64,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    count: u64,
    touched: u64,
}

#[derive(Debug, Clone)]
pub struct TopK {
    capacity: usize,
    slots: FxHashMap<String, Slot>,
    // (count, touched, key) ordered so the first element is the eviction victim
    order: BTreeSet<(u64, u64, String)>,
    clock: u64,
    total: u64,
    evictions: u64,
}

impl TopK {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: FxHashMap::default(),
            order: BTreeSet::new(),
            clock: 0,
            total: 0,
            evictions: 0,
        }
    }

    pub fn increment(&mut self, key: &str, by: u64) {
        if by == 0 {
            return;
        }
        self.clock += 1;
        self.total = self.total.saturating_add(by);

        if let Some(slot) = self.slots.get_mut(key) {
            self.order.remove(&(slot.count, slot.touched, key.to_string()));
            slot.count = slot.count.saturating_add(by);
            slot.touched = self.clock;
            self.order.insert((slot.count, slot.touched, key.to_string()));
            return;
        }

        if self.slots.len() >= self.capacity
            && let Some(victim) = self.order.pop_first()
        {
            self.slots.remove(&victim.2);
            self.evictions += 1;
        }

        let slot = Slot {
            count: by,
            touched: self.clock,
        };
        self.order.insert((slot.count, slot.touched, key.to_string()));
        self.slots.insert(key.to_string(), slot);
    }

    /// The `n` highest counts, descending; equal counts are ordered by key.
    pub fn top_n(&self, n: usize) -> Vec<TopKEntry> {
        let mut entries: Vec<TopKEntry> = self
            .slots
            .iter()
            .map(|(key, slot)| TopKEntry {
                key: key.clone(),
                count: slot.count,
            })
            .collect();
        entries.sort_unstable_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(n);
        entries
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.slots.get(key).map(|s| s.count)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sum of every increment, including those of evicted keys.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.order.clear();
        self.total = 0;
        self.evictions = 0;
    }
}
