//! Insertion Order Module
//!
//! Tracks the order in which keys first entered the cache.

use std::collections::{BTreeMap, HashMap};

// == Insertion Order ==
/// Remembers key insertion order for iteration and first-fit admission.
///
/// Each key gets an increasing sequence number on insertion:
/// - `sequences` maps key -> sequence for removal by key
/// - `keys` maps sequence -> key, oldest first
///
/// Push and remove are both logarithmic. Overwriting a key does not move it.
#[derive(Debug, Default, Clone)]
pub struct InsertionOrder {
    sequences: HashMap<String, u64>,
    keys: BTreeMap<u64, String>,
    next_sequence: u64,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    // == Push ==
    /// Appends a newly inserted key. A key already tracked keeps its place.
    pub fn push(&mut self, key: &str) {
        if self.sequences.contains_key(key) {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.sequences.insert(key.to_string(), sequence);
        self.keys.insert(sequence, key.to_string());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &str) {
        if let Some(sequence) = self.sequences.remove(key) {
            self.keys.remove(&sequence);
        }
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.sequences.clear();
        self.keys.clear();
    }

    // == Iter ==
    /// Iterates keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.keys.values()
    }

    // == Snapshot ==
    /// Returns an owned copy of the keys, oldest first.
    pub fn to_vec(&self) -> Vec<String> {
        self.keys.values().cloned().collect()
    }
}
