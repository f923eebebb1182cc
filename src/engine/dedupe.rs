//! Job-wide record of which (check, dedupe key) pairs already ran.

use std::collections::{HashMap, HashSet};

/// Seen dedupe keys per check id.
///
/// Entries only grow for the lifetime of a job: the first target producing a
/// key for a check runs it, every later target with the same key is skipped.
#[derive(Debug, Default)]
pub struct DedupeCache {
    seen: HashMap<String, HashSet<String>>,
}

impl DedupeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `check` already ran for `key`.
    pub fn seen(&self, check: &str, key: &str) -> bool {
        self.seen.get(check).is_some_and(|keys| keys.contains(key))
    }

    /// Record that `check` ran for `key`.
    pub fn record(&mut self, check: &str, key: &str) {
        self.seen
            .entry(check.to_string())
            .or_default()
            .insert(key.to_string());
    }

    /// Record `key` for `check`, returning `true` if it was not seen before.
    pub fn admit(&mut self, check: &str, key: &str) -> bool {
        if self.seen(check, key) {
            return false;
        }
        self.record(check, key);
        true
    }

    /// Number of keys recorded for a check.
    pub fn keys_for(&self, check: &str) -> usize {
        self.seen.get(check).map_or(0, HashSet::len)
    }
}
