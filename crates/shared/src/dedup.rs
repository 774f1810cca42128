//! Bounded "already printed" cache for log excerpts.
//!
//! Pod and container logs are polled repeatedly; printing the same excerpt on
//! every poll drowns the interesting lines. The cache keeps the SHA-256 of a
//! fingerprint window of each printed log and evicts the least recently seen
//! entry once `capacity` is reached.

use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// Default number of remembered fingerprints.
pub const DEFAULT_CAPACITY: usize = 512;
/// Characters taken from the end of the log before fingerprinting.
pub const TAIL_WINDOW_CHARS: usize = 50_000;
/// Characters of the tail window that form the fingerprint.
pub const FINGERPRINT_CHARS: usize = 5_000;

type Fingerprint = [u8; 32];

/// LRU set of log fingerprints.
#[derive(Debug, Clone)]
pub struct PrintedLogCache {
    capacity: usize,
    entries: VecDeque<Fingerprint>,
}

impl Default for PrintedLogCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PrintedLogCache {
    /// Create a cache remembering at most `capacity` fingerprints.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Number of remembered fingerprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record `log` and return true when it was not seen before.
    ///
    /// A hit refreshes the entry's recency.
    pub fn insert_if_new(&mut self, log: &str) -> bool {
        let key = fingerprint(log);
        if let Some(position) = self.entries.iter().position(|entry| *entry == key) {
            self.entries.remove(position);
            self.entries.push_back(key);
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(key);
        true
    }
}

fn fingerprint(log: &str) -> Fingerprint {
    let total = log.chars().count();
    let window: String = log
        .chars()
        .skip(total.saturating_sub(TAIL_WINDOW_CHARS))
        .take(FINGERPRINT_CHARS)
        .collect();
    Sha256::digest(window.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_log_is_reported_once() {
        let mut cache = PrintedLogCache::default();
        assert!(cache.insert_if_new("ERROR backup failed"));
        assert!(!cache.insert_if_new("ERROR backup failed"));
        assert!(cache.insert_if_new("WARN slow node"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn least_recently_seen_entry_is_evicted() {
        let mut cache = PrintedLogCache::new(2);
        assert!(cache.insert_if_new("a"));
        assert!(cache.insert_if_new("b"));
        assert!(!cache.insert_if_new("a"));
        assert!(cache.insert_if_new("c"));

        assert!(!cache.insert_if_new("a"));
        assert!(cache.insert_if_new("b"));
    }

    #[test]
    fn fingerprint_uses_head_of_tail_window() {
        let prefix = "p".repeat(TAIL_WINDOW_CHARS);
        let head = "h".repeat(FINGERPRINT_CHARS);
        let first = format!("{prefix}{head}{}", "x".repeat(TAIL_WINDOW_CHARS - FINGERPRINT_CHARS));
        let second = format!("other{head}{}", "x".repeat(TAIL_WINDOW_CHARS - FINGERPRINT_CHARS));

        let mut cache = PrintedLogCache::default();
        assert!(cache.insert_if_new(&first));
        assert!(!cache.insert_if_new(&second));
    }
}
