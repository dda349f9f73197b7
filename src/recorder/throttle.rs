//! Per-key rate limiting of audit records.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::summary::fingerprint;

/// Map from key fingerprints to the last time a record was written for
/// that key. Owned by the recorder and shared across tasks through it;
/// bounded by a size cap with pruning of entries older than the active
/// window.
#[derive(Debug)]
pub struct ThrottleState {
    entries: Mutex<HashMap<String, i64>>,
    cap: usize,
}

impl ThrottleState {
    /// State bounded to `cap` entries.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            cap,
        }
    }

    /// Whether a record for `key` should be suppressed.
    ///
    /// A window of 0 disables throttling. When not suppressed, the call
    /// marks the key as seen now.
    pub fn should_throttle(&self, key: &str, window_seconds: u64) -> bool {
        self.should_throttle_at(key, window_seconds, Utc::now().timestamp())
    }

    fn should_throttle_at(&self, key: &str, window_seconds: u64, now: i64) -> bool {
        if window_seconds == 0 {
            return false;
        }
        let window = i64::try_from(window_seconds).unwrap_or(i64::MAX);

        let fp = fingerprint(key);
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(last) = entries.get(&fp) {
            if now - last < window {
                return true;
            }
        }

        entries.insert(fp, now);

        if entries.len() > self.cap {
            let cutoff = now - window;
            entries.retain(|_, seen| *seen > cutoff);
        }

        false
    }

    /// Tracked entry count, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_window_never_throttles() {
        let state = ThrottleState::new(10);
        assert!(!state.should_throttle_at("k", 0, 100));
        assert!(!state.should_throttle_at("k", 0, 100));
        assert!(state.is_empty());
    }

    #[test]
    fn test_second_write_within_window_throttled() {
        let state = ThrottleState::new(10);
        assert!(!state.should_throttle_at("k", 60, 100));
        assert!(state.should_throttle_at("k", 60, 130));
    }

    #[test]
    fn test_write_after_window_allowed() {
        let state = ThrottleState::new(10);
        assert!(!state.should_throttle_at("k", 60, 100));
        assert!(state.should_throttle_at("k", 60, 130));
        assert!(!state.should_throttle_at("k", 60, 161));
    }

    #[test]
    fn test_keys_independent() {
        let state = ThrottleState::new(10);
        assert!(!state.should_throttle_at("a", 60, 100));
        assert!(!state.should_throttle_at("b", 60, 100));
    }

    #[test]
    fn test_prunes_when_over_cap() {
        let state = ThrottleState::new(3);
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let at = 100 + i64::try_from(i).unwrap();
            assert!(!state.should_throttle_at(key, 10, at));
        }
        assert_eq!(state.len(), 3);

        // This insert pushes the map over the cap; stale entries go.
        assert!(!state.should_throttle_at("d", 10, 500));
        assert_eq!(state.len(), 1);
    }
}
