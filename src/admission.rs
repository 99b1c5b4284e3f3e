//! Admission Controller
//!
//! Per-caller fixed-window request counting that gates all downstream work.
//! Windows are fixed buckets (`window_index = now / window_len`) with hard
//! cutoff semantics: a fresh window starts at zero, nothing carries over.
//!
//! Counters live behind an injected [`CounterStore`] rather than ambient
//! process state, so the in-memory map can be swapped for a distributed
//! counter service without touching the controller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::error::AdmissionError;

/// What `allow()` answers when the counter store is unreachable. The choice
/// is an explicit deployment decision, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionPolicy {
    /// Availability bias: admit when the store cannot be consulted.
    FailOpen,
    /// Protection bias: deny when the store cannot be consulted.
    FailClosed,
}

/// Shared counter storage. The increment must be a single atomic step:
/// two concurrent calls for the same key must observe distinct counts.
pub trait CounterStore: Send + Sync {
    /// Atomically increment the counter for `(caller, window)` and return
    /// the new count. Implementations may purge counters belonging to other
    /// windows in the same step; stale windows are garbage.
    fn increment(&self, caller: &str, window: u64) -> Result<u64, AdmissionError>;
}

/// In-process counter store: one mutex around the whole map makes the
/// read-increment-compare sequence atomic.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<(String, u64), u64>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn live_entries(&self) -> usize {
        self.counters.lock().expect("counter lock").len()
    }
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for InMemoryCounterStore {
    fn increment(&self, caller: &str, window: u64) -> Result<u64, AdmissionError> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| AdmissionError::StoreUnreachable("counter lock poisoned".to_string()))?;
        // Opportunistic purge keeps memory bounded by the active caller set.
        counters.retain(|(_, w), _| *w == window);
        let count = counters
            .entry((caller.to_string(), window))
            .and_modify(|c| *c += 1)
            .or_insert(1);
        Ok(*count)
    }
}

/// Gate enforcing per-caller request rates.
pub struct AdmissionController {
    store: Box<dyn CounterStore>,
    max_requests: u64,
    window: Duration,
    policy: AdmissionPolicy,
}

impl AdmissionController {
    pub fn new(
        store: Box<dyn CounterStore>,
        max_requests: u64,
        window: Duration,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            store,
            max_requests,
            window,
            policy,
        }
    }

    /// Count this request against the caller's current window and answer
    /// whether it is admitted.
    pub fn allow(&self, caller: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.allow_at(caller, now)
    }

    /// `allow` with an explicit clock, for deterministic tests and replay.
    pub fn allow_at(&self, caller: &str, now_secs: u64) -> bool {
        let window = now_secs / self.window.as_secs().max(1);
        match self.store.increment(caller, window) {
            Ok(count) => count <= self.max_requests,
            Err(e) => {
                let admit = self.policy == AdmissionPolicy::FailOpen;
                warn!(caller, admit, error = %e, "counter store unreachable, applying admission policy");
                admit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(max: u64) -> AdmissionController {
        AdmissionController::new(
            Box::new(InMemoryCounterStore::new()),
            max,
            Duration::from_secs(60),
            AdmissionPolicy::FailClosed,
        )
    }

    #[test]
    fn admits_up_to_limit_then_denies() {
        let ctl = controller(5);
        for _ in 0..5 {
            assert!(ctl.allow_at("alice", 100));
        }
        assert!(!ctl.allow_at("alice", 100));
    }

    #[test]
    fn callers_are_counted_independently() {
        let ctl = controller(1);
        assert!(ctl.allow_at("alice", 100));
        assert!(ctl.allow_at("bob", 100));
        assert!(!ctl.allow_at("alice", 100));
    }

    #[test]
    fn window_rollover_resets_with_no_carry_over() {
        let ctl = controller(2);
        assert!(ctl.allow_at("alice", 59));
        assert!(ctl.allow_at("alice", 59));
        assert!(!ctl.allow_at("alice", 59));
        // Next window: fresh count, the previous overage is forgotten.
        assert!(ctl.allow_at("alice", 60));
        assert!(ctl.allow_at("alice", 60));
        assert!(!ctl.allow_at("alice", 60));
    }

    #[test]
    fn stale_windows_are_purged_on_increment() {
        let store = InMemoryCounterStore::new();
        store.increment("alice", 1).unwrap();
        store.increment("bob", 1).unwrap();
        assert_eq!(store.live_entries(), 2);
        store.increment("alice", 2).unwrap();
        assert_eq!(store.live_entries(), 1);
    }

    struct BrokenStore;

    impl CounterStore for BrokenStore {
        fn increment(&self, _caller: &str, _window: u64) -> Result<u64, AdmissionError> {
            Err(AdmissionError::StoreUnreachable("connection refused".to_string()))
        }
    }

    #[test]
    fn store_failure_follows_configured_policy() {
        let open = AdmissionController::new(
            Box::new(BrokenStore),
            5,
            Duration::from_secs(60),
            AdmissionPolicy::FailOpen,
        );
        assert!(open.allow_at("alice", 0));

        let closed = AdmissionController::new(
            Box::new(BrokenStore),
            5,
            Duration::from_secs(60),
            AdmissionPolicy::FailClosed,
        );
        assert!(!closed.allow_at("alice", 0));
    }

    #[test]
    fn concurrent_calls_never_admit_past_the_limit() {
        use std::sync::Arc;

        let ctl = Arc::new(controller(5));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctl = Arc::clone(&ctl);
                std::thread::spawn(move || ctl.allow_at("alice", 100))
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, 5);
    }
}
