//! Tracks approximate live-entry bytes and rejects writes over budget.

use std::sync::atomic::{AtomicI64, Ordering};

/// `MaxMemory` of 0 means unbounded.
pub struct Accountant {
    max_memory: u64,
    used: AtomicI64,
}

impl Accountant {
    pub fn new(max_memory: u64) -> Self {
        Self { max_memory, used: AtomicI64::new(0) }
    }

    /// Seeds the tally from a reloaded keyspace's total live size.
    pub fn seed(&self, total: u64) {
        self.used.store(total as i64, Ordering::SeqCst);
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst).max(0) as u64
    }

    /// Whether applying `delta` (signed: new size minus old size, summed
    /// over the write set) would push the total past `MaxMemory`.
    pub fn would_exceed(&self, delta: i64) -> bool {
        if self.max_memory == 0 {
            return false;
        }
        let projected = self.used.load(Ordering::SeqCst) + delta;
        projected > 0 && projected as u64 > self.max_memory
    }

    /// Commits `delta` to the running tally. Only called after
    /// `would_exceed` has already passed for the same delta.
    pub fn apply(&self, delta: i64) {
        self.used.fetch_add(delta, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_budget_never_rejects() {
        let a = Accountant::new(0);
        assert!(!a.would_exceed(1_000_000_000));
    }

    #[test]
    fn rejects_delta_that_would_exceed_budget() {
        let a = Accountant::new(100);
        assert!(!a.would_exceed(100));
        assert!(a.would_exceed(101));
    }

    #[test]
    fn apply_tracks_running_total() {
        let a = Accountant::new(0);
        a.apply(50);
        a.apply(-20);
        assert_eq!(a.used(), 30);
    }
}
