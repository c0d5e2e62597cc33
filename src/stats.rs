use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatField {
    Running,
    Success,
    Fail,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_wallets: usize,
    pub running_count: usize,
    pub success_count: u64,
    pub fail_count: u64,
}

impl StatsSnapshot {
    pub fn attempts(&self) -> u64 {
        self.success_count + self.fail_count
    }

    /// Percentage of successful attempts, 0.0 before the first attempt.
    pub fn success_rate(&self) -> f64 {
        match self.attempts() {
            0 => 0.0,
            attempts => self.success_count as f64 / attempts as f64 * 100.0,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wallets: {} | Running: {} | Success: {} | Fail: {} | Success rate: {:.1}%",
            self.total_wallets,
            self.running_count,
            self.success_count,
            self.fail_count,
            self.success_rate()
        )
    }
}

/// Counters shared by every worker. A single mutex covers all of them so a
/// snapshot never observes a half-applied update.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsSnapshot>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        // Counters stay consistent even if a holder panicked: every update is a
        // single field write.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_total(&self, total: usize) {
        self.lock().total_wallets = total;
    }

    pub fn increment(&self, field: StatField) {
        let mut stats = self.lock();
        match field {
            StatField::Running => stats.running_count += 1,
            StatField::Success => stats.success_count += 1,
            StatField::Fail => stats.fail_count += 1,
        }
    }

    /// Saturates at zero.
    pub fn decrement(&self, field: StatField) {
        let mut stats = self.lock();
        match field {
            StatField::Running => stats.running_count = stats.running_count.saturating_sub(1),
            StatField::Success => stats.success_count = stats.success_count.saturating_sub(1),
            StatField::Fail => stats.fail_count = stats.fail_count.saturating_sub(1),
        }
    }

    pub fn record_attempt(&self, success: bool) {
        self.increment(if success {
            StatField::Success
        } else {
            StatField::Fail
        });
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.lock()
    }
}

/// Holds one unit of `running_count` for as long as it lives.
///
/// Dropping happens on every exit path of the owning future, including panics
/// and task abortion, so the count is released exactly once.
pub struct RunningGuard {
    stats: Arc<Stats>,
}

impl RunningGuard {
    pub fn enter(stats: Arc<Stats>) -> Self {
        stats.increment(StatField::Running);
        Self { stats }
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.stats.decrement(StatField::Running);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let empty = StatsSnapshot::default();
        assert_eq!(empty.success_rate(), 0.0);

        let snapshot = StatsSnapshot {
            total_wallets: 2,
            running_count: 0,
            success_count: 1,
            fail_count: 3,
        };
        assert_eq!(snapshot.attempts(), 4);
        assert_eq!(snapshot.success_rate(), 25.0);
        assert!(snapshot.to_string().contains("Success rate: 25.0%"));
    }

    #[test]
    fn test_decrement_saturates() {
        let stats = Stats::new();
        stats.decrement(StatField::Running);
        assert_eq!(stats.snapshot().running_count, 0);
    }

    #[test]
    fn test_running_guard_releases_on_drop() {
        let stats = Arc::new(Stats::new());
        {
            let _first = RunningGuard::enter(stats.clone());
            let _second = RunningGuard::enter(stats.clone());
            assert_eq!(stats.snapshot().running_count, 2);
        }
        assert_eq!(stats.snapshot().running_count, 0);
    }

    #[test]
    fn test_running_guard_releases_on_panic() {
        let stats = Arc::new(Stats::new());
        let cloned = stats.clone();

        let result = std::thread::spawn(move || {
            let _guard = RunningGuard::enter(cloned);
            panic!("boom");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(stats.snapshot().running_count, 0);
    }

    #[test]
    fn test_concurrent_updates_are_consistent() {
        let stats = Arc::new(Stats::new());
        stats.set_total(8);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    let _guard = RunningGuard::enter(stats.clone());
                    for _ in 0..1000 {
                        stats.record_attempt(i % 2 == 0);
                    }
                })
            })
            .collect();

        let mut last_attempts = 0;
        while handles.iter().any(|h| !h.is_finished()) {
            let snapshot = stats.snapshot();
            assert!(snapshot.attempts() >= last_attempts);
            assert!(snapshot.running_count <= snapshot.total_wallets);
            last_attempts = snapshot.attempts();
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.success_count, 4000);
        assert_eq!(snapshot.fail_count, 4000);
        assert_eq!(snapshot.running_count, 0);
    }
}
