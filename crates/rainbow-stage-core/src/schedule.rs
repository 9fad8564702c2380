//! Keyed debouncing of deferred work.
//!
//! Hosts own the clock: they schedule with the current instant and later
//! drain whatever has come due with [`Debouncer::take_due`]. Nothing here
//! spawns timers, which keeps the coordinator testable and single-threaded.

use std::time::Duration;

use web_time::Instant;

#[derive(Debug, Clone)]
struct Pending<K, T> {
    key: K,
    deadline: Instant,
    task: T,
}

/// Pending tasks, at most one per key.
#[derive(Debug, Clone)]
pub struct Debouncer<K, T> {
    pending: Vec<Pending<K, T>>,
}

impl<K, T> Default for Debouncer<K, T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<K: PartialEq, T> Debouncer<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run `delay` after `now`.
    ///
    /// Replaces whatever was pending under `key`: the last call wins and its
    /// deadline restarts.
    pub fn schedule(&mut self, key: K, task: T, delay: Duration, now: Instant) {
        self.cancel(&key);
        self.pending.push(Pending {
            key,
            deadline: now + delay,
            task,
        });
    }

    /// Drop the task pending under `key`, if any.
    pub fn cancel(&mut self, key: &K) -> Option<T> {
        let idx = self.pending.iter().position(|p| &p.key == key)?;
        Some(self.pending.remove(idx).task)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.iter().any(|p| &p.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest deadline among pending tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    /// Remove and return every task due at `now`, earliest deadline first.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let (mut due, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.deadline <= now);
        self.pending = rest;
        due.sort_by_key(|p| p.deadline);
        due.into_iter().map(|p| p.task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_trailing_call_wins() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule("select", 1, ms(50), t0);
        d.schedule("select", 2, ms(50), t0 + ms(30));

        assert!(d.take_due(t0 + ms(60)).is_empty());
        assert_eq!(d.take_due(t0 + ms(80)), vec![2]);
        assert!(d.is_empty());
    }

    #[test]
    fn test_due_in_deadline_order() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule("b", "late", ms(100), t0);
        d.schedule("a", "early", ms(10), t0);
        assert_eq!(d.next_deadline(), Some(t0 + ms(10)));
        assert_eq!(d.take_due(t0 + ms(100)), vec!["early", "late"]);
    }

    #[test]
    fn test_cancel() {
        let t0 = Instant::now();
        let mut d = Debouncer::new();
        d.schedule(1u8, 'x', ms(10), t0);
        assert!(d.is_pending(&1));
        assert_eq!(d.cancel(&1), Some('x'));
        assert!(!d.is_pending(&1));
        assert!(d.take_due(t0 + ms(20)).is_empty());
    }
}
