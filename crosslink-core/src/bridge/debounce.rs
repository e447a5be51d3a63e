//! Debounced delivery queue.
//!
//! Each target (a consumer's notification stream or a reactive observer)
//! has at most one pending entry. A new change for the same target replaces
//! the pending sequence and pushes the deadline out by the window, but never
//! past `first change + max_wait`. Intermediate states are never queued:
//! when the entry fires, the payload is built from the state at that moment.

use std::hash::Hash;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use super::protocol::Origin;

/// One coalesced pending delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    /// When the oldest undelivered change was recorded.
    pub first: Instant,
    /// When the entry becomes due.
    pub deadline: Instant,
    /// Sequence of the most recent change.
    pub sequence: u64,
    /// Origin of the most recent change.
    pub origin: Origin,
}

/// Pending deliveries keyed by target.
#[derive(Debug, Clone)]
pub struct Debouncer<K> {
    window: Duration,
    max_wait: Duration,
    pending: IndexMap<K, Pending>,
}

impl<K> Debouncer<K>
where
    K: Hash + Eq + Copy,
{
    pub fn new(window: Duration, max_wait: Duration) -> Self {
        Self {
            window,
            max_wait: max_wait.max(window),
            pending: IndexMap::new(),
        }
    }

    /// Record a change for `target` at `now`.
    pub fn schedule(&mut self, target: K, now: Instant, sequence: u64, origin: Origin) {
        let window = self.window;
        let max_wait = self.max_wait;
        self.pending
            .entry(target)
            .and_modify(|p| {
                p.deadline = (now + window).min(p.first + max_wait);
                p.sequence = sequence;
                p.origin = origin;
            })
            .or_insert(Pending {
                first: now,
                deadline: now + window,
                sequence,
                origin,
            });
    }

    /// Move an existing entry for `target` to `sequence` without changing its
    /// origin. Returns `false` when nothing is pending for `target`.
    pub fn reschedule(&mut self, target: &K, now: Instant, sequence: u64) -> bool {
        let window = self.window;
        let max_wait = self.max_wait;
        match self.pending.get_mut(target) {
            Some(p) => {
                p.deadline = (now + window).min(p.first + max_wait);
                p.sequence = sequence;
                true
            }
            None => false,
        }
    }

    /// Drop the pending entry for `target`, if any.
    pub fn cancel(&mut self, target: &K) -> Option<Pending> {
        self.pending.shift_remove(target)
    }

    /// Drop every pending entry whose target matches `pred`.
    pub fn cancel_where<F>(&mut self, mut pred: F)
    where
        F: FnMut(&K) -> bool,
    {
        self.pending.retain(|k, _| !pred(k));
    }

    /// Remove and return every entry due at `now`, oldest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, Pending)> {
        let mut due = Vec::new();
        self.pending.retain(|k, p| {
            if p.deadline <= now {
                due.push((*k, *p));
                false
            } else {
                true
            }
        });
        due
    }

    /// Earliest deadline among pending entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn is_pending(&self, target: &K) -> bool {
        self.pending.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(100);
    const MAX_WAIT: Duration = Duration::from_millis(250);

    #[test]
    fn not_due_before_window() {
        let start = Instant::now();
        let mut queue = Debouncer::new(WINDOW, MAX_WAIT);
        queue.schedule(1_u32, start, 1, Origin::Server);

        assert!(queue.take_due(start + Duration::from_millis(50)).is_empty());
        let due = queue.take_due(start + WINDOW);
        assert_eq!(due.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn coalesces_to_latest_sequence() {
        let start = Instant::now();
        let mut queue = Debouncer::new(WINDOW, MAX_WAIT);
        queue.schedule(1_u32, start, 1, Origin::Server);
        queue.schedule(1_u32, start + Duration::from_millis(40), 2, Origin::Server);
        queue.schedule(1_u32, start + Duration::from_millis(80), 3, Origin::Server);

        assert_eq!(queue.len(), 1);
        // Deadline moved out by the last change.
        assert!(queue.take_due(start + WINDOW).is_empty());
        let due = queue.take_due(start + Duration::from_millis(180));
        assert_eq!(due[0].1.sequence, 3);
    }

    #[test]
    fn max_wait_caps_continuous_changes() {
        let start = Instant::now();
        let mut queue = Debouncer::new(WINDOW, MAX_WAIT);
        for step in 0..10_u64 {
            queue.schedule(1_u32, start + Duration::from_millis(step * 50), step, Origin::Server);
        }
        assert_eq!(queue.next_deadline(), Some(start + MAX_WAIT));
    }

    #[test]
    fn zero_window_is_due_immediately() {
        let start = Instant::now();
        let mut queue = Debouncer::new(Duration::ZERO, Duration::ZERO);
        queue.schedule(1_u32, start, 1, Origin::Server);
        assert_eq!(queue.take_due(start).len(), 1);
    }

    #[test]
    fn reschedule_keeps_origin_and_never_inserts() {
        let start = Instant::now();
        let mut queue = Debouncer::new(WINDOW, MAX_WAIT);
        assert!(!queue.reschedule(&1_u32, start, 1));
        assert!(queue.is_empty());

        queue.schedule(1_u32, start, 1, Origin::Server);
        assert!(queue.reschedule(&1_u32, start + Duration::from_millis(60), 2));
        let due = queue.take_due(start + Duration::from_millis(160));
        assert_eq!(due[0].1.sequence, 2);
        assert_eq!(due[0].1.origin, Origin::Server);
    }

    #[test]
    fn cancel_removes_only_target() {
        let start = Instant::now();
        let mut queue = Debouncer::new(WINDOW, MAX_WAIT);
        queue.schedule(1_u32, start, 1, Origin::Server);
        queue.schedule(2_u32, start, 1, Origin::Server);
        assert!(queue.cancel(&1).is_some());
        assert!(!queue.is_pending(&1));
        assert!(queue.is_pending(&2));

        queue.cancel_where(|k| *k == 2);
        assert!(queue.is_empty());
    }
}
