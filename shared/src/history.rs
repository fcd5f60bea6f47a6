//! Bounded, time-ordered window of recent snapshots.
//!
//! The buffer keeps snapshots newest-first. Insertion tolerates out-of-order arrival
//! (datagrams get reordered in flight), and two independent bounds keep it small:
//! a maximum count and a maximum age. Either bound can be switched off.

use crate::snapshot::Snapshot;
use std::sync::Arc;

/// Newer and older neighbours of a query time. See [`SnapshotHistory::bounds`].
#[derive(Debug, Clone, Default)]
pub struct Bounds {
    /// Newest snapshot with `time <= t`.
    pub at_or_before: Option<Arc<Snapshot>>,
    /// The snapshot immediately newer than `at_or_before` (or the oldest stored one when
    /// nothing is old enough).
    pub after: Option<Arc<Snapshot>>,
}

#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    /// Sorted descending by `time`.
    snapshots: Vec<Arc<Snapshot>>,
    capacity: Option<usize>,
    max_age: Option<f64>,
}

impl SnapshotHistory {
    pub fn new(capacity: Option<usize>, max_age: Option<f64>) -> Self {
        Self {
            snapshots: Vec::new(),
            capacity,
            max_age,
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn max_age(&self) -> Option<f64> {
        self.max_age
    }

    /// Changes the count bound. Excess entries are evicted oldest first.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
        if let Some(cap) = capacity {
            self.snapshots.truncate(cap);
        }
    }

    pub fn set_max_age(&mut self, max_age: Option<f64>) {
        self.max_age = max_age;
    }

    /// Inserts a snapshot, keeping the buffer sorted newest-first.
    ///
    /// Age eviction runs first, relative to the newest time known to the buffer including
    /// the incoming snapshot. A snapshot that is itself already expired is dropped and
    /// `false` is returned.
    pub fn stash(&mut self, snapshot: impl Into<Arc<Snapshot>>) -> bool {
        let snapshot = snapshot.into();

        if let Some(max_age) = self.max_age {
            let newest = self
                .head()
                .map_or(snapshot.time, |head| head.time.max(snapshot.time));
            self.clear_expired(newest);
            if snapshot.time < newest - max_age {
                return false;
            }
        }

        let pos = self
            .snapshots
            .iter()
            .position(|s| s.time < snapshot.time)
            .unwrap_or(self.snapshots.len());
        self.snapshots.insert(pos, snapshot);

        if let Some(cap) = self.capacity {
            if self.snapshots.len() > cap {
                self.snapshots.pop();
            }
        }
        true
    }

    /// Forgets every snapshot older than `now - max_age`. No-op when age is unbounded.
    pub fn clear_expired(&mut self, now: f64) {
        if let Some(max_age) = self.max_age {
            let cutoff = now - max_age;
            while self.snapshots.last().is_some_and(|s| s.time < cutoff) {
                self.snapshots.pop();
            }
        }
    }

    /// The pair of snapshots that most tightly bracket `t`.
    pub fn bounds(&self, t: f64) -> Bounds {
        match self.snapshots.iter().position(|s| s.time <= t) {
            Some(i) => Bounds {
                at_or_before: Some(Arc::clone(&self.snapshots[i])),
                after: i.checked_sub(1).map(|j| Arc::clone(&self.snapshots[j])),
            },
            None => Bounds {
                at_or_before: None,
                after: self.tail().cloned(),
            },
        }
    }

    /// Newest stored snapshot.
    pub fn head(&self) -> Option<&Arc<Snapshot>> {
        self.snapshots.first()
    }

    /// Oldest stored snapshot.
    pub fn tail(&self) -> Option<&Arc<Snapshot>> {
        self.snapshots.last()
    }

    /// Up to `amount` newest snapshots, newest first.
    pub fn front(&self, amount: usize) -> &[Arc<Snapshot>] {
        &self.snapshots[..amount.min(self.snapshots.len())]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Snapshot>> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

impl Default for SnapshotHistory {
    fn default() -> Self {
        Self::new(Some(20), None)
    }
}
