//! Time-ordered deferred task queue.
//!
//! Tasks are ordered by due time ascending, then priority descending, then insertion order.
//! Payloads live in a slot map and the heap only holds `(time, priority, seq, key)` entries,
//! so cancelling a task is O(1): the task is flagged disabled and its heap entry is discarded
//! lazily once it reaches the front.

use log::warn;
use slotmap::{new_key_type, SlotMap};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Upper bound on tasks executed by a single [`Scheduler::process`] call.
pub const DEFAULT_DRAIN_BUDGET: usize = 10_000;

new_key_type! {
    /// Cancellation handle returned by [`Scheduler::queue`].
    ///
    /// A handle stays valid until its task has been popped (executed or skipped) or the queue
    /// is cleaned; afterwards every operation taking the handle is a no-op.
    pub struct TaskHandle;
}

#[derive(Debug)]
struct Task<T> {
    enabled: bool,
    payload: T,
}

#[derive(Debug)]
struct QueueEntry {
    time: f64,
    priority: i32,
    seq: u64,
    key: TaskHandle,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    // BinaryHeap is a max-heap; the "greatest" entry is the one that must run first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<QueueEntry>,
    tasks: SlotMap<TaskHandle, Task<T>>,
    next_seq: u64,
    drain_budget: usize,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::with_drain_budget(DEFAULT_DRAIN_BUDGET)
    }

    pub fn with_drain_budget(drain_budget: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            tasks: SlotMap::with_key(),
            next_seq: 0,
            drain_budget: drain_budget.max(1),
        }
    }

    /// Queues `payload` to run at or after `time`. Higher `priority` runs first among tasks
    /// due at the same time.
    pub fn queue(&mut self, time: f64, payload: T, priority: i32) -> TaskHandle {
        let key = self.tasks.insert(Task {
            enabled: true,
            payload,
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueueEntry {
            time,
            priority,
            seq,
            key,
        });
        key
    }

    /// Disables a queued task. Its queue entry lingers and is skipped once popped.
    ///
    /// Returns `false` if the task already ran, was already disabled or the queue was cleaned.
    pub fn disable(&mut self, handle: TaskHandle) -> bool {
        match self.tasks.get_mut(handle) {
            Some(task) if task.enabled => {
                task.enabled = false;
                true
            }
            _ => false,
        }
    }

    /// Whether the task is still queued and will run when due.
    pub fn is_enabled(&self, handle: TaskHandle) -> bool {
        self.tasks.get(handle).is_some_and(|task| task.enabled)
    }

    /// Time of the earliest queued entry, disabled ones included.
    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.time)
    }

    /// Pops the next enabled task due at or before `now`, silently discarding disabled
    /// entries on the way.
    pub fn pop_due(&mut self, now: f64) -> Option<T> {
        while self.heap.peek().is_some_and(|e| e.time <= now) {
            let entry = self.heap.pop()?;
            match self.tasks.remove(entry.key) {
                Some(task) if task.enabled => return Some(task.payload),
                _ => {}
            }
        }
        None
    }

    /// Runs every task due at or before `now`, in order.
    ///
    /// The callback receives the scheduler, so a task may queue or cancel other tasks. Newly
    /// queued tasks that are already due are picked up by the same call. The drain stops
    /// after the configured budget to guarantee progress if tasks keep rescheduling
    /// themselves for "now". Returns the number of tasks executed.
    pub fn process<F>(&mut self, now: f64, mut run: F) -> usize
    where
        F: FnMut(&mut Self, T),
    {
        let mut executed = 0;
        while let Some(payload) = self.pop_due(now) {
            run(self, payload);
            executed += 1;
            if executed >= self.drain_budget {
                if self.heap.peek().is_some_and(|e| e.time <= now) {
                    warn!(
                        "Scheduler drain budget of {} tasks hit at t={:.0}, deferring the rest",
                        self.drain_budget, now
                    );
                }
                break;
            }
        }
        executed
    }

    /// Discards every queued task. Outstanding handles become inert.
    pub fn clean(&mut self) {
        self.heap.clear();
        self.tasks.clear();
    }

    /// Queue entries, including disabled ones that have not been popped yet.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Entries that will still run.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|task| task.enabled).count()
    }
}
