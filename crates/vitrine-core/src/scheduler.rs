//! Reconcile task scheduling.
//!
//! A discrete-event priority queue holds one pending tick per showcase.
//! Cancellation is by generation: cancelling a handle bumps the key's
//! generation so any queued tick for an older generation is discarded when
//! popped and never re-armed. A cancelled task therefore cannot run again.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::showcase::ShowcaseKey;

/// Cancellable handle to one showcase's recurring reconcile task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    key: ShowcaseKey,
    generation: u64,
}

impl TaskHandle {
    pub fn key(&self) -> &ShowcaseKey {
        &self.key
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
struct ScheduledTick {
    due_tick: u64,
    sequence: u64,
    key: ShowcaseKey,
    generation: u64,
}

/// Ordering: (due_tick ASC, insertion sequence ASC). The sequence keeps
/// same-tick pops FIFO and deterministic.
#[derive(Debug, Clone, Eq, PartialEq)]
struct OrderedTick(ScheduledTick);

impl PartialOrd for OrderedTick {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedTick {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .due_tick
            .cmp(&other.0.due_tick)
            .then_with(|| self.0.sequence.cmp(&other.0.sequence))
    }
}

#[derive(Debug, Default)]
pub struct ReconcileScheduler {
    queue: BinaryHeap<Reverse<OrderedTick>>,
    generations: BTreeMap<ShowcaseKey, u64>,
    next_sequence: u64,
}

impl ReconcileScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the task for a showcase. Any previously issued
    /// handle for the same key is implicitly cancelled.
    pub fn start(&mut self, key: ShowcaseKey, due_tick: u64) -> TaskHandle {
        let generation = self
            .generations
            .entry(key.clone())
            .and_modify(|g| *g += 1)
            .or_insert(1);
        let handle = TaskHandle {
            key: key.clone(),
            generation: *generation,
        };
        self.push(key, due_tick, handle.generation);
        handle
    }

    /// Queue the next tick for a live handle. A no-op for cancelled or
    /// superseded handles.
    pub fn rearm(&mut self, handle: &TaskHandle, due_tick: u64) {
        if self.is_live(handle) {
            self.push(handle.key.clone(), due_tick, handle.generation);
        }
    }

    pub fn cancel(&mut self, handle: &TaskHandle) {
        if let Some(generation) = self.generations.get_mut(&handle.key) {
            if *generation == handle.generation {
                *generation += 1;
            }
        }
    }

    pub fn is_live(&self, handle: &TaskHandle) -> bool {
        self.generations.get(&handle.key) == Some(&handle.generation)
    }

    /// Pop the next due tick at or before `now`, skipping ticks whose
    /// generation has been cancelled.
    pub fn pop_due(&mut self, now: u64) -> Option<TaskHandle> {
        loop {
            let next = self.queue.peek()?;
            if next.0 .0.due_tick > now {
                return None;
            }
            let tick = self.queue.pop().expect("peeked entry exists").0 .0;
            if self.generations.get(&tick.key) == Some(&tick.generation) {
                return Some(TaskHandle {
                    key: tick.key,
                    generation: tick.generation,
                });
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    fn push(&mut self, key: ShowcaseKey, due_tick: u64, generation: u64) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.push(Reverse(OrderedTick(ScheduledTick {
            due_tick,
            sequence,
            key,
            generation,
        })));
    }
}
