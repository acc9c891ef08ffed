//! Bounded pending queue and the readiness scan over it.
//!
//! Both the scan and the readiness check are plain functions over borrowed
//! state, so they can be exercised without a store or a lock.

use std::collections::{HashMap, VecDeque};

use crate::core::{Task, TaskId};
use crate::error::{Error, Result};

/// What a scan does with a dequeued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDecision {
    /// Hand the task out and stop scanning.
    Dispatch,
    /// Not ready yet; put it at the back of the queue.
    Requeue,
    /// Discard it; it will never need dispatching.
    Drop,
}

/// FIFO of task ids awaiting dispatch, bounded by a fixed capacity.
#[derive(Debug)]
pub struct PendingQueue {
    items: VecDeque<TaskId>,
    capacity: usize,
}

impl PendingQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots left.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.items.len())
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.items.contains(id)
    }

    /// Append a task id.
    ///
    /// # Errors
    /// Returns [`Error::QueueFull`] when the queue is at capacity.
    pub fn push(&mut self, id: TaskId) -> Result<()> {
        if self.items.len() >= self.capacity {
            return Err(Error::QueueFull {
                capacity: self.capacity,
            });
        }
        self.items.push_back(id);
        Ok(())
    }

    /// Snapshot of queued ids in dispatch order.
    pub fn ids(&self) -> Vec<TaskId> {
        self.items.iter().copied().collect()
    }

    /// Run [`scan_pending`] over this queue.
    pub fn scan<F>(&mut self, decide: F) -> Option<TaskId>
    where
        F: FnMut(&TaskId) -> ScanDecision,
    {
        scan_pending(&mut self.items, decide)
    }
}

/// Find the first dispatchable task in `queue`.
///
/// Visits at most as many entries as the queue held when the scan began,
/// so a queue of never-ready tasks cannot loop forever. Requeued entries
/// keep their relative order at the back.
pub fn scan_pending<F>(queue: &mut VecDeque<TaskId>, mut decide: F) -> Option<TaskId>
where
    F: FnMut(&TaskId) -> ScanDecision,
{
    let budget = queue.len();
    for _ in 0..budget {
        let id = queue.pop_front()?;
        match decide(&id) {
            ScanDecision::Dispatch => return Some(id),
            ScanDecision::Requeue => queue.push_back(id),
            ScanDecision::Drop => {}
        }
    }
    None
}

/// A task is ready when every operand is a literal or names an existing,
/// completed task.
pub fn is_ready(task: &Task, tasks: &HashMap<TaskId, Task>) -> bool {
    task.dependencies()
        .all(|dep| tasks.get(&dep).map(|t| t.completed).unwrap_or(false))
}
