//! # Queue Manager
//!
//! Owned containers for every place a process can live outside the CPU:
//!
//! | Container | Discipline | Scanned |
//! |-----------|------------|---------|
//! | `ReadyRtHigh` | FIFO | dispatch |
//! | `ReadyRtLow` | FIFO | dispatch |
//! | `ReadyBestEffort` | FIFO | dispatch |
//! | `Blocked` | pool (insertion order kept) | every tick |
//! | `New` | pool (insertion order kept) | every tick |
//! | `Finished` | append-only | never |
//!
//! Processes are stored by value. Moving one between containers is a
//! remove followed by an insert, so a process is never referenced from two
//! containers at once. Removal by identity is a pid lookup.

use std::collections::VecDeque;

use log::trace;
use thiserror::Error;

use crate::process::{Pid, Process};

/// Names one of the six containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueId {
    ReadyRtHigh,
    ReadyRtLow,
    ReadyBestEffort,
    Blocked,
    New,
    Finished,
}

impl QueueId {
    /// The three ready queues in dispatch order.
    pub const READY: [QueueId; 3] = [
        QueueId::ReadyRtHigh,
        QueueId::ReadyRtLow,
        QueueId::ReadyBestEffort,
    ];

    pub const ALL: [QueueId; 6] = [
        QueueId::ReadyRtHigh,
        QueueId::ReadyRtLow,
        QueueId::ReadyBestEffort,
        QueueId::Blocked,
        QueueId::New,
        QueueId::Finished,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            QueueId::ReadyRtHigh => "ready RT-high",
            QueueId::ReadyRtLow => "ready RT-low",
            QueueId::ReadyBestEffort => "ready BE",
            QueueId::Blocked => "blocked",
            QueueId::New => "new",
            QueueId::Finished => "finished",
        }
    }
}

/// Precondition violations. A correct scheduler checks emptiness before
/// dequeueing and only removes pids it has just seen, so these never reach
/// a caller of [`crate::scheduler::Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("dequeue from empty {} queue", .0.label())]
    Empty(QueueId),

    #[error("{pid} not found in {} queue", .queue.label())]
    NotFound { queue: QueueId, pid: Pid },
}

// ---------------------------------------------------------------------------
// Queue set
// ---------------------------------------------------------------------------

/// The six containers, owned together.
#[derive(Debug, Default)]
pub struct QueueSet {
    rt_high: VecDeque<Process>,
    rt_low: VecDeque<Process>,
    best_effort: VecDeque<Process>,
    blocked: VecDeque<Process>,
    new: VecDeque<Process>,
    finished: VecDeque<Process>,
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, queue: QueueId) -> &VecDeque<Process> {
        match queue {
            QueueId::ReadyRtHigh => &self.rt_high,
            QueueId::ReadyRtLow => &self.rt_low,
            QueueId::ReadyBestEffort => &self.best_effort,
            QueueId::Blocked => &self.blocked,
            QueueId::New => &self.new,
            QueueId::Finished => &self.finished,
        }
    }

    fn slot_mut(&mut self, queue: QueueId) -> &mut VecDeque<Process> {
        match queue {
            QueueId::ReadyRtHigh => &mut self.rt_high,
            QueueId::ReadyRtLow => &mut self.rt_low,
            QueueId::ReadyBestEffort => &mut self.best_effort,
            QueueId::Blocked => &mut self.blocked,
            QueueId::New => &mut self.new,
            QueueId::Finished => &mut self.finished,
        }
    }

    /// Append `process` to the tail of `queue`.
    pub fn enqueue(&mut self, queue: QueueId, process: Process) {
        trace!("{} -> {} queue", process.pid, queue.label());
        self.slot_mut(queue).push_back(process);
    }

    /// Remove and return the head of `queue`.
    pub fn dequeue(&mut self, queue: QueueId) -> Result<Process, QueueError> {
        let process = self
            .slot_mut(queue)
            .pop_front()
            .ok_or(QueueError::Empty(queue))?;
        trace!("{} <- {} queue", process.pid, queue.label());
        Ok(process)
    }

    /// Extract the process with `pid` from `queue`, keeping the order of
    /// the others.
    pub fn remove_by_pid(&mut self, queue: QueueId, pid: Pid) -> Result<Process, QueueError> {
        let slot = self.slot_mut(queue);
        let index = slot
            .iter()
            .position(|p| p.pid == pid)
            .ok_or(QueueError::NotFound { queue, pid })?;
        slot.remove(index).ok_or(QueueError::NotFound { queue, pid })
    }

    /// Pids in `queue` for which `pred` holds, in queue order. Used by the
    /// scheduler to pick processes out of a pool before moving them.
    pub fn pids_where<F>(&self, queue: QueueId, mut pred: F) -> Vec<Pid>
    where
        F: FnMut(&Process) -> bool,
    {
        self.slot(queue)
            .iter()
            .filter(|p| pred(p))
            .map(|p| p.pid)
            .collect()
    }

    pub fn len(&self, queue: QueueId) -> usize {
        self.slot(queue).len()
    }

    pub fn is_empty(&self, queue: QueueId) -> bool {
        self.slot(queue).is_empty()
    }

    pub fn iter(&self, queue: QueueId) -> impl Iterator<Item = &Process> + '_ {
        self.slot(queue).iter()
    }

    pub fn iter_mut(&mut self, queue: QueueId) -> impl Iterator<Item = &mut Process> + '_ {
        self.slot_mut(queue).iter_mut()
    }

    pub fn contains(&self, queue: QueueId, pid: Pid) -> bool {
        self.slot(queue).iter().any(|p| p.pid == pid)
    }

    /// The container currently holding `pid`, if any.
    pub fn locate(&self, pid: Pid) -> Option<QueueId> {
        QueueId::ALL.into_iter().find(|&q| self.contains(q, pid))
    }

    /// True if either real-time ready queue holds a process.
    pub fn real_time_ready(&self) -> bool {
        !self.rt_high.is_empty() || !self.rt_low.is_empty()
    }

    /// True if every container except `Finished` is empty.
    pub fn all_idle(&self) -> bool {
        self.new.is_empty()
            && self.blocked.is_empty()
            && QueueId::READY.into_iter().all(|q| self.is_empty(q))
    }

    /// Total number of processes held across all containers.
    pub fn total(&self) -> usize {
        QueueId::ALL.into_iter().map(|q| self.len(q)).sum()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
