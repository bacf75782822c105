//! Wait-queue disciplines for contended tags.
//!
//! Admission sits behind the [`WaitQueue`] trait so another discipline
//! (priority, lease-with-timeout) could slot in without touching the
//! exclusivity logic in the vault. FIFO is the only discipline today.

use std::collections::VecDeque;

use crate::session::{LockSession, SessionId};

/// Selects the wait-queue discipline used for every tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueueDiscipline {
    /// First come, first served.
    #[default]
    Fifo,
}

impl QueueDiscipline {
    /// Build an empty queue bounded at `capacity` waiters.
    pub(crate) fn build(self, capacity: usize) -> Box<dyn WaitQueue> {
        match self {
            Self::Fifo => Box::new(FifoQueue::new(capacity)),
        }
    }
}

impl std::str::FromStr for QueueDiscipline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Self::Fifo),
            other => Err(format!("unknown queue discipline: {other:?} (expected \"fifo\")")),
        }
    }
}

/// Refusal marker: the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull;

/// A bounded queue of sessions waiting for one tag.
///
/// Implementations decide admission and promotion order; the vault decides
/// when promotion happens. `dequeue` order is the grant order.
pub trait WaitQueue: Send {
    /// Admit a waiter, or refuse because the queue is at capacity.
    fn enqueue(&mut self, waiter: LockSession) -> Result<(), QueueFull>;

    /// Remove and return the next waiter to promote.
    fn dequeue(&mut self) -> Option<LockSession>;

    /// Drop every entry belonging to `session`.
    fn withdraw(&mut self, session: SessionId);

    /// Number of queued waiters.
    fn len(&self) -> usize;

    /// True when no waiters are queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default first-come-first-served discipline.
#[derive(Debug)]
pub struct FifoQueue {
    capacity: usize,
    waiters: VecDeque<LockSession>,
}

impl FifoQueue {
    /// Create an empty queue admitting at most `capacity` waiters.
    pub fn new(capacity: usize) -> Self {
        Self { capacity, waiters: VecDeque::new() }
    }
}

impl WaitQueue for FifoQueue {
    fn enqueue(&mut self, waiter: LockSession) -> Result<(), QueueFull> {
        if self.waiters.len() >= self.capacity {
            return Err(QueueFull);
        }
        self.waiters.push_back(waiter);
        Ok(())
    }

    fn dequeue(&mut self) -> Option<LockSession> {
        self.waiters.pop_front()
    }

    fn withdraw(&mut self, session: SessionId) {
        self.waiters.retain(|w| w.id() != session);
    }

    fn len(&self) -> usize {
        self.waiters.len()
    }
}
