//! The Vault: authoritative lock state and admission.
//!
//! A fixed pool of worker tasks services all lock traffic. Each worker owns
//! a disjoint shard of tag states behind a bounded mailbox; a tag is routed
//! to its worker by hash, so operations on one tag are processed in arrival
//! order by a single task while unrelated tags proceed in parallel. The
//! bounded mailbox is the backpressure point: submitters wait for a slot
//! instead of growing memory without limit.

use std::{
    collections::{HashMap, hash_map::Entry},
    hash::{DefaultHasher, Hash, Hasher},
};

use tokio::sync::{mpsc, oneshot};

use crate::{
    VaultError,
    queue::{QueueDiscipline, WaitQueue},
    session::{LockSession, SessionId, Tag},
};

/// Vault tuning parameters, supplied by the host process.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Number of worker tasks (and therefore tag shards).
    pub concurrency: usize,
    /// Maximum waiters per tag before acquires are refused.
    pub queue_capacity: usize,
    /// Requests a worker's mailbox buffers before submitters block.
    pub backlog: usize,
    /// Wait-queue discipline applied to every tag.
    pub discipline: QueueDiscipline,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self { concurrency: 10, queue_capacity: 50, backlog: 64, discipline: QueueDiscipline::Fifo }
    }
}

/// Admission decision for an acquire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The requester is now the holder; a grant is already on its channel.
    Granted,
    /// The tag is held; the requester waits in line.
    Enqueued,
    /// The tag's wait queue is at capacity. Recoverable; the connection
    /// stays open.
    Rejected,
}

/// Result of a release request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The lock was released (and the next waiter, if any, promoted).
    Released,
    /// The requester does not hold the tag; nothing changed.
    NotHolder,
}

enum Request {
    Acquire { tag: Tag, session: LockSession, reply: oneshot::Sender<AcquireOutcome> },
    Release { tag: Tag, session: SessionId, reply: oneshot::Sender<ReleaseOutcome> },
    Abandon { session: SessionId },
}

/// Cloneable handle to the lock-admission engine.
///
/// Workers run until every handle is dropped; queued requests are drained
/// before a worker exits.
#[derive(Debug, Clone)]
pub struct Vault {
    workers: Vec<mpsc::Sender<Request>>,
}

impl Vault {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn new(config: VaultConfig) -> Self {
        let concurrency = config.concurrency.max(1);
        let backlog = config.backlog.max(1);

        let workers = (0..concurrency)
            .map(|index| {
                let (tx, rx) = mpsc::channel(backlog);
                let shard = Shard {
                    index,
                    queue_capacity: config.queue_capacity,
                    discipline: config.discipline,
                    tags: HashMap::new(),
                };
                tokio::spawn(shard.run(rx));
                tx
            })
            .collect();

        Self { workers }
    }

    /// Request exclusive ownership of `tag` for `session`.
    ///
    /// On [`AcquireOutcome::Granted`] (and on every later promotion) the tag
    /// is delivered through the session's grant channel; the outcome value
    /// is for the submitting path's own bookkeeping.
    ///
    /// Waits for mailbox space when the tag's worker is saturated.
    pub async fn acquire(
        &self,
        tag: Tag,
        session: LockSession,
    ) -> Result<AcquireOutcome, VaultError> {
        let (reply, rx) = oneshot::channel();
        self.submit(self.route(&tag), Request::Acquire { tag, session, reply }).await?;
        rx.await.map_err(|_| VaultError::Closed)
    }

    /// Release `tag` if `session` holds it, promoting the next waiter.
    pub async fn release(
        &self,
        tag: Tag,
        session: SessionId,
    ) -> Result<ReleaseOutcome, VaultError> {
        let (reply, rx) = oneshot::channel();
        self.submit(self.route(&tag), Request::Release { tag, session, reply }).await?;
        rx.await.map_err(|_| VaultError::Closed)
    }

    /// Drop `session` from every wait queue and release everything it
    /// holds. Invoked on connection teardown; a tag must never stay locked
    /// by a connection that no longer exists.
    pub async fn abandon(&self, session: SessionId) {
        for index in 0..self.workers.len() {
            // Shutdown race: a closed worker has nothing left to abandon.
            let _ = self.submit(index, Request::Abandon { session }).await;
        }
    }

    async fn submit(&self, worker: usize, request: Request) -> Result<(), VaultError> {
        self.workers[worker].send(request).await.map_err(|_| VaultError::Closed)
    }

    fn route(&self, tag: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        tag.hash(&mut hasher);
        (hasher.finish() % self.workers.len() as u64) as usize
    }
}

/// One worker's slice of the lock state. Only its own task touches it.
struct Shard {
    index: usize,
    queue_capacity: usize,
    discipline: QueueDiscipline,
    tags: HashMap<Tag, TagState>,
}

/// State of one contended-or-held tag.
///
/// A `TagState` exists exactly while the tag is held; it is created on the
/// granting acquire and removed when a release or abandonment finds no
/// waiter to promote, so idle tags cost nothing.
struct TagState {
    holder: SessionId,
    queue: Box<dyn WaitQueue>,
}

impl Shard {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::Acquire { tag, session, reply } => {
                    let _ = reply.send(self.acquire(tag, &session));
                },
                Request::Release { tag, session, reply } => {
                    let _ = reply.send(self.release(&tag, session));
                },
                Request::Abandon { session } => self.abandon(session),
            }
        }
        tracing::debug!(worker = self.index, "vault worker stopped");
    }

    fn acquire(&mut self, tag: Tag, session: &LockSession) -> AcquireOutcome {
        match self.tags.entry(tag) {
            Entry::Vacant(entry) => {
                let tag = entry.key().clone();
                entry.insert(TagState {
                    holder: session.id(),
                    queue: self.discipline.build(self.queue_capacity),
                });
                deliver_grant(session, &tag);
                tracing::debug!(%tag, session = session.id(), "lock granted");
                AcquireOutcome::Granted
            },
            Entry::Occupied(mut entry) => {
                if entry.get_mut().queue.enqueue(session.clone()).is_ok() {
                    tracing::debug!(tag = %entry.key(), session = session.id(), "waiter enqueued");
                    AcquireOutcome::Enqueued
                } else {
                    tracing::warn!(tag = %entry.key(), session = session.id(), "wait queue full");
                    AcquireOutcome::Rejected
                }
            },
        }
    }

    fn release(&mut self, tag: &str, session: SessionId) -> ReleaseOutcome {
        let Some(state) = self.tags.get_mut(tag) else {
            return ReleaseOutcome::NotHolder;
        };
        if state.holder != session {
            return ReleaseOutcome::NotHolder;
        }

        if let Some(next) = state.queue.dequeue() {
            state.holder = next.id();
            deliver_grant(&next, tag);
            tracing::debug!(%tag, session = next.id(), "lock handed over");
        } else {
            self.tags.remove(tag);
            tracing::debug!(%tag, session, "lock released");
        }
        ReleaseOutcome::Released
    }

    fn abandon(&mut self, session: SessionId) {
        let mut held: Vec<Tag> = Vec::new();
        for (tag, state) in &mut self.tags {
            state.queue.withdraw(session);
            if state.holder == session {
                held.push(tag.clone());
            }
        }

        if !held.is_empty() {
            tracing::debug!(session, tags = held.len(), "releasing abandoned locks");
        }
        for tag in held {
            self.release(&tag, session);
        }
    }
}

/// Push a grant into the session's channel. A gone receiver is not an
/// error: the session's abandonment is already on its way and owns the
/// cleanup.
fn deliver_grant(session: &LockSession, tag: &str) {
    if !session.notify(tag) {
        tracing::debug!(%tag, session = session.id(), "grant dropped, session gone");
    }
}
