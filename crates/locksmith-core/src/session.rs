//! Session identity and grant delivery.

use tokio::sync::mpsc;

/// Identity of one client connection.
pub type SessionId = u64;

/// Name of a lockable resource. Opaque UTF-8, compared byte for byte.
pub type Tag = String;

/// Handle under which a session acquires and waits for locks.
///
/// The handle pairs the session's identity with the sending half of its
/// grant channel. The vault clones it into wait queues; whichever worker
/// eventually grants the lock pushes the tag through the channel, and the
/// receiving half is drained by the session's writer task.
///
/// The channel is unbounded, but a session can occupy at most one queue
/// slot or holdership per tag, so outstanding grants are bounded by the
/// number of tags the session touched.
#[derive(Debug, Clone)]
pub struct LockSession {
    id: SessionId,
    grants: mpsc::UnboundedSender<Tag>,
}

impl LockSession {
    /// Create a session handle and the grant receiver paired with it.
    pub fn new(id: SessionId) -> (Self, mpsc::UnboundedReceiver<Tag>) {
        let (grants, rx) = mpsc::unbounded_channel();
        (Self { id, grants }, rx)
    }

    /// The session's identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Deliver a grant for `tag`. Returns false if the session's receiver
    /// is gone; the caller logs and moves on, teardown cleanup owns the
    /// rest.
    pub(crate) fn notify(&self, tag: &str) -> bool {
        self.grants.send(tag.to_owned()).is_ok()
    }
}
