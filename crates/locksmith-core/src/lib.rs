//! Lock-admission engine for the Locksmith broker.
//!
//! The [`Vault`] is the single authority over lock state: which session
//! holds each tag, who is waiting, and whether a new request is granted,
//! queued, or refused.
//!
//! ## Architecture
//!
//! ```text
//! locksmith-core
//!   ├─ Vault            (cloneable handle, routes requests by tag hash)
//!   ├─ worker tasks     (one shard of tag states each, bounded mailbox)
//!   ├─ WaitQueue        (admission discipline, FIFO default)
//!   └─ LockSession      (per-connection identity + grant channel)
//! ```
//!
//! Every operation on a given tag is handled by the same worker in arrival
//! order, which makes exclusivity and FIFO fairness per-tag invariants that
//! need no cross-worker locking. Grant notifications are pushed into the
//! winning session's unbounded grant channel, so a slow or dead consumer
//! can never stall a worker.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod queue;
mod session;
mod vault;

pub use error::VaultError;
pub use queue::{FifoQueue, QueueDiscipline, QueueFull, WaitQueue};
pub use session::{LockSession, SessionId, Tag};
pub use vault::{AcquireOutcome, ReleaseOutcome, Vault, VaultConfig};
