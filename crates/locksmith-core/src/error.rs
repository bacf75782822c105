//! Vault error types.

use thiserror::Error;

/// Errors from vault operations.
///
/// Application-level refusals (full queue, release by a non-holder) are not
/// errors; they are ordinary [`crate::AcquireOutcome`] /
/// [`crate::ReleaseOutcome`] values. The only failure mode left is the
/// vault having shut down underneath the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The vault's workers have stopped; no further requests are accepted.
    #[error("vault is closed")]
    Closed,
}
