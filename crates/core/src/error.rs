//! Error taxonomy shared across the workspace
//!
//! Variants map one-to-one onto the failure classes the orchestrator
//! distinguishes: validation aborts before any engine call, engine failures
//! surface, storage write failures propagate (reads degrade at the store),
//! and unresolvable references echo the offending input.

use thiserror::Error;

/// Result type for snapvault operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Source or target validation failed before any engine call
    #[error("validation failed: {0}")]
    Validation(String),

    /// The external backup engine invocation failed or produced
    /// malformed output
    #[error("backup engine error: {0}")]
    Engine(String),

    /// Metadata persistence failed. On save paths this means the snapshot
    /// exists in the engine but is not tracked (orphaned, recoverable by
    /// a re-scan).
    #[error("metadata storage error: {0}")]
    Storage(String),

    /// A symbolic reference could not be resolved
    #[error("cannot resolve reference {reference:?}: {reason}")]
    Reference { reference: String, reason: String },

    /// An operation was requested in a state that does not permit it
    /// (e.g. forcing a snapshot with no pending changes)
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    pub fn reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Reference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
