//! Error types for packa-player
//!
//! User-actionable outcomes (nothing playing, index out of range, no match)
//! are typed return values, not errors. This enum covers what is left:
//! lookups the caller must handle and the loop-mode invariant.

use packa_common::GroupId;
use thiserror::Error;

/// Main error type for packa-player
#[derive(Error, Debug)]
pub enum Error {
    /// A session is already registered for the group
    #[error("Session already exists for group {0}")]
    SessionExists(GroupId),

    /// No session is registered for the group
    #[error("No session for group {0}")]
    SessionNotFound(GroupId),

    /// Operation on a session that was already torn down
    #[error("Session for group {0} has been destroyed")]
    SessionDestroyed(GroupId),

    /// Looping is enabled but no loop mode is set
    #[error("Loop error: looping enabled with unknown loop mode {0:?}")]
    LoopModeUnset(Option<crate::playback::LoopMode>),
}

/// Convenience Result type using packa-player Error
pub type Result<T> = std::result::Result<T, Error>;
