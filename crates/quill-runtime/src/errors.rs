//! Runtime error taxonomy.

use thiserror::Error;

use quill_client::ClientError;
use quill_core::ids::SessionId;

/// Result alias for runtime operations.
pub type RuntimeResult<T> = Result<T, ChatError>;

/// Errors crossing the runtime boundary.
///
/// Validation failures never surface as chat errors — operations with unmet
/// preconditions are no-ops reported through their outcome types — so this
/// enum covers the failures a caller may actually need to present.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A client-side precondition was not met.
    #[error("precondition not met: {reason}")]
    Validation {
        /// What was missing.
        reason: &'static str,
    },

    /// The transport failed (connection, status, or payload).
    #[error(transparent)]
    Transport(#[from] ClientError),

    /// One file in an upload batch failed; the batch aborted there.
    ///
    /// Earlier files are not rolled back — the remote store owns cleanup.
    #[error("upload batch aborted at file {index} ({file}): {source}")]
    PartialFailure {
        /// Zero-based index of the failed file.
        index: usize,
        /// Name of the failed file.
        file: String,
        /// The underlying transport failure.
        #[source]
        source: ClientError,
    },

    /// The targeted session is not in the store.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),
}
