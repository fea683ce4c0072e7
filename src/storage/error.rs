//! Storage operation error types

use thiserror::Error;

use crate::ftp::FtpError;
use crate::query::QueryError;

/// Errors surfaced by storage-object operations.
///
/// The split matters for retry behavior: only `Remote` failures can be
/// transient; `Local` and `InvalidQuery` never are.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("remote operation failed: {0}")]
    Remote(#[from] FtpError),

    /// Failure on the local staging filesystem, not a network condition.
    #[error("local filesystem error: {0}")]
    Local(#[from] std::io::Error),

    /// The retry budget ran out; `source` is the last transient failure.
    #[error("{op} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        op: String,
        attempts: usize,
        #[source]
        source: Box<StorageError>,
    },
}
