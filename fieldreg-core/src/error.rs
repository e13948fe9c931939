//! Error types for fieldreg-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::RecordId;

/// All errors that can arise from on-device storage operations.
///
/// Storage errors threaten the no-data-loss guarantee, so callers must
/// surface them instead of swallowing them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (queue, config, session).
    #[error("store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.fieldreg/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// A targeted update named a record the queue does not contain.
    #[error("no queued registration with id {id}")]
    RecordNotFound { id: RecordId },
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
