//! Error types for fieldreg-sync.

use thiserror::Error;

use fieldreg_core::StoreError;

/// All errors that can arise from drain-pass orchestration.
///
/// Submission failures are deliberately not in here: a record that could not
/// be submitted is an *outcome* of a pass (counted and reported), not an
/// error that aborts it. Only storage trouble is fatal to a pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The on-device store failed; the no-data-loss guarantee is at risk.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
