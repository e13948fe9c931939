//! Sync coordinator: the drain-pass state machine.
//!
//! ## Drain pass
//!
//! 1. Snapshot `pending` once (records created *during* the pass belong to
//!    the next pass, so each pass's accounting stays well-defined).
//! 2. Submit sequentially, one record per call.
//! 3. `Accepted` → flip the flag immediately, not batched, so an interrupted
//!    pass never resubmits already-confirmed records.
//! 4. `NetworkError` → leave unsynced, continue (one flaky record must not
//!    block the batch).
//! 5. `Rejected` → leave unsynced, record for operator follow-up, continue.
//!
//! At most one pass is in flight: a trigger while `Draining` is a no-op.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

use fieldreg_core::queue;
use fieldreg_core::types::RecordId;

use crate::error::SyncError;
use crate::submit::{SubmissionClient, SubmitOutcome};

/// Coordinator states. `Succeeded`/`Failed` are transient display states;
/// the next trigger (or [`SyncCoordinator::reset`]) returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Draining,
    Succeeded,
    Failed,
}

/// A record the server explicitly declined. Not retried automatically;
/// blind retry would repeat the same rejection forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub id: RecordId,
    pub reason: String,
}

/// Accounting for one completed drain pass. Serializable so the daemon can
/// hand it to status consumers as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Size of the pass snapshot.
    pub attempted: usize,
    /// Records confirmed accepted and flagged synced during this pass.
    pub accepted: usize,
    /// Transient failures left queued for the next pass.
    pub network_errors: usize,
    /// Explicit server rejections, surfaced to the operator.
    pub rejected: Vec<RejectedRecord>,
}

impl DrainReport {
    /// Every snapshotted record ended confirmed-accepted.
    pub fn succeeded(&self) -> bool {
        self.network_errors == 0 && self.rejected.is_empty()
    }
}

/// Result of a drain trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// A pass was already in flight; no second pass was started.
    AlreadyDraining,
}

/// Orchestrates drain passes over the on-device queue.
pub struct SyncCoordinator<C: SubmissionClient> {
    home: PathBuf,
    client: C,
    state: Mutex<DrainState>,
}

impl<C: SubmissionClient> SyncCoordinator<C> {
    pub fn new(home: impl Into<PathBuf>, client: C) -> Self {
        Self {
            home: home.into(),
            client,
            state: Mutex::new(DrainState::Idle),
        }
    }

    /// Current state of the machine.
    pub fn state(&self) -> DrainState {
        *self.lock_state()
    }

    /// Return a finished pass to `Idle` once its status has been displayed.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        if matches!(*state, DrainState::Succeeded | DrainState::Failed) {
            *state = DrainState::Idle;
        }
    }

    /// Run one drain pass, unless one is already in flight.
    ///
    /// Per-record submission failures are reported in the [`DrainReport`];
    /// only storage trouble aborts the pass with an error (the machine ends
    /// in `Failed` either way).
    pub fn drain(&self) -> Result<DrainOutcome, SyncError> {
        {
            let mut state = self.lock_state();
            if *state == DrainState::Draining {
                tracing::debug!("drain trigger ignored: pass already in flight");
                return Ok(DrainOutcome::AlreadyDraining);
            }
            *state = DrainState::Draining;
        }

        let result = self.run_pass();

        let mut state = self.lock_state();
        *state = match &result {
            Ok(report) if report.succeeded() => DrainState::Succeeded,
            _ => DrainState::Failed,
        };

        result.map(DrainOutcome::Completed)
    }

    fn run_pass(&self) -> Result<DrainReport, SyncError> {
        // Stable work list: one snapshot, taken up front.
        let snapshot = queue::pending_at(&self.home)?;
        tracing::info!("drain pass started: {} pending record(s)", snapshot.len());

        let mut report = DrainReport {
            attempted: snapshot.len(),
            accepted: 0,
            network_errors: 0,
            rejected: Vec::new(),
        };

        for record in &snapshot {
            match self.client.submit(record) {
                Ok(SubmitOutcome::Accepted) => {
                    queue::mark_synced_at(&self.home, &record.id)?;
                    report.accepted += 1;
                    tracing::info!("record {} confirmed by remote", record.id);
                }
                Ok(SubmitOutcome::Rejected { reason }) => {
                    tracing::warn!("record {} rejected by remote: {}", record.id, reason);
                    report.rejected.push(RejectedRecord {
                        id: record.id.clone(),
                        reason,
                    });
                }
                Err(network) => {
                    tracing::warn!(
                        "record {} left queued after network error: {}",
                        record.id,
                        network.message
                    );
                    report.network_errors += 1;
                }
            }
        }

        tracing::info!(
            "drain pass finished: {} accepted, {} network error(s), {} rejected",
            report.accepted,
            report.network_errors,
            report.rejected.len()
        );
        Ok(report)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DrainState> {
        // A poisoned lock only means another pass panicked; the state value
        // itself is still a plain enum we can keep using.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
