//! Registration intake: durability first, network best-effort.
//!
//! The append happens before any network attempt and is the only step whose
//! failure reaches the caller: the user must hear about a record that was
//! never persisted, and must never be blocked on network availability.

use std::path::Path;

use fieldreg_core::types::{Beneficiary, PendingRegistration};
use fieldreg_core::{queue, StoreError};

use crate::connectivity::Connectivity;
use crate::submit::{SubmissionClient, SubmitOutcome};

/// What intake tells the caller about the record it just created.
#[derive(Debug, Clone)]
pub struct IntakeReceipt {
    pub record: PendingRegistration,
    /// True only when the immediate submit was accepted *and* the flag was
    /// persisted; in every other case the record waits for a drain pass.
    pub synced_immediately: bool,
}

/// Accept a registration: persist it, then try one best-effort submit if the
/// device is online.
///
/// Returns as soon as the append has succeeded; nothing the submission layer
/// does afterwards can fail the registration.
pub fn register_at(
    home: &Path,
    beneficiary: Beneficiary,
    registered_by: Option<String>,
    client: &dyn SubmissionClient,
    net: &dyn Connectivity,
) -> Result<IntakeReceipt, StoreError> {
    let record = PendingRegistration::new(beneficiary, registered_by);

    // Durability before any network attempt.
    queue::append_at(home, record.clone())?;
    tracing::info!("registration {} persisted to queue", record.id);

    let mut synced_immediately = false;
    if net.is_online() {
        match client.submit(&record) {
            Ok(SubmitOutcome::Accepted) => match queue::mark_synced_at(home, &record.id) {
                Ok(()) => {
                    synced_immediately = true;
                    tracing::info!("registration {} accepted immediately", record.id);
                }
                Err(err) => {
                    // The record is durable and the remote treats a repeat of
                    // this id as a no-op, so the next pass reconciles it.
                    tracing::warn!(
                        "accepted registration {} could not be flagged synced: {}",
                        record.id,
                        err
                    );
                }
            },
            Ok(SubmitOutcome::Rejected { reason }) => {
                tracing::warn!(
                    "immediate submit of {} rejected ({}); left queued for operator review",
                    record.id,
                    reason
                );
            }
            Err(network) => {
                tracing::info!(
                    "immediate submit of {} failed ({}); queued for next drain pass",
                    record.id,
                    network.message
                );
            }
        }
    }

    Ok(IntakeReceipt {
        record,
        synced_immediately,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
