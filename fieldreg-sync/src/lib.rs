//! # fieldreg-sync
//!
//! Offline-first reconciliation for the registration queue.
//!
//! [`intake::register_at`] accepts a registration and persists it before any
//! network attempt; [`coordinator::SyncCoordinator`] later drains unsynced
//! records through a [`submit::SubmissionClient`] when the
//! [`connectivity`] monitor reports the device back online.

pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod intake;
pub mod submit;

pub use connectivity::{Connectivity, ConnectivityWatcher, Edge, EdgeDetector, HttpConnectivity};
pub use coordinator::{DrainOutcome, DrainReport, DrainState, RejectedRecord, SyncCoordinator};
pub use error::SyncError;
pub use intake::{register_at, IntakeReceipt};
pub use submit::{HttpSubmissionClient, NetworkError, SubmissionClient, SubmitOutcome};
