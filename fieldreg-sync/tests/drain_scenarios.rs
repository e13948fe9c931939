//! End-to-end drain-pass scenarios over a real on-disk queue and a scripted
//! remote authority.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc;
use std::sync::Mutex;

use tempfile::TempDir;

use fieldreg_core::{
    queue,
    types::{Beneficiary, PendingRegistration, RecordId},
};
use fieldreg_sync::{
    connectivity::{Connectivity, EdgeDetector},
    coordinator::{DrainOutcome, DrainReport, DrainState, SyncCoordinator},
    intake,
    submit::{NetworkError, SubmissionClient, SubmitOutcome},
    Edge,
};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Scripted remote authority: per-id outcomes, a call log, and an "accepted"
/// set so idempotent resubmission can be asserted against the contract.
#[derive(Default)]
struct MockAuthority {
    /// Ids that should fail with a transient error on submit.
    flaky: HashSet<String>,
    /// Ids that should be explicitly declined, with a reason.
    declined: HashMap<String, String>,
    calls: Mutex<Vec<RecordId>>,
    accepted: Mutex<HashSet<String>>,
}

impl MockAuthority {
    fn calls(&self) -> Vec<RecordId> {
        self.calls.lock().unwrap().clone()
    }

    fn accepted_count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }
}

impl SubmissionClient for MockAuthority {
    fn submit(&self, record: &PendingRegistration) -> Result<SubmitOutcome, NetworkError> {
        self.calls.lock().unwrap().push(record.id.clone());

        if self.flaky.contains("*") || self.flaky.contains(&record.id.0) {
            return Err(NetworkError {
                message: "simulated transport failure".to_string(),
            });
        }
        if let Some(reason) = self.declined.get(&record.id.0) {
            return Ok(SubmitOutcome::Rejected {
                reason: reason.clone(),
            });
        }
        // Repeated idempotency key: success-no-op, no duplicate beneficiary.
        self.accepted.lock().unwrap().insert(record.id.0.clone());
        Ok(SubmitOutcome::Accepted)
    }
}

struct FixedNet(bool);

impl Connectivity for FixedNet {
    fn is_online(&self) -> bool {
        self.0
    }
}

fn beneficiary(name: &str) -> Beneficiary {
    Beneficiary {
        name: name.to_string(),
        phone: "9800000000".to_string(),
        village: "Rampur".to_string(),
        role: "farmer".to_string(),
    }
}

fn completed(outcome: DrainOutcome) -> DrainReport {
    match outcome {
        DrainOutcome::Completed(report) => report,
        DrainOutcome::AlreadyDraining => panic!("expected a completed pass"),
    }
}

// ---------------------------------------------------------------------------
// Scenario A: register while offline
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_offline_registration_queues_without_network_calls() {
    let home = TempDir::new().unwrap();
    let authority = MockAuthority::default();

    intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &authority,
        &FixedNet(false),
    )
    .unwrap();

    let records = queue::list_at(home.path()).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].synced);
    assert!(authority.calls().is_empty(), "offline must make zero calls");
}

// ---------------------------------------------------------------------------
// Scenario B: connectivity returns, queue drains
// ---------------------------------------------------------------------------

#[test]
fn scenario_b_came_online_edge_drains_the_pending_record() {
    let home = TempDir::new().unwrap();
    let authority = MockAuthority::default();

    let receipt = intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &authority,
        &FixedNet(false),
    )
    .unwrap();

    // Edge-triggered wiring: the offline→online transition is what fires
    // the drain, not the polling itself.
    let mut detector = EdgeDetector::new();
    detector.observe(false);
    let edge = detector.observe(true);
    assert_eq!(edge, Some(Edge::CameOnline));

    let coordinator = SyncCoordinator::new(home.path(), authority);
    assert_eq!(coordinator.state(), DrainState::Idle);
    let report = completed(coordinator.drain().unwrap());

    assert_eq!(coordinator.state(), DrainState::Succeeded);
    assert_eq!(report.attempted, 1);
    assert_eq!(report.accepted, 1);

    let records = queue::list_at(home.path()).unwrap();
    assert!(records[0].synced);
    assert_eq!(records[0].id, receipt.record.id);
}

// ---------------------------------------------------------------------------
// Scenario C: partial failure does not abort the pass
// ---------------------------------------------------------------------------

#[test]
fn scenario_c_flaky_first_record_does_not_block_the_second() {
    let home = TempDir::new().unwrap();
    let first = intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &MockAuthority::default(),
        &FixedNet(false),
    )
    .unwrap();
    let second = intake::register_at(
        home.path(),
        beneficiary("Ravi Kumar"),
        None,
        &MockAuthority::default(),
        &FixedNet(false),
    )
    .unwrap();

    let authority = MockAuthority {
        flaky: HashSet::from([first.record.id.0.clone()]),
        ..Default::default()
    };
    let coordinator = SyncCoordinator::new(home.path(), authority);
    let report = completed(coordinator.drain().unwrap());

    assert_eq!(coordinator.state(), DrainState::Failed);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.accepted, 1);
    assert_eq!(report.network_errors, 1);

    let by_id: HashMap<_, _> = queue::list_at(home.path())
        .unwrap()
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();
    assert!(!by_id[&first.record.id].synced, "flaky record stays queued");
    assert!(by_id[&second.record.id].synced);
}

#[test]
fn rejected_records_are_reported_and_left_unsynced() {
    let home = TempDir::new().unwrap();
    let receipt = intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &MockAuthority::default(),
        &FixedNet(false),
    )
    .unwrap();

    let authority = MockAuthority {
        declined: HashMap::from([(
            receipt.record.id.0.clone(),
            "phone already registered".to_string(),
        )]),
        ..Default::default()
    };
    let coordinator = SyncCoordinator::new(home.path(), authority);
    let report = completed(coordinator.drain().unwrap());

    assert_eq!(coordinator.state(), DrainState::Failed);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].id, receipt.record.id);
    assert!(report.rejected[0].reason.contains("phone already registered"));
    assert!(!queue::list_at(home.path()).unwrap()[0].synced);
}

// ---------------------------------------------------------------------------
// Scenario D: idempotent resubmission
// ---------------------------------------------------------------------------

#[test]
fn scenario_d_resubmitting_the_same_key_creates_no_duplicate() {
    let home = TempDir::new().unwrap();
    let receipt = intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &MockAuthority::default(),
        &FixedNet(false),
    )
    .unwrap();

    let authority = MockAuthority::default();
    // Simulates an accept response lost after the server processed it: the
    // same record is submitted twice with the same idempotency key.
    let first = authority.submit(&receipt.record).unwrap();
    let second = authority.submit(&receipt.record).unwrap();

    assert_eq!(first, SubmitOutcome::Accepted);
    assert_eq!(second, SubmitOutcome::Accepted, "repeat is a no-op success");
    assert_eq!(authority.accepted_count(), 1, "exactly one beneficiary");
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn no_record_is_ever_lost_under_network_failures() {
    let home = TempDir::new().unwrap();
    let mut created = HashSet::new();

    for (i, name) in ["Asha", "Ravi", "Meena", "Sita", "Arun"].iter().enumerate() {
        // Every other registration suffers an immediate-submit failure.
        let authority = MockAuthority {
            flaky: if i % 2 == 0 {
                HashSet::new()
            } else {
                HashSet::from(["*".to_string()])
            },
            ..Default::default()
        };
        let receipt = intake::register_at(
            home.path(),
            beneficiary(name),
            None,
            &authority,
            &FixedNet(i % 3 != 0),
        )
        .unwrap();
        created.insert(receipt.record.id.0.clone());
    }

    // A drain pass where everything fails transiently.
    let all_flaky = MockAuthority {
        flaky: created.clone(),
        ..Default::default()
    };
    let coordinator = SyncCoordinator::new(home.path(), all_flaky);
    coordinator.drain().unwrap();

    let stored: HashSet<String> = queue::list_at(home.path())
        .unwrap()
        .into_iter()
        .map(|r| r.id.0)
        .collect();
    assert!(
        stored.is_superset(&created),
        "every id ever passed to intake must still be in the store"
    );
}

#[test]
fn synced_records_are_never_submitted_again() {
    let home = TempDir::new().unwrap();
    let receipt = intake::register_at(
        home.path(),
        beneficiary("Asha Devi"),
        None,
        &MockAuthority::default(),
        &FixedNet(false),
    )
    .unwrap();
    queue::mark_synced_at(home.path(), &receipt.record.id).unwrap();

    let coordinator = SyncCoordinator::new(home.path(), MockAuthority::default());
    let report = completed(coordinator.drain().unwrap());

    assert_eq!(report.attempted, 0);
    assert!(coordinator.state() == DrainState::Succeeded);
}

/// A client that parks the drain thread mid-pass so a second trigger can be
/// fired while the first pass is provably in flight.
struct BlockingAuthority {
    started_tx: Mutex<mpsc::Sender<()>>,
    release_rx: Mutex<mpsc::Receiver<()>>,
    calls: Mutex<Vec<RecordId>>,
}

impl SubmissionClient for BlockingAuthority {
    fn submit(&self, record: &PendingRegistration) -> Result<SubmitOutcome, NetworkError> {
        self.calls.lock().unwrap().push(record.id.clone());
        let _ = self.started_tx.lock().unwrap().send(());
        self.release_rx.lock().unwrap().recv().expect("release signal");
        Ok(SubmitOutcome::Accepted)
    }
}

#[test]
fn trigger_during_a_pass_starts_no_second_pass() {
    let home = TempDir::new().unwrap();
    for name in ["Asha Devi", "Ravi Kumar"] {
        queue::append_at(
            home.path(),
            PendingRegistration::new(beneficiary(name), None),
        )
        .unwrap();
    }

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let authority = BlockingAuthority {
        started_tx: Mutex::new(started_tx),
        release_rx: Mutex::new(release_rx),
        calls: Mutex::new(Vec::new()),
    };
    let coordinator = SyncCoordinator::new(home.path(), &authority);

    std::thread::scope(|scope| {
        let handle = scope.spawn(|| coordinator.drain().unwrap());

        started_rx.recv().expect("first submit started");
        assert_eq!(coordinator.state(), DrainState::Draining);
        let second = coordinator.drain().unwrap();
        assert_eq!(second, DrainOutcome::AlreadyDraining);

        // Release both pending submits of the first (and only) pass.
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        let first = completed(handle.join().expect("drain thread"));
        assert_eq!(first.accepted, 2);
    });

    // Each pending id was submitted at most once across both triggers.
    let calls = authority.calls.lock().unwrap();
    let mut seen = HashSet::new();
    for id in calls.iter() {
        assert!(seen.insert(id.0.clone()), "id {id} submitted twice");
    }
    assert_eq!(seen.len(), 2);
}
