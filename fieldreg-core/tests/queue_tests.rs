//! Queue error-surface and atomic-write-safety integration tests.
//! Storage layout: ~/.fieldreg/queue/registrations.json

use std::fs;

use fieldreg_core::{
    queue,
    types::{Beneficiary, PendingRegistration, RecordId},
    StoreError,
};

fn record(name: &str) -> PendingRegistration {
    PendingRegistration::new(
        Beneficiary {
            name: name.to_string(),
            phone: "9800000000".to_string(),
            village: "Rampur".to_string(),
            role: "farmer".to_string(),
        },
        Some("meera".to_string()),
    )
}

// ---------------------------------------------------------------------------
// 1. Load error surface
// ---------------------------------------------------------------------------

#[test]
fn load_corrupt_json_returns_json_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".fieldreg").join("queue");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("registrations.json"), b"{not json at all").expect("write");

    let err = queue::load_at(home.path()).unwrap_err();
    assert!(matches!(err, StoreError::Json(_)), "got: {err}");
    assert!(err.to_string().contains("store JSON error"));
}

#[test]
fn load_wrong_shape_json_returns_json_error() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let dir = home.path().join(".fieldreg").join("queue");
    fs::create_dir_all(&dir).expect("mkdir");
    fs::write(dir.join("registrations.json"), b"[1, 2, 3]").expect("write");

    let err = queue::load_at(home.path()).unwrap_err();
    assert!(matches!(err, StoreError::Json(_)), "got: {err}");
}

#[test]
fn record_not_found_error_names_the_id() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    queue::append_at(home.path(), record("Asha Devi")).expect("append");
    let err = queue::mark_synced_at(home.path(), &RecordId::from("absent-id")).unwrap_err();
    assert!(err.to_string().contains("absent-id"), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Atomic write safety
// ---------------------------------------------------------------------------

#[test]
fn save_cleans_up_tmp_file() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    queue::append_at(home.path(), record("Asha Devi")).expect("append");

    let tmp = queue::queue_path_at(home.path()).with_extension("json.tmp");
    assert!(!tmp.exists(), ".tmp must be removed after successful save");
}

#[test]
fn queue_survives_reload() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let first = record("Asha Devi");
    let second = record("Ravi Kumar");
    let first_id = first.id.clone();
    queue::append_at(home.path(), first).expect("append first");
    queue::append_at(home.path(), second).expect("append second");
    queue::mark_synced_at(home.path(), &first_id).expect("mark");

    // Fresh load from disk; simulates a process restart.
    let records = queue::list_at(home.path()).expect("list");
    assert_eq!(records.len(), 2);
    assert!(records[0].synced);
    assert!(!records[1].synced);
    assert_eq!(queue::pending_count_at(home.path()).expect("count"), 1);
}

#[cfg(unix)]
#[test]
fn append_to_unwritable_home_surfaces_io_error() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    let root = home.path().join(".fieldreg");
    fs::create_dir_all(&root).expect("mkdir");
    let mut perms = fs::metadata(&root).expect("meta").permissions();
    perms.set_mode(0o555);
    fs::set_permissions(&root, perms).expect("chmod");

    let err = queue::append_at(home.path(), record("Asha Devi")).unwrap_err();
    assert!(matches!(err, StoreError::Io { .. }), "got: {err}");

    let mut perms = fs::metadata(&root).expect("meta").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&root, perms).expect("chmod back");
}

#[cfg(unix)]
#[test]
fn queue_file_has_owner_only_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    queue::append_at(home.path(), record("Asha Devi")).expect("append");

    let mode = fs::metadata(queue::queue_path_at(home.path()))
        .expect("meta")
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600, "beneficiary data must be 0600");
}
