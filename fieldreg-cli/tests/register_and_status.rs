//! End-to-end CLI flows over a temporary `$HOME`, with no network listener;
//! every registration exercises the offline path.

use assert_cmd::Command;
use predicates::prelude::predicate;
use tempfile::TempDir;

/// Nothing listens here; connection refused makes the probe read offline.
const DEAD_ENDPOINT: &str = "http://127.0.0.1:1/api/registrations";

fn fieldreg(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fieldreg").expect("binary");
    cmd.env("HOME", home.path());
    cmd
}

#[test]
fn register_while_offline_queues_the_record() {
    let home = TempDir::new().expect("home");

    fieldreg(&home)
        .args([
            "register",
            "--name",
            "Asha Devi",
            "--phone",
            "9800000001",
            "--village",
            "Rampur",
            "--role",
            "artisan",
            "--endpoint",
            DEAD_ENDPOINT,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("saved on device"))
        .stdout(predicate::str::contains("1 registration(s) pending sync"));

    let queue_file = home
        .path()
        .join(".fieldreg")
        .join("queue")
        .join("registrations.json");
    assert!(queue_file.exists(), "queue must be durable on disk");
}

#[test]
fn status_json_counts_pending_freshly() {
    let home = TempDir::new().expect("home");

    for name in ["Asha Devi", "Ravi Kumar"] {
        fieldreg(&home)
            .args([
                "register",
                "--name",
                name,
                "--phone",
                "9800000000",
                "--village",
                "Rampur",
                "--role",
                "farmer",
                "--endpoint",
                DEAD_ENDPOINT,
            ])
            .assert()
            .success();
    }

    let output = fieldreg(&home)
        .args(["status", "--json"])
        .output()
        .expect("status output");
    assert!(output.status.success());

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(payload["pending"], serde_json::json!(2));
    assert_eq!(payload["synced"], serde_json::json!(0));
    assert_eq!(payload["records"].as_array().expect("records").len(), 2);
}

#[test]
fn status_on_a_fresh_device_reports_nothing() {
    let home = TempDir::new().expect("home");
    fieldreg(&home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no registrations on this device"));
}

#[test]
fn sync_while_offline_reports_failure_without_losing_records() {
    let home = TempDir::new().expect("home");

    fieldreg(&home)
        .args([
            "register",
            "--name",
            "Asha Devi",
            "--phone",
            "9800000001",
            "--village",
            "Rampur",
            "--role",
            "artisan",
            "--endpoint",
            DEAD_ENDPOINT,
        ])
        .assert()
        .success();

    fieldreg(&home)
        .args(["sync", "--endpoint", DEAD_ENDPOINT])
        .assert()
        .success()
        .stdout(predicate::str::contains("network error"));

    let output = fieldreg(&home)
        .args(["status", "--json"])
        .output()
        .expect("status output");
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(payload["pending"], serde_json::json!(1), "record survives");
}

#[test]
fn session_login_attributes_later_registrations() {
    let home = TempDir::new().expect("home");

    fieldreg(&home)
        .args(["session", "login", "meera"])
        .assert()
        .success()
        .stdout(predicate::str::contains("signed in as 'meera'"));

    fieldreg(&home)
        .args([
            "register",
            "--name",
            "Asha Devi",
            "--phone",
            "9800000001",
            "--village",
            "Rampur",
            "--role",
            "artisan",
            "--endpoint",
            DEAD_ENDPOINT,
        ])
        .assert()
        .success();

    let output = fieldreg(&home)
        .args(["status", "--json"])
        .output()
        .expect("status output");
    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("status JSON");
    assert_eq!(
        payload["records"][0]["registered_by"],
        serde_json::json!("meera")
    );
}

#[test]
fn config_set_endpoint_persists() {
    let home = TempDir::new().expect("home");

    fieldreg(&home)
        .args(["config", "set-endpoint", "https://registry.example.org/api"])
        .assert()
        .success();

    fieldreg(&home)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://registry.example.org/api"));
}

#[test]
fn daemon_status_without_daemon_reports_not_running() {
    let home = TempDir::new().expect("home");
    fieldreg(&home)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""running": false"#));
}
