//! Running the `rrl` binary end to end

use pretty_assertions::assert_eq;
use serde_json::Value;
use std::io::Write as _;
use std::path::Path;
use std::process::{Command, Output, Stdio};

fn rrl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rrl"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::null())
        .output()
        .unwrap()
}

fn rrl_json(args: &[&str]) -> Value {
    let output = rrl(args);
    assert!(
        output.status.success(),
        "rrl {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn repair_from_stdin_fills_a_null_profile() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rrl"))
        .args(["repair"])
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(b"null").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let profile: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(!profile["id"].as_str().unwrap().is_empty());
    assert!(!profile["structure"]["sections"].as_array().unwrap().is_empty());
}

#[test]
fn repair_from_file_keeps_valid_fields() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "profile.json",
        r#"{ "name": "Stent", "productCode": "NIQ", "structure": { "sections": [] } }"#,
    );

    let profile = rrl_json(&["repair", "--input", &input]);

    assert_eq!(profile["name"], "Stent");
    assert_eq!(profile["productCode"], "NIQ");
    assert!(!profile["structure"]["sections"].as_array().unwrap().is_empty());
}

#[test]
fn offline_recovery_prints_emergency_records() {
    let outcome = rrl_json(&["recover", "--step", "literature"]);

    assert_eq!(outcome["tier"], "synthetic");
    assert_eq!(outcome["attempt"], 1);
    let records = outcome["records"].as_array().unwrap();
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r["emergency_data"] == true));
    assert_eq!(outcome["issue"]["type"], "warning");
}

#[test]
fn fixture_results_are_cached_in_the_store_dir() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("store");
    let store = store.to_string_lossy().into_owned();
    let profile = write_file(
        dir.path(),
        "profile.json",
        r#"{ "id": "device-7", "name": "Infusion Pump", "productCode": "FRN" }"#,
    );
    let fixture = write_file(
        dir.path(),
        "devices.json",
        r#"[{
            "kNumber": "K201234",
            "deviceName": "Predicate Pump",
            "manufacturer": "Predicate Corp",
            "productCode": "FRN",
            "deviceClass": "II",
            "decisionDate": "2022-06-01",
            "matchScore": 93
        }]"#,
    );
    let args = [
        "recover",
        "--step",
        "reference-devices",
        "--profile",
        &profile,
        "--store-dir",
        &store,
        "--live-fixture",
        &fixture,
    ];

    let first = rrl_json(&args);
    let second = rrl_json(&args);

    assert_eq!(first["tier"], "live");
    assert_eq!(first["selected"]["kNumber"], "K201234");
    assert_eq!(second["tier"], "cached");
    assert_eq!(second["records"], first["records"]);
    assert!(dir.path().join("store").join("device-7").is_dir());
}

#[test]
fn config_round_trips_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "rrl.toml",
        "[recovery]\nmax_live_attempts = 5\n",
    );

    let output = rrl(&["config", "--file", &file]);
    assert!(output.status.success());
    let rendered = String::from_utf8(output.stdout).unwrap();

    assert!(rendered.contains("max_live_attempts = 5"));
    assert!(rendered.contains("[watchdog]"));
    let reparsed: toml::Value = toml::from_str(&rendered).unwrap();
    assert_eq!(reparsed["store"]["kind"].as_str(), Some("memory"));
}

#[test]
fn invalid_config_fails_the_command() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_file(
        dir.path(),
        "rrl.toml",
        "[watchdog]\nheartbeat_interval_ms = 0\n",
    );

    let output = rrl(&["config", "--file", &file]);

    assert!(!output.status.success());
}

#[test]
fn watch_reports_an_installed_watchdog() {
    let status = rrl_json(&["watch", "--seconds", "0"]);

    assert_eq!(status["watchdog"]["patchApplied"], true);
    assert_eq!(status["watchdog"]["activeTasks"], 3);
    assert_eq!(status["attempts"]["literature"], 0);
}
