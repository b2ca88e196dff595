//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a temporary data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(data_dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_medalarm"))
        .args(args)
        .env("MEDALARM_DATA_DIR", data_dir)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

fn add_medication(dir: &Path, name: &str, pills: &str) -> String {
    let med = run_json(dir, &["med", "add", name, "--pills", pills]);
    med["id"].as_str().unwrap().to_string()
}

#[test]
fn test_med_add_and_list() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "20");

    let list = run_json(dir.path(), &["med", "list"]);
    let meds = list.as_array().unwrap();
    assert_eq!(meds.len(), 1);
    assert_eq!(meds[0]["id"], id.as_str());
    assert_eq!(meds[0]["pill_count"], 20);
}

#[test]
fn test_alarm_add_registers_one_trigger_per_day() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "20");

    let added = run_json(dir.path(), &["alarm", "add", &id, "08:30", "--days", "1,3,5"]);
    assert_eq!(added["resync"]["registered"], 3);

    let schedule = run_json(dir.path(), &["schedule", "triggers"]);
    let triggers = schedule["triggers"].as_array().unwrap();
    assert_eq!(triggers.len(), 3);
    assert!(triggers.iter().all(|t| t["hour"] == 8 && t["minute"] == 30));
    assert_eq!(triggers[0]["payload"]["medicationId"], id.as_str());
}

#[test]
fn test_alarm_add_rejects_bad_time() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "20");

    let (code, _, stderr) = run_cli(dir.path(), &["alarm", "add", &id, "25:00", "--days", "1"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));

    let alarms = run_json(dir.path(), &["alarm", "list"]);
    assert!(alarms.as_array().unwrap().is_empty());
}

#[test]
fn test_disable_alarm_removes_triggers() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "20");
    let added = run_json(dir.path(), &["alarm", "add", &id, "08:00", "--days", "1,2"]);
    let alarm_id = added["alarm"]["id"].as_str().unwrap().to_string();

    let report = run_json(dir.path(), &["alarm", "disable", &alarm_id]);
    assert_eq!(report["registered"], 0);
    assert_eq!(report["disabled"], 1);
}

#[test]
fn test_take_dose_and_stats() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "1");
    run_json(dir.path(), &["alarm", "add", &id, "08:00", "--days", "1,2,3,4,5,6,7"]);

    let entry = run_json(dir.path(), &["med", "take", &id]);
    assert_eq!(entry["medication_id"], id.as_str());

    let med = run_json(dir.path(), &["med", "show", &id]);
    assert_eq!(med["medication"]["pill_count"], 0);

    let stats = run_json(dir.path(), &["stats", "show", &id]);
    assert_eq!(stats["total_taken"], 1);
    assert_eq!(stats["total_expected"], 30);
    assert_eq!(stats["current_streak"], 1);

    // Out of pills.
    let (code, _, stderr) = run_cli(dir.path(), &["med", "take", &id]);
    assert_eq!(code, 1);
    assert!(stderr.contains("no pills left"));
}

#[test]
fn test_stats_for_unknown_medication_is_zero() {
    let dir = TempDir::new().unwrap();
    let stats = run_json(dir.path(), &["stats", "show", "missing"]);
    assert_eq!(stats["total_expected"], 0);
    assert_eq!(stats["adherence_rate"], 0);
}

#[test]
fn test_reset_clears_alarms_and_history() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "5");
    run_json(dir.path(), &["alarm", "add", &id, "08:00", "--days", "1,2"]);
    run_json(dir.path(), &["med", "take", &id]);

    let reset = run_json(dir.path(), &["reset"]);
    assert_eq!(reset["reset"]["deleted_alarms"], 1);
    assert_eq!(reset["reset"]["deleted_history"], 1);
    assert_eq!(reset["resync"]["registered"], 0);

    let meds = run_json(dir.path(), &["med", "list"]);
    assert_eq!(meds.as_array().unwrap().len(), 1);
    let history = run_json(dir.path(), &["history", "list"]);
    assert!(history.as_array().unwrap().is_empty());
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["config", "set", "adherence.window_days", "14"]);
    assert_eq!(code, 0);

    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "adherence.window_days"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "14");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "adherence.window_days", "0"]);
    assert_eq!(code, 1);
}

#[test]
fn test_schedule_next_lists_upcoming() {
    let dir = TempDir::new().unwrap();
    let id = add_medication(dir.path(), "Aspirin", "5");
    run_json(dir.path(), &["alarm", "add", &id, "08:00", "--days", "1,2,3,4,5,6,7"]);

    let next = run_json(dir.path(), &["schedule", "next", "--limit", "3"]);
    let next = next.as_array().unwrap();
    assert_eq!(next.len(), 3);
    assert_eq!(next[0]["medication_id"], id.as_str());
}

#[test]
fn test_daemon_single_tick() {
    let dir = TempDir::new().unwrap();
    let (code, _, _) = run_cli(dir.path(), &["daemon", "--once"]);
    assert_eq!(code, 0);
}

#[test]
fn test_daemon_rejects_interval_longer_than_a_minute() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["daemon", "--once", "--interval", "120"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("120"));

    let (code, _, _) = run_cli(dir.path(), &["daemon", "--once", "--interval", "60"]);
    assert_eq!(code, 0);
}
