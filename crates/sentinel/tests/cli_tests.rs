//! CLI integration tests

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_footprint-sentinel"));
    command.env_remove("RUST_LOG").env_remove("SENTINEL_CONFIG");
    command
}

fn run(args: &[&str]) -> Output {
    bin().args(args).output().expect("Failed to execute command")
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("rate"), "Should show rate command");
    assert!(stdout.contains("replay"), "Should show replay command");
    assert!(stdout.contains("watch"), "Should show watch command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("footprint-sentinel"), "Should show binary name");
}

#[test]
fn test_rate_json() {
    let output = run(&["rate", "1048576", "--format", "json"]);
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["bytes"], 1048576);
    assert_eq!(value["bytes_formatted"], "1 MB");
    assert_eq!(value["rating"], "C");
}

#[test]
fn test_rate_table_with_scale() {
    let output = run(&["rate", "0", "--scale"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("A+"));
    assert!(stdout.contains("0 B"));
}

#[test]
fn test_rate_rejects_garbage() {
    let output = run(&["rate", "lots"]);
    assert!(!output.status.success());
}

#[test]
fn test_replay_fixture_json() {
    let trace = fixture("page_load.json");
    let output = run(&["replay", trace.to_str().unwrap(), "--format", "json"]);
    assert!(
        output.status.success(),
        "replay failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = stdout_json(&output);
    assert_eq!(report["resources"].as_array().unwrap().len(), 5);
    assert_eq!(report["footprint"]["total"]["bytes"], 819_400);
    assert_eq!(report["footprint"]["total"]["rating"], "B");
    assert_eq!(report["summary"]["initial"]["bytes"], 722_500);
    assert_eq!(report["summary"]["show_initial"], true);

    let anchors: Vec<u64> = report["hints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["key"]["anchor"].as_u64().unwrap())
        .collect();
    assert_eq!(anchors, vec![1, 3]);

    let kinds: Vec<&str> = report["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["change", "initial"]);
}

#[test]
fn test_replay_honors_config_file() {
    let mut config = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(config, "skip_url_patterns = [\"analytics.test\"]").unwrap();
    writeln!(config, "show_resource_hints = false").unwrap();

    let trace = fixture("page_load.json");
    let output = run(&[
        "replay",
        trace.to_str().unwrap(),
        "--format",
        "json",
        "--config",
        config.path().to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["resources"].as_array().unwrap().len(), 4);
    assert!(report["hints"].as_array().unwrap().is_empty());
    assert_eq!(report["render_ops"], 0);
}

#[test]
fn test_watch_without_settle_stops_at_eof() {
    let mut child = bin()
        .args(["watch", "--settle-ms", "0"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn watch");
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let last: serde_json::Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["event"], "summary");
    assert_eq!(last["footprint"]["total"]["bytes"], 0);
}

#[test]
fn test_replay_missing_trace() {
    let output = run(&["replay", "/nonexistent/trace.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to read trace"));
}

#[test]
fn test_watch_emits_events_until_eof() {
    let mut child = bin()
        .args(["watch", "--settle-ms", "2000"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn watch");

    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(
            stdin,
            r#"{{"type": "entries", "entries": [{{"name": "https://a.test/app.js", "entryType": "resource", "transferSize": 300000}}]}}"#
        )
        .unwrap();
        writeln!(stdin, "this is not json").unwrap();
        writeln!(stdin, r#"{{"type": "signal", "signal": "content_loaded"}}"#).unwrap();
    }
    drop(child.stdin.take());

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let events: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let names: Vec<&str> = events
        .iter()
        .map(|e| e["event"].as_str().unwrap())
        .collect();

    assert!(names.contains(&"resource_updated"));
    assert!(names.contains(&"footprint_changed"));
    assert!(names.contains(&"initial_footprint"));
    assert_eq!(names.last(), Some(&"summary"));
    let summary = events.last().unwrap();
    assert_eq!(summary["footprint"]["total"]["bytes"], 300_000);
    assert!(summary["timestamp"].is_string());
}
