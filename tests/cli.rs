use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn tdt_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("tdt");
    path
}

fn run_tdt(args: &[&str], config: &Path) -> Output {
    Command::new(tdt_binary())
        .args(args)
        .arg("--config")
        .arg(config)
        .output()
        .expect("failed to run tdt")
}

fn setup_test_env(config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let config_dir = tmp.path().join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("tdt.toml");
    fs::write(&config_path, config).unwrap();
    (tmp, config_path)
}

const REPLAY_CONFIG: &str = r#"
[nutrition]
window_size = 10
windows = 3
sets = 5

[detection]
min_volume = 2.0

[admission]
filtering = "none"

[clustering]
freeze_period = 30

[consumer]
max_inactivity = 5
"#;

fn write_stream(dir: &Path) -> PathBuf {
    let mut lines = Vec::new();
    for i in 0..10 {
        lines.push(format!(
            r#"{{"text": "coffee morning commute", "timestamp": {}}}"#,
            i * 10
        ));
    }
    for ts in 100..103 {
        for _ in 0..2 {
            lines.push(format!(
                r#"{{"text": "earthquake shakes downtown", "timestamp": {}}}"#,
                ts
            ));
        }
    }
    let path = dir.join("stream.jsonl");
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

#[test]
fn test_check_config_ok() {
    let (_tmp, config) = setup_test_env(REPLAY_CONFIG);
    let output = run_tdt(&["check-config"], &config);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Configuration OK."));
    assert!(stdout.contains("3 x 10s"));
}

#[test]
fn test_check_config_rejects_negative_damping() {
    let (_tmp, config) = setup_test_env("[detection]\ndamping = -1.0\n");
    let output = run_tdt(&["check-config"], &config);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("detection.damping"), "stderr: {}", stderr);
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = run_tdt(&["check-config"], &tmp.path().join("nope.toml"));
    assert!(!output.status.success());
}

#[test]
fn test_replay_text_output() {
    let (tmp, config) = setup_test_env(REPLAY_CONFIG);
    let stream = write_stream(tmp.path());

    let output = run_tdt(
        &["replay", stream.to_str().unwrap(), "--report", "off"],
        &config,
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("node 0  1970-01-01T00:01:41Z"));
    assert!(stdout.contains("earthquake"));
    assert!(stdout.contains("16 consumed, 0 filtered, 0 skipped (stopped)"));
}

#[test]
fn test_replay_json_output() {
    let (tmp, config) = setup_test_env(REPLAY_CONFIG);
    let stream = write_stream(tmp.path());

    let output = run_tdt(
        &["replay", stream.to_str().unwrap(), "--json", "--report", "off"],
        &config,
    );
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["consumed"], 16);
    assert_eq!(summary["timeline"]["nodes"].as_array().unwrap().len(), 1);
}

#[test]
fn test_replay_empty_file() {
    let (tmp, config) = setup_test_env(REPLAY_CONFIG);
    let stream = tmp.path().join("empty.jsonl");
    fs::write(&stream, "\n").unwrap();

    let output = run_tdt(&["replay", stream.to_str().unwrap()], &config);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No items."));
}
