//! CLI tests for `codeflow run` and `codeflow config`.
//!
//! Spawns the binary with a shell one-liner standing in for the LLM command
//! and checks stdout and exit codes.

use std::fs;
use std::process::Command;

use codeflow::exit_codes;
use codeflow::io::config::{AgentConfig, load_config};

#[test]
fn config_prints_default_toml() {
    let output = Command::new(env!("CARGO_BIN_EXE_codeflow"))
        .arg("config")
        .output()
        .expect("codeflow config");
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert!(stdout.contains("max_steps = 40"), "{stdout}");
}

#[test]
fn config_write_round_trips() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("codeflow.toml");
    let status = Command::new(env!("CARGO_BIN_EXE_codeflow"))
        .args(["config", "--write"])
        .arg(&path)
        .status()
        .expect("codeflow config --write");
    assert_eq!(status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load"), AgentConfig::default());
}

#[test]
fn missing_working_dir_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = Command::new(env!("CARGO_BIN_EXE_codeflow"))
        .current_dir(temp.path())
        .args(["run", "-q", "anything", "-d", "does-not-exist"])
        .output()
        .expect("codeflow run");
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("is not a directory"), "{stderr}");
}

/// The LLM command always answers `finish`, so the run ends without actions.
#[cfg(unix)]
#[test]
fn run_with_finishing_llm_prints_response_and_history() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = temp.path().join("project");
    fs::create_dir(&project).expect("project dir");
    fs::write(
        temp.path().join("codeflow.toml"),
        r#"[llm]
command = ["sh", "-c", 'cat >/dev/null; printf "tool: finish\nreason: nothing to do\n"']
"#,
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_codeflow"))
        .current_dir(temp.path())
        .args(["run", "-q", "Say hi", "--history-json", "history.json"])
        .output()
        .expect("codeflow run");

    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("utf8");
    assert_eq!(stdout.trim(), "No actions were performed.");
    let history = fs::read_to_string(temp.path().join("history.json")).expect("history");
    assert_eq!(history.trim(), "[]");
}
