use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn m42_mcp() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("m42-dev-mcp"));
    cmd.env_remove("M42_PROJECT_ROOT")
        .env_remove("M42_PATH")
        .env_remove("M42_WORKING_DIRECTORY")
        .env_remove("M42_DEFAULT_TIMEOUT")
        .env_remove("RUST_LOG")
        .env_remove("LOG_LEVEL");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let output = m42_mcp().arg("--help").output().expect("run --help");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("COMMANDS:"));
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("tools"));
    assert!(stdout.contains("call"));
    assert!(stdout.contains("--project-root"));
}

#[test]
fn test_version_flag() {
    m42_mcp()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_tools_prints_registered_tools() {
    let dir = tempfile::tempdir().unwrap();
    let output = m42_mcp()
        .arg("tools")
        .arg("--project-root")
        .arg(dir.path())
        .output()
        .expect("run tools");
    assert!(output.status.success());

    let tools: Value = serde_json::from_slice(&output.stdout).expect("tool list is json");
    let names: Vec<&str> = tools
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "m42_init_project",
            "m42_status",
            "m42_init_feature",
            "m42_list_features"
        ]
    );
}

#[cfg(unix)]
#[test]
fn test_call_runs_project_executable() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("m42-dev.sh");
    std::fs::write(
        &script,
        "#!/bin/sh\necho '=== PROJECT ==='\necho 'Name: demo'\necho 'Status: Initialized'\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let output = m42_mcp()
        .args(["call", "m42_status", "--project-root"])
        .arg(dir.path())
        .output()
        .expect("run call");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let body: Value = serde_json::from_slice(&output.stdout).expect("call output is json");
    assert_eq!(body["project"]["name"], "demo");
    assert_eq!(body["project"]["initialized"], true);
}

#[test]
fn test_call_unknown_tool_fails() {
    let dir = tempfile::tempdir().unwrap();
    m42_mcp()
        .args(["call", "m42_nope", "--project-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Error: Tool not found: m42_nope"));
}

#[test]
fn test_call_rejects_invalid_json_args() {
    let dir = tempfile::tempdir().unwrap();
    m42_mcp()
        .args(["call", "m42_status", "--args", "{oops", "--project-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--args is not valid JSON"));
}

#[test]
fn test_invalid_timeout_is_rejected_before_start() {
    let dir = tempfile::tempdir().unwrap();
    m42_mcp()
        .args(["tools", "--timeout", "soon", "--project-root"])
        .arg(dir.path())
        .assert()
        .failure();
}
