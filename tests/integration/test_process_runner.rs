#![cfg(unix)]

#[path = "../common/mod.rs"]
mod common;

use common::context_in;
use m42_dev_mcp::core::process::{
    CommandExecutor, ProcessError, ProcessRequest, ProcessRunner, TokioProcessRunner,
    TERMINATION_GRACE,
};
use m42_dev_mcp::core::SuccessPolicy;
use m42_dev_mcp::CommandDescriptor;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn request(line: &str, cwd: &Path) -> ProcessRequest {
    ProcessRequest {
        shell_line: line.to_string(),
        cwd: cwd.to_path_buf(),
        env: BTreeMap::new(),
        timeout: None,
        cancellation: None,
    }
}

fn write_script(dir: &TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    format!("sh {}", path.display())
}

/// Zombies count as dead: nothing may reap orphans promptly inside a container.
fn pid_alive(pid: i32) -> bool {
    let proc_root = Path::new("/proc");
    if proc_root.join("self").exists() {
        return match std::fs::read_to_string(proc_root.join(pid.to_string()).join("stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.trim_start().chars().next())
                .map(|state| state != 'Z' && state != 'X')
                .unwrap_or(false),
            Err(_) => false,
        };
    }
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_runs_in_requested_directory_with_env() {
    let dir = tempfile::tempdir().unwrap();
    let mut req = request("pwd; echo \"$M42_TEST_VALUE\"", dir.path());
    req.env.insert("M42_TEST_VALUE".into(), "from-env".into());

    let output = TokioProcessRunner.run(&req).await.unwrap();
    let lines: Vec<&str> = output.stdout.lines().collect();
    let reported = std::fs::canonicalize(lines[0]).unwrap();
    assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    assert_eq!(lines[1], "from-env");
    assert_eq!(output.exit_code, 0);
}

#[tokio::test]
async fn test_missing_directory_is_a_start_error() {
    let dir = tempfile::tempdir().unwrap();
    let req = request("echo hi", &dir.path().join("does-not-exist"));

    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    assert!(matches!(err, ProcessError::Start { .. }));
    assert!(err.to_string().starts_with("Failed to start command `echo hi`"));
}

#[tokio::test]
async fn test_output_is_trimmed_and_lossy_decoded() {
    let dir = tempfile::tempdir().unwrap();
    let req = request("printf '  padded \\n\\n'; printf '\\377' >&2; exit 4", dir.path());

    let output = TokioProcessRunner.run(&req).await.unwrap();
    assert_eq!(output.stdout, "padded");
    assert_eq!(output.stderr, "\u{FFFD}");
    assert_eq!(output.exit_code, 4);
}

#[tokio::test]
async fn test_timeout_kills_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let line = write_script(
        &dir,
        "slow.sh",
        &format!("sleep 30 &\necho $! > {}\nwait", pid_file.display()),
    );
    let mut req = request(&line, dir.path());
    req.timeout = Some(Duration::from_millis(300));

    let started = Instant::now();
    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ProcessError::Timeout { timeout_ms: 300 }));
    assert!(elapsed < Duration::from_millis(300) + TERMINATION_GRACE + Duration::from_secs(1));

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pid_alive(pid), "background child survived the timeout");
}

#[tokio::test]
async fn test_timeout_applies_while_background_child_holds_output() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("bg.pid");
    let mut req = request(
        &format!("echo hi; sleep 6 & echo $! > {}", pid_file.display()),
        dir.path(),
    );
    req.timeout = Some(Duration::from_millis(500));

    let started = Instant::now();
    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ProcessError::Timeout { timeout_ms: 500 }), "{err:?}");
    assert!(
        elapsed < Duration::from_millis(500) + TERMINATION_GRACE + Duration::from_secs(1),
        "run took {elapsed:?}"
    );

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!pid_alive(pid), "background child outlived the timeout");
}

#[tokio::test]
async fn test_cancellation_applies_while_background_child_holds_output() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let mut req = request("echo hi; sleep 6 &", dir.path());
    req.cancellation = Some(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, ProcessError::Cancelled));
    assert!(started.elapsed() < Duration::from_millis(300) + TERMINATION_GRACE + Duration::from_secs(1));
}

#[tokio::test]
async fn test_process_ignoring_sigterm_is_force_killed() {
    let dir = tempfile::tempdir().unwrap();
    let line = write_script(&dir, "stubborn.sh", "trap '' TERM\nwhile true; do sleep 0.1; done");
    let mut req = request(&line, dir.path());
    req.timeout = Some(Duration::from_millis(200));

    let started = Instant::now();
    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    assert!(matches!(err, ProcessError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_millis(200) + TERMINATION_GRACE + Duration::from_secs(2));
}

#[tokio::test]
async fn test_cancellation_stops_running_process() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let mut req = request("sleep 30", dir.path());
    req.cancellation = Some(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let started = Instant::now();
    let err = TokioProcessRunner.run(&req).await.unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, ProcessError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancellation_after_completion_has_no_effect() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancellationToken::new();
    let mut req = request("echo done", dir.path());
    req.cancellation = Some(token.clone());

    let output = TokioProcessRunner.run(&req).await.unwrap();
    token.cancel();
    assert_eq!(output.stdout, "done");
}

#[tokio::test]
async fn test_executor_reports_timeout_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let executor = CommandExecutor::default();
    let descriptor = CommandDescriptor::new("sleep").arg("5").timeout_ms(100);

    let result = executor.execute(&descriptor, &context_in(dir.path())).await;
    assert_eq!(result.error(), Some("Command timed out after 100ms"));
    let meta = result.metadata().unwrap();
    assert!(meta.contains_key("durationMs"));
    assert!(!meta.contains_key("exitCode"));
}

#[tokio::test]
async fn test_executor_default_timeout_applies() {
    let dir = tempfile::tempdir().unwrap();
    let executor = CommandExecutor::new(std::sync::Arc::new(TokioProcessRunner), Duration::from_millis(150));
    let descriptor = CommandDescriptor::new("sleep").arg("5");

    let result = executor.execute(&descriptor, &context_in(dir.path())).await;
    assert_eq!(result.error(), Some("Command timed out after 150ms"));
}

#[tokio::test]
async fn test_executor_zero_timeout_waits_for_completion() {
    let dir = tempfile::tempdir().unwrap();
    let executor = CommandExecutor::new(std::sync::Arc::new(TokioProcessRunner), Duration::from_millis(50));
    let descriptor = CommandDescriptor::new("sleep").arg("0.3").timeout_ms(0);

    let result = executor.execute(&descriptor, &context_in(dir.path())).await;
    assert!(result.is_success());
}

#[tokio::test]
async fn test_executor_heuristic_policy_reads_text() {
    let dir = tempfile::tempdir().unwrap();
    let executor = CommandExecutor::default();
    let descriptor = CommandDescriptor::new("echo").args(["Task", "completed", ";", "exit", "1"]);

    let result = executor
        .execute_with(&descriptor, &context_in(dir.path()), SuccessPolicy::Heuristic)
        .await;
    assert!(result.is_success());
    assert_eq!(result.metadata().unwrap()["exitCode"], 1);
}
