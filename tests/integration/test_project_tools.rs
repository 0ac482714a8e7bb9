#[path = "../common/mod.rs"]
mod common;

use common::{context_in, MockProcessRunner, MockStep};
use m42_dev_mcp::core::dispatcher::Dispatcher;
use m42_dev_mcp::core::process::ProcessError;
use m42_dev_mcp::core::registry::ToolRegistry;
use m42_dev_mcp::tools::register_all_tools;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

const STATUS_OUTPUT: &str = "\
m42-dev status report
=== PROJECT ===
Name: demo
Path: /work/demo
Status: Initialized
=== CURRENT FEATURE ===
ID: FEAT-001
Name: Login
Status: in-progress
=== CURRENT MILESTONE ===
ID: M1
Name: Skeleton
Status: active
Progress: 45%
";

const FEATURES_OUTPUT: &str = "\
Project: demo
Features:
FEAT-001 | Login | active | 2024-01-02 | 3 milestones
FEAT-002 | Search | completed
malformed row
FEAT-003 | Export | active |  | n/a
";

fn harness(steps: Vec<MockStep>, workdir: &Path) -> (Dispatcher, MockProcessRunner) {
    let runner = MockProcessRunner::new(steps);
    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, runner.executor());
    (
        Dispatcher::new(Arc::new(registry), context_in(workdir)),
        runner,
    )
}

fn parsed(text: Option<&str>) -> Value {
    serde_json::from_str(text.expect("text content")).expect("json text")
}

#[tokio::test]
async fn test_status_parses_sections() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(vec![MockStep::ok(STATUS_OUTPUT)], dir.path());

    let result = dispatcher
        .call_tool("m42_status", json!({"verbose": true}), None)
        .await;
    assert!(!result.is_error, "{:?}", result.first_text());

    let value = parsed(result.first_text());
    assert_eq!(
        value,
        json!({
            "project": {"name": "demo", "path": "/work/demo", "initialized": true},
            "currentFeature": {"id": "FEAT-001", "name": "Login", "status": "in-progress"},
            "currentMilestone": {"id": "M1", "name": "Skeleton", "status": "active", "progress": 45}
        })
    );

    let requests = runner.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].shell_line.ends_with("m42-dev.sh status --verbose"));
    assert_eq!(requests[0].cwd, dir.path());
}

#[tokio::test]
async fn test_status_without_sections_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, _runner) = harness(vec![MockStep::ok("nothing structured")], dir.path());

    let result = dispatcher.call_tool("m42_status", Value::Null, None).await;
    let value = parsed(result.first_text());
    assert_eq!(
        value,
        json!({"project": {"name": "Unknown", "path": ".", "initialized": false}})
    );
}

#[tokio::test]
async fn test_list_features_parses_table() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(vec![MockStep::ok(FEATURES_OUTPUT)], dir.path());

    let result = dispatcher
        .call_tool("m42_list_features", json!({"status": "active"}), None)
        .await;
    let value = parsed(result.first_text());

    assert_eq!(value["total"], 3);
    assert_eq!(
        value["features"][0],
        json!({"id": "FEAT-001", "name": "Login", "status": "active", "createdAt": "2024-01-02", "milestones": 3})
    );
    assert_eq!(value["features"][1]["createdAt"], "Unknown");
    assert!(value["features"][1].get("milestones").is_none());
    assert_eq!(value["features"][2]["createdAt"], "Unknown");
    assert!(value["features"][2].get("milestones").is_none());

    assert!(runner.shell_lines()[0].ends_with("list-features --status active"));
}

#[tokio::test]
async fn test_list_features_all_passes_no_filter() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(vec![MockStep::ok("")], dir.path());

    let result = dispatcher
        .call_tool("m42_list_features", json!({}), None)
        .await;
    assert_eq!(parsed(result.first_text()), json!({"features": [], "total": 0}));
    assert!(runner.shell_lines()[0].ends_with("m42-dev.sh list-features"));
}

#[tokio::test]
async fn test_init_project_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(vec![MockStep::ok("created")], dir.path());

    let result = dispatcher
        .call_tool("m42_init_project", json!({"name": "demo", "template": "rust"}), None)
        .await;
    let value = parsed(result.first_text());
    assert_eq!(
        value["projectPath"],
        format!("{}/demo", dir.path().display())
    );
    assert_eq!(value["message"], "Project demo initialized successfully");
    assert!(runner.shell_lines()[0].ends_with("init demo --template rust"));
}

#[tokio::test]
async fn test_init_feature_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(vec![MockStep::ok("")], dir.path());

    let result = dispatcher
        .call_tool(
            "m42_init_feature",
            json!({"id": "FEAT-009", "name": "Audit", "description": "Audit log"}),
            None,
        )
        .await;
    let value = parsed(result.first_text());
    assert_eq!(value["featureId"], "FEAT-009");
    assert_eq!(
        value["featurePath"],
        format!("{}/specs/features/FEAT-009", dir.path().display())
    );
    assert!(runner.shell_lines()[0].ends_with("init-feature FEAT-009 Audit --description Audit log"));
}

#[tokio::test]
async fn test_failures_use_stderr_or_fallback_message() {
    let cases = [
        ("m42_init_project", json!({"name": "demo"}), "Failed to initialize project"),
        ("m42_status", json!({}), "Failed to get project status"),
        ("m42_init_feature", json!({"id": "F", "name": "N"}), "Failed to initialize feature"),
        ("m42_list_features", json!({}), "Failed to list features"),
    ];

    for (tool, args, fallback) in cases {
        let dir = tempfile::tempdir().unwrap();
        let (dispatcher, _runner) = harness(
            vec![MockStep::exit(1, "", ""), MockStep::exit(2, "partial", "boom")],
            dir.path(),
        );

        let silent = dispatcher.call_tool(tool, args.clone(), None).await;
        assert!(silent.is_error);
        assert_eq!(silent.first_text(), Some(format!("Error: {}", fallback).as_str()));

        let noisy = dispatcher.call_tool(tool, args, None).await;
        assert_eq!(noisy.first_text(), Some("Error: boom"));
    }
}

#[tokio::test]
async fn test_process_errors_surface_their_message() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, _runner) = harness(
        vec![
            MockStep::Fail(|| ProcessError::Timeout { timeout_ms: 5000 }),
            MockStep::Fail(|| ProcessError::Cancelled),
        ],
        dir.path(),
    );

    let timed_out = dispatcher.call_tool("m42_status", json!({}), None).await;
    assert_eq!(
        timed_out.first_text(),
        Some("Error: Command timed out after 5000ms")
    );

    let cancelled = dispatcher.call_tool("m42_status", json!({}), None).await;
    assert_eq!(cancelled.first_text(), Some("Error: Command cancelled"));
}

#[tokio::test]
async fn test_invalid_input_never_runs_command() {
    let dir = tempfile::tempdir().unwrap();
    let (dispatcher, runner) = harness(Vec::new(), dir.path());

    let missing = dispatcher
        .call_tool("m42_init_feature", json!({"id": "FEAT-1"}), None)
        .await;
    assert!(missing.is_error);
    assert!(missing
        .first_text()
        .unwrap()
        .starts_with("Error: Invalid input:"));

    let bad_enum = dispatcher
        .call_tool("m42_list_features", json!({"status": "archived"}), None)
        .await;
    assert!(bad_enum.is_error);

    let extra_keys = dispatcher
        .call_tool("m42_status", json!({"verbose": false, "colour": "red"}), None)
        .await;
    assert!(!extra_keys.is_error);

    assert_eq!(runner.requests().len(), 1);
}
