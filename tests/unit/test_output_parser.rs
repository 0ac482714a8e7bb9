use m42_dev_mcp::core::output::{
    extract_success, parse_json, parse_key_value, parse_list, parse_sections, sanitize_for_json,
    SuccessPolicy,
};
use m42_dev_mcp::CommandOutput;
use serde_json::Value;

fn stdout(text: &str) -> CommandOutput {
    CommandOutput::new(text, "", Some(0))
}

#[test]
fn test_key_value_splits_on_first_colon() {
    let values = parse_key_value(&stdout("url: http://host:8080/x\n  Name :  demo  \nno separator here"));
    assert_eq!(values.len(), 2);
    assert_eq!(values["url"], "http://host:8080/x");
    assert_eq!(values["Name"], "demo");
}

#[test]
fn test_key_value_keeps_first_position_and_last_value() {
    let values = parse_key_value(&stdout("a: 1\nb: 2\na: 3"));
    let pairs: Vec<(&str, &str)> = values
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
}

#[test]
fn test_key_value_allows_empty_values() {
    let values = parse_key_value(&stdout("Description:\nOwner: me"));
    assert_eq!(values["Description"], "");
    assert_eq!(values["Owner"], "me");
}

#[test]
fn test_list_drops_blank_lines() {
    let list = parse_list(&stdout("one\n\n   \n  two  \nthree"));
    assert_eq!(list, vec!["one", "two", "three"]);
}

#[test]
fn test_sections_group_lines_under_markers() {
    let output = stdout(
        "preamble is ignored\n\
         === PROJECT ===\n\
         Name: demo\n\
         \n\
         \x20 Path: /tmp/demo\n\
         === CURRENT FEATURE ===\n\
         ID: FEAT-001",
    );
    let sections = parse_sections(&output);
    let names: Vec<&str> = sections.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["PROJECT", "CURRENT FEATURE"]);
    assert_eq!(sections["PROJECT"], vec!["Name: demo", "  Path: /tmp/demo"]);
    assert_eq!(sections["CURRENT FEATURE"], vec!["ID: FEAT-001"]);
}

#[test]
fn test_empty_section_marker_closes_current_section() {
    let sections = parse_sections(&stdout("=== A ===\nx\n=== ===\ny\n=== B ===\nz"));
    let names: Vec<&str> = sections.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["A", "", "B"]);
    assert_eq!(sections["A"], vec!["x"]);
    assert!(sections[""].is_empty());
    assert_eq!(sections["B"], vec!["z"]);
}

#[test]
fn test_section_without_body_is_present_and_empty() {
    let sections = parse_sections(&stdout("=== EMPTY ===\n=== NEXT ===\nv"));
    assert!(sections["EMPTY"].is_empty());
    assert_eq!(sections["NEXT"], vec!["v"]);
}

#[test]
fn test_repeated_section_restarts_body() {
    let sections = parse_sections(&stdout("=== A ===\nfirst\n=== A ===\nsecond"));
    assert_eq!(sections.len(), 1);
    assert_eq!(sections["A"], vec!["second"]);
}

#[test]
fn test_heuristic_success_markers_win() {
    let output = CommandOutput::new("Build completed with warnings", "error: lint", Some(1));
    assert!(extract_success(&output));

    let output = CommandOutput::new("SUCCESS", "", Some(3));
    assert!(extract_success(&output));
}

#[test]
fn test_heuristic_failure_markers_lose() {
    let output = CommandOutput::new("done", "Request FAILED", Some(0));
    assert!(!extract_success(&output));

    let output = CommandOutput::new("an Error occurred", "", Some(0));
    assert!(!extract_success(&output));
}

#[test]
fn test_heuristic_falls_back_to_exit_code() {
    assert!(extract_success(&CommandOutput::new("done", "", Some(0))));
    assert!(!extract_success(&CommandOutput::new("done", "", Some(2))));
}

#[test]
fn test_success_policy_exit_code_ignores_text() {
    let output = CommandOutput::new("completed", "", Some(1));
    assert!(!SuccessPolicy::ExitCode.judge(&output));
    assert!(SuccessPolicy::Heuristic.judge(&output));
    assert_eq!(SuccessPolicy::default(), SuccessPolicy::ExitCode);
}

#[test]
fn test_json_prefers_stdout_then_stderr() {
    let parsed: Option<Value> = parse_json(&CommandOutput::new("", r#"{"ok":true}"#, Some(1)));
    assert_eq!(parsed, Some(serde_json::json!({"ok": true})));

    let parsed: Option<Value> = parse_json(&CommandOutput::new("not json", r#"{"ok":true}"#, Some(0)));
    assert_eq!(parsed, None);
}

#[test]
fn test_sanitize_for_json_escapes_control_characters() {
    let raw = "say \"hi\"\\\n\tdone\r";
    let escaped = sanitize_for_json(raw);
    assert_eq!(escaped, r#"say \"hi\"\\\n\tdone\r"#);

    let decoded: String = serde_json::from_str(&format!("\"{}\"", escaped)).unwrap();
    assert_eq!(decoded, raw);
}
