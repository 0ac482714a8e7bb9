//! Best-effort interpretation of captured command output.
//!
//! The external CLI prints loosely structured text. Each function here is an
//! independent strategy; a tool picks the one matching the command it ran.
//! The matching rules are deliberately loose and must stay exactly as they are.

use indexmap::IndexMap;
use m42_types::CommandOutput;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;

const SECTION_PREFIX: &str = "=== ";
const SECTION_SUFFIX: &str = " ===";

/// Ordered `key -> value` pairs extracted from `key: value` lines.
pub type KeyValues = IndexMap<String, String>;

/// Ordered `section name -> lines` extracted from `=== NAME ===` blocks.
pub type Sections = IndexMap<String, Vec<String>>;

fn key_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^:]+):\s*(.*)$").expect("valid key/value pattern"))
}

/// How a tool decides whether a finished process succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessPolicy {
    /// Exit code zero.
    #[default]
    ExitCode,
    /// Text markers first, exit code as the fallback. See [`extract_success`].
    Heuristic,
}

impl SuccessPolicy {
    pub fn judge(self, output: &CommandOutput) -> bool {
        match self {
            SuccessPolicy::ExitCode => output.succeeded(),
            SuccessPolicy::Heuristic => extract_success(output),
        }
    }
}

/// Parse stdout as JSON, falling back to stderr when stdout is empty.
///
/// Any parse failure yields `None`.
pub fn parse_json<T: DeserializeOwned>(output: &CommandOutput) -> Option<T> {
    let content = if output.stdout.is_empty() {
        &output.stderr
    } else {
        &output.stdout
    };
    serde_json::from_str(content).ok()
}

/// Collect `key: value` lines from stdout. The first colon splits; both sides are trimmed.
pub fn parse_key_value(output: &CommandOutput) -> KeyValues {
    let lines: Vec<&str> = output.stdout.split('\n').collect();
    parse_key_value_lines(&lines)
}

/// Apply the `key: value` rule to arbitrary lines, such as the body of a section.
///
/// Lines that do not match are skipped. A repeated key keeps its first
/// position and takes the latest value.
pub fn parse_key_value_lines<S: AsRef<str>>(lines: &[S]) -> KeyValues {
    let pattern = key_value_pattern();
    let mut values = KeyValues::new();
    for line in lines.iter().map(AsRef::as_ref) {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = pattern.captures(line) {
            let key = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

/// Non-blank stdout lines, trimmed, in order.
pub fn parse_list(output: &CommandOutput) -> Vec<String> {
    output
        .stdout
        .split('\n')
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split stdout into named sections opened by `=== NAME ===` markers.
///
/// Lines before the first marker are discarded. Body lines are kept
/// untrimmed; blank lines are dropped. A marker whose name is empty records
/// an empty `""` section and collects nothing until the next named marker.
pub fn parse_sections(output: &CommandOutput) -> Sections {
    let mut sections = Sections::new();
    let mut current: Option<String> = None;

    for line in output.stdout.split('\n') {
        if let Some(name) = section_marker(line) {
            sections.insert(name.to_string(), Vec::new());
            current = (!name.is_empty()).then(|| name.to_string());
        } else if let Some(name) = &current {
            if !line.trim().is_empty() {
                if let Some(body) = sections.get_mut(name) {
                    body.push(line.to_string());
                }
            }
        }
    }

    sections
}

fn section_marker(line: &str) -> Option<&str> {
    if !line.starts_with(SECTION_PREFIX) || !line.ends_with(SECTION_SUFFIX) {
        return None;
    }
    // "=== ===" satisfies both checks while sharing its middle "===".
    let inner = line
        .get(SECTION_PREFIX.len()..line.len().saturating_sub(SECTION_SUFFIX.len()))
        .unwrap_or("");
    Some(inner.trim())
}

/// Judge success from text when the command gives no structured signal.
///
/// Case-insensitive. "success"/"completed" in stdout wins; otherwise
/// "error"/"failed" in either stream loses; otherwise exit code zero.
pub fn extract_success(output: &CommandOutput) -> bool {
    let stdout = output.stdout.to_lowercase();
    let stderr = output.stderr.to_lowercase();

    if stdout.contains("success") || stdout.contains("completed") {
        return true;
    }

    let mentions_failure = |text: &str| text.contains("error") || text.contains("failed");
    if mentions_failure(&stderr) || mentions_failure(&stdout) {
        return false;
    }

    output.exit_code == 0
}

/// Escape text for embedding inside a hand-built JSON string literal.
pub fn sanitize_for_json(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}
