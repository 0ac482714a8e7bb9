//! Value types shared between the tool core and its callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Free-form metadata attached to a [`ToolResult`].
pub type Metadata = Map<String, Value>;

/// Exit code reported when a process ended without producing one (killed by a signal).
pub const TERMINATED_EXIT_CODE: i32 = -1;

/// Uniform outcome returned by every tool handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult<T> {
    Success {
        data: T,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
    Failure {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<Metadata>,
    },
}

impl<T> ToolResult<T> {
    pub fn success(data: T) -> Self {
        ToolResult::Success {
            data,
            metadata: None,
        }
    }

    pub fn failure<S: Into<String>>(error: S) -> Self {
        ToolResult::Failure {
            error: error.into(),
            metadata: None,
        }
    }

    /// Attach a single metadata entry, creating the map on first use.
    pub fn with_meta<K: Into<String>>(mut self, key: K, value: impl Into<Value>) -> Self {
        let slot = match &mut self {
            ToolResult::Success { metadata, .. } | ToolResult::Failure { metadata, .. } => metadata,
        };
        slot.get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, extra: Metadata) -> Self {
        let slot = match &mut self {
            ToolResult::Success { metadata, .. } | ToolResult::Failure { metadata, .. } => metadata,
        };
        slot.get_or_insert_with(Map::new).extend(extra);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ToolResult::Success { data, .. } => Some(data),
            ToolResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ToolResult::Success { .. } => None,
            ToolResult::Failure { error, .. } => Some(error),
        }
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            ToolResult::Success { metadata, .. } | ToolResult::Failure { metadata, .. } => {
                metadata.as_ref()
            }
        }
    }

    /// Transform the payload, keeping metadata and failures untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ToolResult<U> {
        match self {
            ToolResult::Success { data, metadata } => ToolResult::Success {
                data: f(data),
                metadata,
            },
            ToolResult::Failure { error, metadata } => ToolResult::Failure { error, metadata },
        }
    }
}

/// Options that adjust how a [`CommandDescriptor`] is executed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Zero disables the deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// One external-process invocation, built fresh for every tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub command: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub options: CommandOptions,
}

impl CommandDescriptor {
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            options: CommandOptions::default(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd<P: Into<PathBuf>>(mut self, cwd: P) -> Self {
        self.options.cwd = Some(cwd.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.options.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// The line handed to the shell: executable and arguments joined by single spaces.
    ///
    /// Arguments are not quoted, so the shell re-tokenizes them.
    pub fn shell_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Build an output record, trimming both streams.
    pub fn new(stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        Self {
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            exit_code: exit_code.unwrap_or(TERMINATED_EXIT_CODE),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
