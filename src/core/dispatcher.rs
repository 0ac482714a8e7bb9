use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::registry::ToolRegistry;
use crate::core::tool::ToolDescriptor;
use m42_types::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One block of call output. Only text is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Protocol-facing outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
            is_error: false,
        }
    }

    /// Error envelope; the message is prefixed with `Error: `.
    pub fn error<S: AsRef<str>>(message: S) -> Self {
        Self {
            is_error: true,
            ..Self::text(format!("Error: {}", message.as_ref()))
        }
    }

    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|c| c.text.as_str())
    }
}

impl From<ToolResult<Value>> for CallToolResult {
    fn from(result: ToolResult<Value>) -> Self {
        match result {
            ToolResult::Success { data, .. } => match serde_json::to_string_pretty(&data) {
                Ok(text) => CallToolResult::text(text),
                Err(err) => CallToolResult::error(err.to_string()),
            },
            ToolResult::Failure { error, .. } => CallToolResult::error(error),
        }
    }
}

/// Routes list and call requests to the registry.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    context: ExecutionContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: ExecutionContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }

    /// Run one tool on its own task.
    ///
    /// Never fails: unknown tools, tool failures and panics all come back as
    /// error envelopes.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        cancellation: Option<CancellationToken>,
    ) -> CallToolResult {
        let Some(tool) = self.registry.resolve(name) else {
            let err = AppError::not_found(name);
            warn!(tool = name, code = %err.code, "call for unknown tool");
            return CallToolResult::error(err.user_message());
        };

        let context = match cancellation {
            Some(token) => self.context.with_cancellation(token),
            None => self.context.clone(),
        };

        let started = Instant::now();
        let handle = tokio::spawn(async move { tool.execute(arguments, &context).await });

        match handle.await {
            Ok(result) => {
                info!(
                    tool = name,
                    success = result.is_success(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "tool call finished"
                );
                CallToolResult::from(result)
            }
            Err(join_error) => {
                let detail = panic_detail(join_error);
                error!(tool = name, error = %detail, "tool call aborted");
                CallToolResult::error(format!("Tool {} failed unexpectedly: {}", name, detail))
            }
        }
    }
}

fn panic_detail(join_error: tokio::task::JoinError) -> String {
    if join_error.is_cancelled() {
        return "task cancelled".to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
