use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::output::SuccessPolicy;
use crate::core::process::CommandExecutor;
use async_trait::async_trait;
use m42_types::{CommandDescriptor, CommandOutput, ToolResult};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Name, description and input schema of a tool as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A named unit of functionality callable through the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the accepted input object.
    fn input_schema(&self) -> &Value;

    /// Run the tool. Every failure is reported through the returned result.
    async fn execute(&self, input: Value, context: &ExecutionContext) -> ToolResult<Value>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema().clone(),
        }
    }
}

/// A tool that maps its input onto one external command and reads the answer from its output.
///
/// Wrap an implementation in [`CommandToolHandler`] to obtain a [`Tool`].
pub trait CommandTool: Send + Sync + 'static {
    type Input: DeserializeOwned + JsonSchema + Send + Sync;
    type Output: Serialize;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Reported when the command fails without writing anything to stderr.
    fn failure_message(&self) -> &'static str;

    fn success_policy(&self) -> SuccessPolicy {
        SuccessPolicy::ExitCode
    }

    fn build_command(&self, input: &Self::Input, context: &ExecutionContext) -> CommandDescriptor;

    fn interpret(
        &self,
        input: &Self::Input,
        output: &CommandOutput,
        context: &ExecutionContext,
    ) -> Result<Self::Output, AppError>;
}

pub struct CommandToolHandler<T: CommandTool> {
    tool: T,
    executor: Arc<CommandExecutor>,
    schema: Value,
}

impl<T: CommandTool> CommandToolHandler<T> {
    pub fn new(tool: T, executor: Arc<CommandExecutor>) -> Self {
        Self {
            schema: input_schema_for::<T::Input>(),
            tool,
            executor,
        }
    }

    /// Deserialize the raw arguments. Absent input counts as an empty object;
    /// unknown keys are ignored.
    pub fn validate_input(&self, raw: Value) -> Result<T::Input, AppError> {
        let raw = if raw.is_null() {
            Value::Object(Map::new())
        } else {
            raw
        };
        serde_json::from_value(raw)
            .map_err(|e| AppError::validation(format!("Invalid input: {}", e)))
    }

    fn render(&self, input: &T::Input, output: &CommandOutput, context: &ExecutionContext) -> Result<Value, AppError> {
        let interpreted = self.tool.interpret(input, output, context)?;
        Ok(serde_json::to_value(interpreted)?)
    }
}

#[async_trait]
impl<T: CommandTool> Tool for CommandToolHandler<T> {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn description(&self) -> &str {
        self.tool.description()
    }

    fn input_schema(&self) -> &Value {
        &self.schema
    }

    async fn execute(&self, input: Value, context: &ExecutionContext) -> ToolResult<Value> {
        let input = match self.validate_input(input) {
            Ok(input) => input,
            Err(err) => return ToolResult::failure(err.user_message()),
        };

        let descriptor = self.tool.build_command(&input, context);
        debug!(tool = self.tool.name(), command = %descriptor.shell_line(), "running tool command");

        match self
            .executor
            .execute_with(&descriptor, context, self.tool.success_policy())
            .await
        {
            ToolResult::Failure { error, metadata } => {
                let error = if error.trim().is_empty() {
                    self.tool.failure_message().to_string()
                } else {
                    error
                };
                ToolResult::Failure { error, metadata }
            }
            ToolResult::Success {
                data: output,
                metadata,
            } => match self.render(&input, &output, context) {
                Ok(data) => ToolResult::Success { data, metadata },
                Err(err) => ToolResult::Failure {
                    error: err.user_message().to_string(),
                    metadata,
                },
            },
        }
    }
}

/// Object schema for `I` without the `$schema` dialect marker.
pub fn input_schema_for<I: JsonSchema>() -> Value {
    let root = schemars::gen::SchemaGenerator::default().into_root_schema_for::<I>();
    let mut schema = serde_json::to_value(root).unwrap_or_else(|_| serde_json::json!({}));
    if let Value::Object(map) = &mut schema {
        map.remove("$schema");
        map.entry("type").or_insert_with(|| Value::String("object".to_string()));
    }
    schema
}
