use super::{m42_command, under_working_directory};
use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::tool::CommandTool;
use m42_types::{CommandDescriptor, CommandOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InitFeatureInput {
    /// Feature ID (e.g., FEAT-001)
    pub id: String,
    /// Feature name
    pub name: String,
    /// Feature description
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitFeatureOutput {
    pub feature_id: String,
    pub feature_path: String,
    pub message: String,
}

pub struct InitFeatureTool;

impl CommandTool for InitFeatureTool {
    type Input = InitFeatureInput;
    type Output = InitFeatureOutput;

    fn name(&self) -> &'static str {
        "m42_init_feature"
    }

    fn description(&self) -> &'static str {
        "Initialize a new feature with the specified ID and name"
    }

    fn failure_message(&self) -> &'static str {
        "Failed to initialize feature"
    }

    fn build_command(&self, input: &InitFeatureInput, context: &ExecutionContext) -> CommandDescriptor {
        info!(id = %input.id, name = %input.name, "initializing feature");
        let mut args = vec!["init-feature", input.id.as_str(), input.name.as_str()];
        if let Some(description) = input.description.as_deref().filter(|d| !d.is_empty()) {
            args.extend(["--description", description]);
        }
        m42_command(context, args)
    }

    fn interpret(
        &self,
        input: &InitFeatureInput,
        _output: &CommandOutput,
        context: &ExecutionContext,
    ) -> Result<InitFeatureOutput, AppError> {
        Ok(InitFeatureOutput {
            feature_id: input.id.clone(),
            feature_path: under_working_directory(context, &format!("specs/features/{}", input.id)),
            message: format!("Feature {} initialized successfully", input.id),
        })
    }
}
