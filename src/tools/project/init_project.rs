use super::{m42_command, under_working_directory};
use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::tool::CommandTool;
use m42_types::{CommandDescriptor, CommandOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InitProjectInput {
    /// Project name
    pub name: String,
    /// Project template to use
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_template() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitProjectOutput {
    pub project_path: String,
    pub message: String,
}

pub struct InitProjectTool;

impl CommandTool for InitProjectTool {
    type Input = InitProjectInput;
    type Output = InitProjectOutput;

    fn name(&self) -> &'static str {
        "m42_init_project"
    }

    fn description(&self) -> &'static str {
        "Initialize a new m42-dev project with the specified name and template"
    }

    fn failure_message(&self) -> &'static str {
        "Failed to initialize project"
    }

    fn build_command(&self, input: &InitProjectInput, context: &ExecutionContext) -> CommandDescriptor {
        info!(name = %input.name, template = %input.template, "initializing project");
        m42_command(
            context,
            ["init", input.name.as_str(), "--template", input.template.as_str()],
        )
    }

    fn interpret(
        &self,
        input: &InitProjectInput,
        _output: &CommandOutput,
        context: &ExecutionContext,
    ) -> Result<InitProjectOutput, AppError> {
        Ok(InitProjectOutput {
            project_path: under_working_directory(context, &input.name),
            message: format!("Project {} initialized successfully", input.name),
        })
    }
}
