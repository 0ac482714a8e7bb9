use super::{leading_int, m42_command};
use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::output::{parse_key_value_lines, parse_sections, KeyValues, Sections};
use crate::core::tool::CommandTool;
use m42_types::{CommandDescriptor, CommandOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

const PROJECT_SECTION: &str = "PROJECT";
const FEATURE_SECTION: &str = "CURRENT FEATURE";
const MILESTONE_SECTION: &str = "CURRENT MILESTONE";
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StatusInput {
    /// Show detailed status information
    #[serde(default)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub project: ProjectInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_feature: Option<FeatureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_milestone: Option<MilestoneInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureInfo {
    pub id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub progress: i64,
}

pub struct StatusTool;

impl CommandTool for StatusTool {
    type Input = StatusInput;
    type Output = StatusOutput;

    fn name(&self) -> &'static str {
        "m42_status"
    }

    fn description(&self) -> &'static str {
        "Get the current status of the m42-dev project, including active feature and milestone"
    }

    fn failure_message(&self) -> &'static str {
        "Failed to get project status"
    }

    fn build_command(&self, input: &StatusInput, context: &ExecutionContext) -> CommandDescriptor {
        info!(verbose = input.verbose, "getting project status");
        if input.verbose {
            m42_command(context, ["status", "--verbose"])
        } else {
            m42_command(context, ["status"])
        }
    }

    fn interpret(
        &self,
        _input: &StatusInput,
        output: &CommandOutput,
        _context: &ExecutionContext,
    ) -> Result<StatusOutput, AppError> {
        let sections = parse_sections(output);
        Ok(StatusOutput {
            project: project_info(&sections),
            current_feature: feature_info(&sections),
            current_milestone: milestone_info(&sections),
        })
    }
}

fn section_values(sections: &Sections, name: &str) -> Option<KeyValues> {
    sections
        .get(name)
        .filter(|lines| !lines.is_empty())
        .map(|lines| parse_key_value_lines(lines.as_slice()))
}

/// Value for `key`, with empty strings treated as missing.
fn value_or(values: &KeyValues, key: &str, fallback: &str) -> String {
    values
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

fn identified(sections: &Sections, name: &str) -> Option<(String, KeyValues)> {
    let values = section_values(sections, name)?;
    let id = values.get("ID").filter(|id| !id.is_empty())?.clone();
    Some((id, values))
}

fn project_info(sections: &Sections) -> ProjectInfo {
    let values = section_values(sections, PROJECT_SECTION).unwrap_or_default();
    ProjectInfo {
        name: value_or(&values, "Name", UNKNOWN),
        path: value_or(&values, "Path", "."),
        initialized: values.get("Status").map(String::as_str) == Some("Initialized"),
    }
}

fn feature_info(sections: &Sections) -> Option<FeatureInfo> {
    let (id, values) = identified(sections, FEATURE_SECTION)?;
    Some(FeatureInfo {
        id,
        name: value_or(&values, "Name", UNKNOWN),
        status: value_or(&values, "Status", UNKNOWN),
    })
}

fn milestone_info(sections: &Sections) -> Option<MilestoneInfo> {
    let (id, values) = identified(sections, MILESTONE_SECTION)?;
    Some(MilestoneInfo {
        id,
        name: value_or(&values, "Name", UNKNOWN),
        status: value_or(&values, "Status", UNKNOWN),
        progress: values
            .get("Progress")
            .and_then(|p| leading_int(p))
            .unwrap_or(0),
    })
}
