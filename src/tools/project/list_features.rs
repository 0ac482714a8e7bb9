use super::{leading_int, m42_command};
use crate::core::context::ExecutionContext;
use crate::core::error::AppError;
use crate::core::tool::CommandTool;
use m42_types::{CommandDescriptor, CommandOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FeatureStatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl FeatureStatusFilter {
    fn as_arg(self) -> Option<&'static str> {
        match self {
            FeatureStatusFilter::All => None,
            FeatureStatusFilter::Active => Some("active"),
            FeatureStatusFilter::Completed => Some("completed"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ListFeaturesInput {
    /// Filter features by status
    #[serde(default)]
    pub status: FeatureStatusFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    pub name: String,
    pub status: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestones: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListFeaturesOutput {
    pub features: Vec<Feature>,
    pub total: usize,
}

pub struct ListFeaturesTool;

impl CommandTool for ListFeaturesTool {
    type Input = ListFeaturesInput;
    type Output = ListFeaturesOutput;

    fn name(&self) -> &'static str {
        "m42_list_features"
    }

    fn description(&self) -> &'static str {
        "List all features in the project with their status"
    }

    fn failure_message(&self) -> &'static str {
        "Failed to list features"
    }

    fn build_command(&self, input: &ListFeaturesInput, context: &ExecutionContext) -> CommandDescriptor {
        info!(status = ?input.status, "listing features");
        let mut args = vec!["list-features"];
        if let Some(status) = input.status.as_arg() {
            args.extend(["--status", status]);
        }
        m42_command(context, args)
    }

    fn interpret(
        &self,
        _input: &ListFeaturesInput,
        output: &CommandOutput,
        _context: &ExecutionContext,
    ) -> Result<ListFeaturesOutput, AppError> {
        let features = parse_features(&output.stdout);
        Ok(ListFeaturesOutput {
            total: features.len(),
            features,
        })
    }
}

/// Rows of `ID | Name | Status | Created | Milestones` after the features header.
fn parse_features(stdout: &str) -> Vec<Feature> {
    let mut features = Vec::new();
    let mut in_list = false;

    for line in stdout.split('\n').filter(|line| !line.trim().is_empty()) {
        if line.contains("Features:") || line.contains("FEATURES") {
            in_list = true;
            continue;
        }
        if !in_list {
            continue;
        }

        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 3 {
            continue;
        }

        features.push(Feature {
            id: parts[0].to_string(),
            name: parts[1].to_string(),
            status: parts[2].to_string(),
            created_at: parts
                .get(3)
                .filter(|c| !c.is_empty())
                .map_or_else(|| "Unknown".to_string(), |c| c.to_string()),
            milestones: parts.get(4).and_then(|m| leading_int(m)),
        });
    }

    features
}
