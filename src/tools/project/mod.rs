//! Project management tools backed by the m42-dev CLI.

pub mod init_feature;
pub mod init_project;
pub mod list_features;
pub mod status;

pub use init_feature::InitFeatureTool;
pub use init_project::InitProjectTool;
pub use list_features::ListFeaturesTool;
pub use status::StatusTool;

use crate::core::context::ExecutionContext;
use m42_types::CommandDescriptor;

/// `<m42 path> <args…>` run from the working directory.
pub(crate) fn m42_command<I, S>(context: &ExecutionContext, args: I) -> CommandDescriptor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    CommandDescriptor::new(context.m42_command())
        .args(args)
        .cwd(context.working_directory())
}

/// Path below the working directory, joined with a literal `/`.
pub(crate) fn under_working_directory(context: &ExecutionContext, rest: &str) -> String {
    format!("{}/{}", context.working_directory().display(), rest)
}

/// Leading integer of `text` after optional whitespace and sign; `None` when there are no digits.
pub(crate) fn leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
