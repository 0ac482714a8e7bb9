use crate::core::config::ConfigOverrides;
use clap::Args;
use std::path::PathBuf;

/// Flags accepted by every subcommand. They override config files and environment.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Project root holding m42-mcp.toml (default: $M42_PROJECT_ROOT or current directory)
    #[arg(long, value_name = "PATH", global = true)]
    pub project_root: Option<PathBuf>,

    /// Path to the m42-dev executable (default: <project root>/m42-dev.sh)
    #[arg(long, value_name = "PATH", global = true)]
    pub m42_path: Option<PathBuf>,

    /// Directory commands run in (default: project root)
    #[arg(long, value_name = "PATH", global = true)]
    pub working_directory: Option<PathBuf>,

    /// Per-command timeout, e.g. 90s or 10m; plain numbers are milliseconds, 0 disables
    #[arg(long, value_name = "DURATION", global = true)]
    pub timeout: Option<String>,
}

impl GlobalArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            project_root: self.project_root.clone(),
            m42_path: self.m42_path.clone(),
            working_directory: self.working_directory.clone(),
            timeout: self.timeout.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct CallArgs {
    /// Tool to invoke, e.g. m42_status
    #[arg(value_name = "TOOL")]
    pub name: String,

    /// Tool arguments as a JSON object
    #[arg(long = "args", value_name = "JSON", default_value = "{}")]
    pub arguments: String,
}
