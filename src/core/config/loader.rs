#![allow(clippy::result_large_err)]

use super::{
    parse_timeout, resolve_against, ConfigValidator, ServerConfig, ServerSettings,
    CONFIG_FILE_NAME,
};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub const ENV_PROJECT_ROOT: &str = "M42_PROJECT_ROOT";
pub const ENV_M42_PATH: &str = "M42_PATH";
pub const ENV_WORKING_DIRECTORY: &str = "M42_WORKING_DIRECTORY";
pub const ENV_DEFAULT_TIMEOUT: &str = "M42_DEFAULT_TIMEOUT";

/// Values given on the command line. They beat every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_root: Option<PathBuf>,
    pub m42_path: Option<PathBuf>,
    pub working_directory: Option<PathBuf>,
    pub timeout: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve the full configuration: defaults, then `m42-mcp.toml`, then
    /// environment, then `overrides`.
    ///
    /// The project root itself comes from the overrides, then
    /// `M42_PROJECT_ROOT`, then the current directory.
    pub fn load(overrides: &ConfigOverrides) -> Result<ServerConfig, AppError> {
        let project_root = match overrides
            .project_root
            .clone()
            .or_else(|| env::var_os(ENV_PROJECT_ROOT).map(PathBuf::from))
        {
            Some(root) => root,
            None => current_dir()?,
        };
        Self::load_from_root(&project_root, overrides)
    }

    pub fn load_from_root(
        project_root: &Path,
        overrides: &ConfigOverrides,
    ) -> Result<ServerConfig, AppError> {
        let project_root = if project_root.as_os_str().is_empty() || project_root.is_absolute() {
            project_root.to_path_buf()
        } else {
            current_dir()?.join(project_root)
        };

        let mut settings = Self::load_from_file(&project_root.join(CONFIG_FILE_NAME))?
            .unwrap_or_default();
        Self::apply_env_overrides(&mut settings);
        Self::apply_overrides(&mut settings, overrides);

        let config = Self::resolve(project_root, settings)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn load_from_file(path: &Path) -> Result<Option<ServerSettings>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let settings: ServerSettings = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("CFG-003")
        })?;

        Ok(Some(settings))
    }

    fn apply_env_overrides(settings: &mut ServerSettings) {
        if let Some(path) = env::var_os(ENV_M42_PATH) {
            settings.m42_path = Some(PathBuf::from(path));
        }

        if let Some(dir) = env::var_os(ENV_WORKING_DIRECTORY) {
            settings.working_directory = Some(PathBuf::from(dir));
        }

        if let Ok(timeout) = env::var(ENV_DEFAULT_TIMEOUT) {
            settings.default_timeout = Some(timeout);
        }
    }

    fn apply_overrides(settings: &mut ServerSettings, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.m42_path {
            settings.m42_path = Some(path.clone());
        }
        if let Some(dir) = &overrides.working_directory {
            settings.working_directory = Some(dir.clone());
        }
        if let Some(timeout) = &overrides.timeout {
            settings.default_timeout = Some(timeout.clone());
        }
    }

    fn resolve(project_root: PathBuf, settings: ServerSettings) -> Result<ServerConfig, AppError> {
        let mut config = ServerConfig::with_project_root(project_root);

        if let Some(dir) = settings.working_directory {
            config.working_directory = resolve_against(&config.project_root, dir);
        }
        if let Some(path) = settings.m42_path {
            config.m42_path = resolve_against(&config.project_root, path);
        }
        if let Some(raw) = settings.default_timeout {
            config.default_timeout = parse_timeout(&raw)?;
        }

        Ok(config)
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "M42_PROJECT_ROOT - Project root (default: current directory)",
            "M42_PATH - Path to the m42-dev executable (default: <project root>/m42-dev.sh)",
            "M42_WORKING_DIRECTORY - Directory commands run in (default: project root)",
            "M42_DEFAULT_TIMEOUT - Per-command timeout, e.g. 90s, 10m or plain milliseconds (default: 10m, 0 disables)",
        ]
    }
}

fn current_dir() -> Result<PathBuf, AppError> {
    env::current_dir().map_err(|e| {
        AppError::new(
            ErrorCategory::ConfigError,
            format!("Cannot determine current directory: {}", e),
        )
    })
}
