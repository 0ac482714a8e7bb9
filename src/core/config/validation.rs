#![allow(clippy::result_large_err)]

use super::ServerConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Reject configurations the server cannot start with.
    pub fn validate(config: &ServerConfig) -> Result<(), AppError> {
        for (label, path) in [
            ("project_root", &config.project_root),
            ("working_directory", &config.working_directory),
            ("m42_path", &config.m42_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ConfigError,
                    format!("{} cannot be empty", label),
                )
                .with_code("CFG-001"));
            }
        }

        Ok(())
    }
}
