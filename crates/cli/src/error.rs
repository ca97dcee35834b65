//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be loaded or is invalid
    #[error("Failed to load configuration: {0}")]
    Config(#[from] contracts::ContractError),

    /// Input directory missing
    #[error("Input path not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    /// Dispatch could not start
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] dispatcher::DispatchError),

    /// Some tasks failed
    #[error("{failed} of {total} tasks failed")]
    TasksFailed { failed: u64, total: u64 },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn input_not_found(path: impl Into<PathBuf>) -> Self {
        Self::InputNotFound { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            CliError::config_not_found("dispatch.toml").to_string(),
            "Configuration file not found: dispatch.toml"
        );
        assert_eq!(
            CliError::TasksFailed { failed: 1, total: 3 }.to_string(),
            "1 of 3 tasks failed"
        );
    }
}
