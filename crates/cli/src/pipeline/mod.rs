//! Run preparation: configuration, discovery and statistics.

mod discovery;
mod stats;

pub use discovery::discover;
pub use stats::RunStats;

use contracts::DispatchConfig;
use tracing::info;

use crate::cli::InputArgs;
use crate::error::CliError;

/// Load the configuration named by `--config`, or defaults
pub fn load_config(input: &InputArgs) -> Result<DispatchConfig, CliError> {
    let mut config = match &input.config {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()));
            }
            info!(config = %path.display(), "Loading configuration");
            config_loader::ConfigLoader::load_from_path(path)?
        }
        None => {
            info!("No configuration file given, using defaults");
            DispatchConfig::default()
        }
    };

    if let Some(multiplier) = input.batch_multiplier {
        config.batch_multiplier = multiplier;
    }
    Ok(config)
}
