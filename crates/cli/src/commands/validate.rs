//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{DispatchConfig, DispatcherReadyResult};
use dispatcher::Dispatcher;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    mode: String,
    use_fast_processors: bool,
    output_path: Option<String>,
    batch_multiplier: u64,
    configured_processors: Vec<String>,
    batch_sizes: Vec<(String, u64)>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    let checked = config_loader::ConfigLoader::load_from_path(&args.config)
        .map_err(|e| e.to_string())
        .and_then(|config| check_registry(config).map_err(|e| e.to_string()));

    match checked {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&config)),
            }
        }
        Err(error) => ValidationResult {
            valid: false,
            config_path,
            error: Some(error),
            warnings: None,
            summary: None,
        },
    }
}

/// Check processor names against the built-in registry
fn check_registry(config: DispatchConfig) -> Result<DispatchConfig, dispatcher::DispatchError> {
    let dispatcher = Dispatcher::new(DispatcherReadyResult::new(), config);
    dispatcher.validate()?;
    Ok(dispatcher.config().clone())
}

fn summarize(config: &DispatchConfig) -> ConfigSummary {
    let mut configured_processors: Vec<_> = config.processor_config.keys().cloned().collect();
    configured_processors.sort();

    let mut batch_sizes: Vec<_> = config
        .base_capacities()
        .into_iter()
        .map(|(name, size)| (name.to_string(), size))
        .collect();
    batch_sizes.sort();

    ConfigSummary {
        mode: if config.distributed {
            "distributed".to_string()
        } else {
            format!("local ({} workers)", config.local_workers)
        },
        use_fast_processors: config.use_fast_processors,
        output_path: config.output_path.as_ref().map(|p| p.display().to_string()),
        batch_multiplier: config.batch_multiplier,
        configured_processors,
        batch_sizes,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &DispatchConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.output_path.is_none() {
        warnings.push("No output_path configured - results will not be persisted".to_string());
    }

    if config.distributed && config.local_workers > 1 {
        warnings.push("local_workers is ignored in distributed mode".to_string());
    }

    if config.process_batch_sizes.is_empty() {
        warnings.push(format!(
            "process_batch_sizes is empty - every processor uses capacity {}",
            contracts::DEFAULT_BATCH_CAPACITY * config.batch_multiplier
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Mode: {}", summary.mode);
            println!("  Fast processors: {}", summary.use_fast_processors);
            println!(
                "  Output: {}",
                summary.output_path.as_deref().unwrap_or("(disabled)")
            );
            println!("  Batch multiplier: {}", summary.batch_multiplier);
            for (name, size) in &summary.batch_sizes {
                println!("  Batch size {}: {}", name, size);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
