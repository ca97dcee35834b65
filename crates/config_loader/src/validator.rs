//! Configuration validation
//!
//! Rules:
//! - batch_multiplier >= 1
//! - process_batch_sizes entries are single-key maps with capacity >= 1
//! - processor settings are lists of single-key maps
//! - distributed mode names a scheduler file
//! - local_workers >= 1
//!
//! Checks that need the processor registry run in the dispatcher.

use contracts::{ContractError, DispatchConfig};

/// Validate a DispatchConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &DispatchConfig) -> Result<(), ContractError> {
    validate_batch_multiplier(config)?;
    validate_batch_sizes(config)?;
    validate_processor_settings(config)?;
    validate_execution_mode(config)?;
    validate_fallback(config)?;
    Ok(())
}

fn validate_batch_multiplier(config: &DispatchConfig) -> Result<(), ContractError> {
    if config.batch_multiplier == 0 {
        return Err(ContractError::config_validation(
            "batch_multiplier",
            "batch_multiplier must be >= 1",
        ));
    }
    Ok(())
}

fn validate_batch_sizes(config: &DispatchConfig) -> Result<(), ContractError> {
    for (idx, entry) in config.process_batch_sizes.iter().enumerate() {
        if entry.len() != 1 {
            return Err(ContractError::config_validation(
                format!("process_batch_sizes[{idx}]"),
                format!("expected exactly one processor per entry, got {}", entry.len()),
            ));
        }
        for (name, size) in entry {
            if *size == 0 {
                return Err(ContractError::config_validation(
                    format!("process_batch_sizes[{idx}].{name}"),
                    "batch size must be >= 1",
                ));
            }
        }
    }
    Ok(())
}

fn validate_processor_settings(config: &DispatchConfig) -> Result<(), ContractError> {
    for (processor, entries) in &config.processor_config {
        for (idx, entry) in entries.iter().enumerate() {
            if entry.len() != 1 {
                return Err(ContractError::config_validation(
                    format!("processor.{processor}[{idx}]"),
                    format!("expected exactly one key per entry, got {}", entry.len()),
                ));
            }
        }
    }
    Ok(())
}

fn validate_execution_mode(config: &DispatchConfig) -> Result<(), ContractError> {
    if config.distributed && config.scheduler_file.is_none() {
        return Err(ContractError::config_validation(
            "scheduler_file",
            "scheduler_file is required when distributed = true",
        ));
    }
    if config.local_workers == 0 {
        return Err(ContractError::config_validation(
            "local_workers",
            "local_workers must be >= 1",
        ));
    }
    Ok(())
}

fn validate_fallback(config: &DispatchConfig) -> Result<(), ContractError> {
    if let Some(fallback) = &config.fallback_processor {
        if fallback.is_empty() {
            return Err(ContractError::config_validation(
                "fallback_processor",
                "fallback_processor cannot be empty",
            ));
        }
    }
    Ok(())
}
