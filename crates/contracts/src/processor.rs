//! Processor trait - the handler a batch is dispatched to
//!
//! Content extraction lives behind this trait. The dispatcher only decides
//! which processor gets which items, and hands it a stop signal to poll.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{ContractError, Descriptor, MultimodalSample, ProcessorError};

/// Cooperative cancellation flag polled by processors
///
/// Implementations must treat an unreadable flag as "stop".
pub trait StopSignal: Send + Sync {
    /// True when the run should terminate early
    fn should_stop(&self) -> bool;
}

/// A stop signal that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn should_stop(&self) -> bool {
        false
    }
}

/// Flattened per-type configuration handed to a processor
#[derive(Debug, Clone, Default)]
pub struct ProcessorConfig {
    /// Processor type this config belongs to
    pub processor: String,

    /// Free-form key/value settings
    pub custom: HashMap<String, Value>,

    /// Output root of the run, if persistence is enabled
    pub output_path: Option<PathBuf>,
}

impl ProcessorConfig {
    /// Create an empty config for `processor`
    pub fn new(processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            ..Default::default()
        }
    }

    /// Merge a list of single-key maps; later keys win
    pub fn from_entries(
        processor: impl Into<String>,
        entries: &[HashMap<String, Value>],
        output_path: Option<PathBuf>,
    ) -> Self {
        let custom = entries
            .iter()
            .flat_map(|entry| entry.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Self {
            processor: processor.into(),
            custom,
            output_path,
        }
    }

    /// Raw value lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.custom.get(key)
    }

    /// String value lookup
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.custom.get(key).and_then(Value::as_str)
    }

    /// Boolean value lookup with default
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.custom
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    /// Required value; missing keys are a configuration error naming the processor
    pub fn require(&self, key: &str) -> Result<&Value, ContractError> {
        self.custom.get(key).ok_or_else(|| {
            ContractError::processor_config(
                &self.processor,
                format!("missing required key '{key}'"),
            )
        })
    }
}

/// Content processor
///
/// Instances are created once per processor type per run and shared by
/// every batch of that type, possibly from several worker threads.
pub trait Processor: Send + Sync {
    /// Processor type name
    fn name(&self) -> &str;

    /// Process a single item
    ///
    /// # Errors
    /// Returns a per-item error; the batch continues with a placeholder.
    fn process_one(
        &self,
        item: &Descriptor,
        fast: bool,
    ) -> Result<MultimodalSample, ProcessorError>;

    /// Process a batch, polling `stop` before each item
    ///
    /// Returns the samples produced before a stop was observed.
    fn process_batch(
        &self,
        items: &[Descriptor],
        fast: bool,
        stop: &dyn StopSignal,
    ) -> Vec<MultimodalSample> {
        let mut samples = Vec::with_capacity(items.len());

        for (idx, item) in items.iter().enumerate() {
            if stop.should_stop() {
                info!(
                    processor = self.name(),
                    processed = idx,
                    remaining = items.len() - idx,
                    "Stop requested, abandoning batch"
                );
                break;
            }

            debug!(processor = self.name(), item = %item, fast, "Processing item");
            match self.process_one(item, fast) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    warn!(processor = self.name(), item = %item, error = %e, "Item failed");
                    samples.push(MultimodalSample::placeholder(item.source()));
                }
            }
        }

        samples
    }
}
