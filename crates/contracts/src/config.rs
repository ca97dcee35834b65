//! DispatchConfig - Config Loader output
//!
//! Execution mode, persistence root, per-type processor settings and batch capacities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Base batch capacity for processor types without an explicit entry
pub const DEFAULT_BATCH_CAPACITY: u64 = 100;

/// What the batch planner does with items whose cost is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnsizedPolicy {
    /// Each unsized item gets a batch of its own
    #[default]
    Isolate,
    /// Unsized items are left out of every batch (logged)
    Skip,
}

/// Complete dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Let processors take their faster, lower-fidelity path
    #[serde(default = "default_true")]
    pub use_fast_processors: bool,

    /// Submit tasks to the cluster scheduler instead of running locally
    #[serde(default)]
    pub distributed: bool,

    /// Scheduler connection descriptor (required when distributed)
    #[serde(default)]
    pub scheduler_file: Option<PathBuf>,

    /// Root for per-processor results; `None` disables persistence
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    /// Processor type -> list of single-key settings
    #[serde(default, rename = "processor")]
    pub processor_config: HashMap<String, Vec<HashMap<String, Value>>>,

    /// List of single-key `{ ProcessorType: capacity }` entries
    #[serde(default)]
    pub process_batch_sizes: Vec<HashMap<String, u64>>,

    /// Uniform multiplier for every base capacity
    #[serde(default = "default_batch_multiplier")]
    pub batch_multiplier: u64,

    /// Local worker pool size (1 = sequential)
    #[serde(default = "default_local_workers")]
    pub local_workers: usize,

    /// Treatment of items with unknown cost
    #[serde(default)]
    pub unsized_policy: UnsizedPolicy,

    /// Processor type receiving files no predicate accepts
    #[serde(default)]
    pub fallback_processor: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_batch_multiplier() -> u64 {
    1
}

fn default_local_workers() -> usize {
    1
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            use_fast_processors: true,
            distributed: false,
            scheduler_file: None,
            output_path: None,
            processor_config: HashMap::new(),
            process_batch_sizes: Vec::new(),
            batch_multiplier: default_batch_multiplier(),
            local_workers: default_local_workers(),
            unsized_policy: UnsizedPolicy::default(),
            fallback_processor: None,
        }
    }
}

impl DispatchConfig {
    /// Base capacities flattened into one map
    pub fn base_capacities(&self) -> HashMap<&str, u64> {
        self.process_batch_sizes
            .iter()
            .flat_map(|entry| entry.iter())
            .map(|(name, size)| (name.as_str(), *size))
            .collect()
    }

    /// Effective capacity `C` for a processor type
    pub fn capacity_for(&self, processor: &str) -> u64 {
        let base = self
            .base_capacities()
            .get(processor)
            .copied()
            .unwrap_or(DEFAULT_BATCH_CAPACITY);
        self.batch_multiplier.saturating_mul(base)
    }

    /// Raw settings list for a processor type
    pub fn processor_entries(&self, processor: &str) -> &[HashMap<String, Value>] {
        self.processor_config
            .get(processor)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
