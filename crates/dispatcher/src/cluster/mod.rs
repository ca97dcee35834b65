//! Cluster scheduler abstraction
//!
//! The engine submits each task as an independent job and observes the
//! shared stop flag through these traits. [`InProcessCluster`] is the
//! scheduler reachable through `inproc://` scheduler files.

mod inproc;

use std::path::Path;
use std::sync::Arc;

use contracts::MultimodalSample;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::ClusterError;

pub use inproc::{ClusterFaults, InProcessCluster};

/// Work shipped to a cluster worker
pub type ClusterJob = Box<dyn FnOnce() -> Vec<MultimodalSample> + Send + 'static>;

/// Completion handle of a submitted job
pub type JobHandle = oneshot::Receiver<Result<Vec<MultimodalSample>, ClusterError>>;

/// Connection to a cluster scheduler
pub trait ClusterClient: Send + Sync {
    /// Scheduler address
    fn address(&self) -> &str;

    /// Submit a job under `key`; the handle resolves when it finishes
    fn submit(&self, key: String, job: ClusterJob) -> JobHandle;

    /// Named boolean cell visible to every worker, created on first use
    fn shared_flag(&self, name: &str) -> Result<Arc<dyn SharedFlag>, ClusterError>;

    /// Number of workers jobs are spread over
    fn worker_count(&self) -> usize;
}

/// Cluster-visible boolean cell
pub trait SharedFlag: Send + Sync {
    fn get(&self) -> Result<bool, ClusterError>;
    fn set(&self, value: bool) -> Result<(), ClusterError>;
}

/// Scheduler connection descriptor
///
/// ```json
/// { "address": "inproc://local", "workers": 4 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerFile {
    pub address: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    1
}

impl SchedulerFile {
    /// Read and validate a scheduler file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClusterError> {
        let path = path.as_ref();
        let scheduler_file_error = |message: String| ClusterError::SchedulerFile {
            path: path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(path).map_err(|e| scheduler_file_error(e.to_string()))?;
        let file: SchedulerFile =
            serde_json::from_str(&content).map_err(|e| scheduler_file_error(e.to_string()))?;

        if file.workers == 0 {
            return Err(scheduler_file_error("workers must be at least 1".into()));
        }
        Ok(file)
    }

    /// Scheduler name for `inproc://` addresses
    pub fn inproc_name(&self) -> Option<&str> {
        self.address.strip_prefix("inproc://")
    }
}
