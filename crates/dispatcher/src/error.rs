//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Configuration is malformed or inconsistent with the registry
    #[error("configuration error{}: {message}", processor_suffix(.processor))]
    Configuration {
        processor: Option<String>,
        message: String,
    },

    /// A task failed on a remote worker
    #[error("task {task_id} ({processor}) failed remotely: {message}")]
    RemoteTask {
        task_id: usize,
        processor: String,
        message: String,
    },

    /// A task failed on the local worker pool
    #[error("task {task_id} ({processor}) failed locally: {message}")]
    LocalTask {
        task_id: usize,
        processor: String,
        message: String,
    },

    /// Execution state misuse
    #[error(transparent)]
    ExecutionState(#[from] ExecutionStateError),

    /// Cluster connection or scheduling failure
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// Contract-level error (registry, config, sink)
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

fn processor_suffix(processor: &Option<String>) -> String {
    processor
        .as_ref()
        .map(|p| format!(" for processor '{p}'"))
        .unwrap_or_default()
}

impl DispatchError {
    /// Configuration error not tied to a processor type
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            processor: None,
            message: message.into(),
        }
    }

    /// Configuration error naming the offending processor type
    pub fn processor_configuration(
        processor: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Configuration {
            processor: Some(processor.into()),
            message: message.into(),
        }
    }

    /// True for per-task failures that leave sibling tasks running
    pub fn is_task_failure(&self) -> bool {
        matches!(self, Self::RemoteTask { .. } | Self::LocalTask { .. })
    }
}

/// Execution state lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionStateError {
    /// `initialize` called on an already initialized state
    #[error("execution state already initialized")]
    AlreadyInitialized,

    /// `get`/`set` called before `initialize`
    #[error("execution state not initialized")]
    NotInitialized,

    /// Distributed mode requested without a cluster connection
    #[error("distributed execution state requires a cluster connection")]
    NoCluster,

    /// The cluster cell could not be written
    #[error("failed to update cluster execution state: {0}")]
    Cluster(String),
}

/// Cluster scheduler errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// Scheduler file missing, unreadable or malformed
    #[error("invalid scheduler file '{path}': {message}")]
    SchedulerFile { path: String, message: String },

    /// Scheduler could not be reached
    #[error("cannot connect to scheduler at '{address}': {message}")]
    Connection { address: String, message: String },

    /// Job raised or was lost on its worker
    #[error("job '{key}' failed: {message}")]
    JobFailed { key: String, message: String },

    /// Named shared variable missing on the scheduler
    #[error("shared variable '{name}' not found")]
    VariableMissing { name: String },

    /// Scheduler shut down
    #[error("scheduler closed")]
    Closed,
}
