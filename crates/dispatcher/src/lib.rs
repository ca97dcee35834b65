//! # Dispatcher
//!
//! Routes discovered files and URLs to processor types, packs each type's
//! items into capacity-bounded batches and executes them locally or on a
//! cluster scheduler.
//!
//! - [`CapabilityRouter`]: descriptors -> per-type buckets
//! - [`BatchPlanner`]: buckets -> tasks (best-fit-decreasing)
//! - [`DispatchEngine`]: tasks -> lazily streamed [`TaskReport`]s
//! - [`ExecutionState`]: cooperative stop flag polled by processors
//! - [`JsonlSink`]: `<output>/processors/<Type>/results.jsonl`

pub mod cluster;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod planner;
pub mod router;
pub mod sinks;
pub mod state;

pub use cluster::{
    ClusterClient, ClusterFaults, ClusterJob, InProcessCluster, JobHandle, SchedulerFile,
    SharedFlag,
};
pub use dispatcher::Dispatcher;
pub use engine::{DispatchEngine, DispatchResults, ExecutionMode, TaskReport};
pub use error::{ClusterError, DispatchError, ExecutionStateError};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use planner::{BatchPlanner, Bin, Task, best_fit_decreasing};
pub use router::{Buckets, CapabilityRouter};
pub use sinks::{JsonlSink, RESULTS_FILE_NAME};
pub use state::{EXECUTION_STATE_VARIABLE, ExecutionState};
