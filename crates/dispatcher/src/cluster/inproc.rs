//! In-process scheduler
//!
//! Jobs run on the tokio blocking pool, at most `workers` at a time.
//! Shared variables live in the scheduler and are visible to every job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, instrument, warn};

use super::{ClusterClient, ClusterJob, JobHandle, SchedulerFile, SharedFlag};
use crate::error::ClusterError;

type Variables = Arc<Mutex<HashMap<String, bool>>>;

/// Fault injection for tests
#[derive(Debug, Default, Clone)]
pub struct ClusterFaults {
    /// Job keys that fail instead of running
    pub fail_jobs: Vec<String>,
}

/// Scheduler running jobs inside the current process
pub struct InProcessCluster {
    address: String,
    workers: usize,
    slots: Arc<Semaphore>,
    variables: Variables,
    faults: ClusterFaults,
    runtime: Handle,
}

impl InProcessCluster {
    /// Connect using a scheduler file
    ///
    /// Only `inproc://` addresses are served.
    pub fn connect(file: &SchedulerFile) -> Result<Self, ClusterError> {
        match file.inproc_name() {
            Some(_) => Self::start(&file.address, file.workers),
            None => Err(ClusterError::Connection {
                address: file.address.clone(),
                message: "unsupported scheduler scheme".into(),
            }),
        }
    }

    /// Start a scheduler with `workers` slots on the current runtime
    #[instrument(name = "cluster_start", skip(address), fields(address = %address.as_ref()))]
    pub fn start(address: impl AsRef<str>, workers: usize) -> Result<Self, ClusterError> {
        let address = address.as_ref().to_string();
        let runtime = Handle::try_current().map_err(|e| ClusterError::Connection {
            address: address.clone(),
            message: e.to_string(),
        })?;
        let workers = workers.max(1);

        debug!(workers, "in-process scheduler started");
        Ok(Self {
            address,
            workers,
            slots: Arc::new(Semaphore::new(workers)),
            variables: Arc::new(Mutex::new(HashMap::new())),
            faults: ClusterFaults::default(),
            runtime,
        })
    }

    /// Install fault injection
    pub fn with_faults(mut self, faults: ClusterFaults) -> Self {
        self.faults = faults;
        self
    }

    /// Remove a shared variable, as if the scheduler lost it
    pub fn drop_variable(&self, name: &str) {
        if let Ok(mut vars) = self.variables.lock() {
            vars.remove(name);
        }
    }
}

impl ClusterClient for InProcessCluster {
    fn address(&self) -> &str {
        &self.address
    }

    fn submit(&self, key: String, job: ClusterJob) -> JobHandle {
        let (tx, rx) = oneshot::channel();
        let slots = Arc::clone(&self.slots);
        let injected = self.faults.fail_jobs.contains(&key);

        self.runtime.spawn(async move {
            let result = match slots.acquire_owned().await {
                Err(_) => Err(ClusterError::Closed),
                Ok(_permit) if injected => {
                    warn!(job = %key, "injected job failure");
                    Err(ClusterError::JobFailed {
                        key,
                        message: "injected failure".into(),
                    })
                }
                Ok(_permit) => match tokio::task::spawn_blocking(job).await {
                    Ok(samples) => Ok(samples),
                    Err(e) => Err(ClusterError::JobFailed {
                        key,
                        message: e.to_string(),
                    }),
                },
            };
            // Receiver dropped means the caller stopped listening
            let _ = tx.send(result);
        });

        rx
    }

    fn shared_flag(&self, name: &str) -> Result<Arc<dyn SharedFlag>, ClusterError> {
        let mut vars = self.variables.lock().map_err(|_| ClusterError::Closed)?;
        vars.entry(name.to_string()).or_insert(false);

        Ok(Arc::new(InProcessFlag {
            name: name.to_string(),
            variables: Arc::clone(&self.variables),
        }))
    }

    fn worker_count(&self) -> usize {
        self.workers
    }
}

/// Handle to a scheduler-held boolean
struct InProcessFlag {
    name: String,
    variables: Variables,
}

impl InProcessFlag {
    fn missing(&self) -> ClusterError {
        ClusterError::VariableMissing {
            name: self.name.clone(),
        }
    }
}

impl SharedFlag for InProcessFlag {
    fn get(&self) -> Result<bool, ClusterError> {
        let vars = self.variables.lock().map_err(|_| ClusterError::Closed)?;
        vars.get(&self.name).copied().ok_or_else(|| self.missing())
    }

    fn set(&self, value: bool) -> Result<(), ClusterError> {
        let mut vars = self.variables.lock().map_err(|_| ClusterError::Closed)?;
        match vars.get_mut(&self.name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.missing()),
        }
    }
}
