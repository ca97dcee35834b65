//! ExecutionState - per-run cooperative stop flag
//!
//! Created once per run and shared by handle with every worker. The backend
//! is chosen by `initialize`: an in-process atomic, or a named cell held by
//! the cluster scheduler. Cluster read failures count as "stop".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use contracts::StopSignal;
use tracing::{debug, instrument, warn};

use crate::cluster::{ClusterClient, SharedFlag};
use crate::error::ExecutionStateError;

/// Name of the cluster variable holding the flag
pub const EXECUTION_STATE_VARIABLE: &str = "file_dispatch_should_stop";

enum Backend {
    Local(AtomicBool),
    Cluster(Arc<dyn SharedFlag>),
}

/// Run-scoped stop flag
#[derive(Default)]
pub struct ExecutionState {
    backend: OnceLock<Backend>,
}

impl std::fmt::Debug for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend.get() {
            None => "uninitialized",
            Some(Backend::Local(_)) => "local",
            Some(Backend::Cluster(_)) => "cluster",
        };
        f.debug_struct("ExecutionState")
            .field("backend", &backend)
            .finish()
    }
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the backend for this run
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call, `NoCluster` when `distributed`
    /// is requested without a cluster connection.
    #[instrument(name = "execution_state_initialize", skip(self, cluster))]
    pub fn initialize(
        &self,
        distributed: bool,
        cluster: Option<&dyn ClusterClient>,
    ) -> Result<(), ExecutionStateError> {
        if self.backend.get().is_some() {
            return Err(ExecutionStateError::AlreadyInitialized);
        }

        let backend = if distributed {
            let cluster = cluster.ok_or(ExecutionStateError::NoCluster)?;
            let flag = cluster
                .shared_flag(EXECUTION_STATE_VARIABLE)
                .map_err(|e| ExecutionStateError::Cluster(e.to_string()))?;
            flag.set(false)
                .map_err(|e| ExecutionStateError::Cluster(e.to_string()))?;
            Backend::Cluster(flag)
        } else {
            Backend::Local(AtomicBool::new(false))
        };

        self.backend
            .set(backend)
            .map_err(|_| ExecutionStateError::AlreadyInitialized)?;
        debug!(distributed, "execution state initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.get().is_some()
    }

    /// Current flag value
    ///
    /// A failed cluster read returns `Ok(true)`.
    pub fn get(&self) -> Result<bool, ExecutionStateError> {
        match self.backend.get() {
            None => Err(ExecutionStateError::NotInitialized),
            Some(Backend::Local(flag)) => Ok(flag.load(Ordering::Acquire)),
            Some(Backend::Cluster(flag)) => match flag.get() {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!(error = %e, "cannot read cluster execution state, stopping");
                    Ok(true)
                }
            },
        }
    }

    /// Update the flag; last write wins
    pub fn set(&self, value: bool) -> Result<(), ExecutionStateError> {
        match self.backend.get() {
            None => Err(ExecutionStateError::NotInitialized),
            Some(Backend::Local(flag)) => {
                flag.store(value, Ordering::Release);
                Ok(())
            }
            Some(Backend::Cluster(flag)) => flag
                .set(value)
                .map_err(|e| ExecutionStateError::Cluster(e.to_string())),
        }
    }

    /// Ask every worker to stop at its next poll
    pub fn request_stop(&self) -> Result<(), ExecutionStateError> {
        self.set(true)
    }
}

impl StopSignal for ExecutionState {
    fn should_stop(&self) -> bool {
        self.get().unwrap_or(true)
    }
}
