//! Dispatcher - one dispatch run over a discovery result
//!
//! route -> plan -> instantiate processors -> execute. Configuration and
//! initialization problems surface before any task runs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use contracts::{
    ContractError, DispatchConfig, DispatcherReadyResult, Processor, ProcessorConfig, ProcessorId,
    ResultSink,
};
use processors::ProcessorRegistry;
use tracing::{info, instrument};

use crate::cluster::{ClusterClient, InProcessCluster, SchedulerFile};
use crate::engine::{DispatchEngine, DispatchResults, ExecutionMode};
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::planner::{BatchPlanner, Task};
use crate::router::{Buckets, CapabilityRouter};
use crate::sinks::JsonlSink;
use crate::state::ExecutionState;

/// Dispatch entry point
///
/// ```ignore
/// let dispatcher = Dispatcher::new(discovered, config);
/// let stop = dispatcher.execution_state();
/// let mut results = dispatcher.dispatch().await?;
/// while let Some(report) = results.next().await {
///     // ...
/// }
/// ```
pub struct Dispatcher {
    result: DispatcherReadyResult,
    config: DispatchConfig,
    registry: ProcessorRegistry,
    cluster: Option<Arc<dyn ClusterClient>>,
    sink: Option<Arc<dyn ResultSink>>,
    state: Arc<ExecutionState>,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    /// Dispatcher over the built-in processors
    pub fn new(result: DispatcherReadyResult, config: DispatchConfig) -> Self {
        Self {
            result,
            config,
            registry: ProcessorRegistry::builtin(),
            cluster: None,
            sink: None,
            state: Arc::new(ExecutionState::new()),
            metrics: Arc::new(DispatchMetrics::new()),
        }
    }

    pub fn with_registry(mut self, registry: ProcessorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use an established cluster connection instead of the scheduler file
    pub fn with_cluster(mut self, cluster: Arc<dyn ClusterClient>) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Replace the JSON-lines sink
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Stop flag of this run; initialized by [`Dispatcher::dispatch`]
    pub fn execution_state(&self) -> Arc<ExecutionState> {
        Arc::clone(&self.state)
    }

    pub fn metrics(&self) -> Arc<DispatchMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Check configuration against the registry
    ///
    /// Every processor type named in the configuration must be registered.
    pub fn validate(&self) -> Result<(), DispatchError> {
        let mut named: BTreeSet<&str> = self
            .config
            .processor_config
            .keys()
            .map(String::as_str)
            .collect();
        named.extend(self.config.base_capacities().into_keys());
        named.extend(self.config.fallback_processor.as_deref());

        if let Some(unknown) = named.into_iter().find(|name| !self.registry.contains(name)) {
            return Err(DispatchError::processor_configuration(
                unknown,
                "processor type is not registered",
            ));
        }

        if self.config.distributed && self.cluster.is_none() && self.config.scheduler_file.is_none()
        {
            return Err(DispatchError::configuration(
                "scheduler_file is required when distributed is enabled",
            ));
        }

        Ok(())
    }

    /// Route the discovery result into per-type buckets
    pub fn route(&self) -> Result<Buckets, DispatchError> {
        let mut router = CapabilityRouter::new(&self.registry);
        if let Some(fallback) = &self.config.fallback_processor {
            router = router.with_fallback(fallback)?;
        }
        Ok(router.route_result(&self.result))
    }

    /// Route and batch without executing anything
    pub fn plan(&self) -> Result<Vec<Task>, DispatchError> {
        self.validate()?;
        let buckets = self.route()?;
        Ok(BatchPlanner::new(&self.registry, &self.config).plan(&buckets))
    }

    fn instantiate(
        &self,
        tasks: &[Task],
    ) -> Result<HashMap<ProcessorId, Arc<dyn Processor>>, DispatchError> {
        let mut processors = HashMap::new();

        for task in tasks {
            if processors.contains_key(&task.processor) {
                continue;
            }
            let name = task.processor.as_str();
            let config = ProcessorConfig::from_entries(
                name,
                self.config.processor_entries(name),
                self.config.output_path.clone(),
            );
            let processor = self.registry.instantiate(name, &config).map_err(|e| match e {
                ContractError::ProcessorConfig { processor, message } => {
                    DispatchError::processor_configuration(processor, message)
                }
                other => DispatchError::processor_configuration(name, other.to_string()),
            })?;
            processors.insert(task.processor.clone(), processor);
        }

        Ok(processors)
    }

    fn connect_cluster(&self) -> Result<Arc<dyn ClusterClient>, DispatchError> {
        if let Some(cluster) = &self.cluster {
            return Ok(Arc::clone(cluster));
        }
        let path = self.config.scheduler_file.as_ref().ok_or_else(|| {
            DispatchError::configuration("scheduler_file is required when distributed is enabled")
        })?;
        let scheduler = SchedulerFile::load(path)
            .map_err(|e| DispatchError::configuration(e.to_string()))?;
        let cluster = InProcessCluster::connect(&scheduler)
            .map_err(|e| DispatchError::configuration(e.to_string()))?;
        info!(address = %scheduler.address, workers = scheduler.workers, "connected to scheduler");
        Ok(Arc::new(cluster))
    }

    /// Run the dispatch
    ///
    /// Must be awaited inside a tokio runtime. Returns once every task is
    /// planned and, outside sequential mode, submitted; reports are pulled
    /// from the returned stream.
    ///
    /// # Errors
    /// Configuration errors, processor instantiation errors and execution
    /// state initialization errors. Task failures are reported per task.
    #[instrument(
        name = "dispatcher_dispatch",
        skip_all,
        fields(distributed = self.config.distributed, items = self.result.len())
    )]
    pub async fn dispatch(self) -> Result<DispatchResults, DispatchError> {
        self.validate()?;

        let buckets = self.route()?;
        self.metrics.add_items_unrouted(buckets.unrouted().len());
        let tasks = BatchPlanner::new(&self.registry, &self.config).plan(&buckets);

        let processors = self.instantiate(&tasks)?;

        let mode = if self.config.distributed {
            ExecutionMode::Distributed(self.connect_cluster()?)
        } else {
            ExecutionMode::local(self.config.local_workers)
        };

        let cluster = match &mode {
            ExecutionMode::Distributed(cluster) => Some(cluster.as_ref()),
            _ => None,
        };
        self.state.initialize(self.config.distributed, cluster)?;

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(JsonlSink::new(self.config.output_path.clone())));

        info!(
            routed = buckets.routed_count(),
            unrouted = buckets.unrouted().len(),
            tasks = tasks.len(),
            mode = ?mode,
            "dispatch planned"
        );

        DispatchEngine::new(
            processors,
            sink,
            self.state,
            self.metrics,
            self.config.use_fast_processors,
        )
        .execute(tasks, mode)
    }
}
