//! DispatchEngine - runs planned tasks and streams their reports
//!
//! A task is "process the batch, then persist the samples". The body runs
//! on a blocking thread (local modes) or as a cluster job (distributed), so
//! sink appends from different tasks really are concurrent.
//!
//! - `Sequential`: nothing runs until the caller asks for the next report.
//! - `Pool`: every task is started up front, at most `workers` at a time;
//!   reports arrive in completion order.
//! - `Distributed`: every task is submitted to the cluster; reports arrive
//!   in completion order and a failed job only fails its own task.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{Descriptor, MultimodalSample, Processor, ProcessorId, ResultSink};
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::cluster::{ClusterClient, ClusterJob};
use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::planner::Task;
use crate::state::ExecutionState;

/// How tasks are executed for one run
#[derive(Clone)]
pub enum ExecutionMode {
    /// One task at a time, driven by the consumer
    Sequential,
    /// Bounded local worker pool
    Pool { workers: usize },
    /// Cluster scheduler
    Distributed(Arc<dyn ClusterClient>),
}

impl ExecutionMode {
    /// Local mode for a configured worker count
    ///
    /// Never exceeds the machine's available parallelism.
    pub fn local(workers: usize) -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        match workers.min(available) {
            0 | 1 => Self::Sequential,
            workers => Self::Pool { workers },
        }
    }

    pub fn is_distributed(&self) -> bool {
        matches!(self, Self::Distributed(_))
    }
}

impl std::fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "Sequential"),
            Self::Pool { workers } => write!(f, "Pool({workers})"),
            Self::Distributed(cluster) => write!(f, "Distributed({})", cluster.address()),
        }
    }
}

/// Outcome of one task
#[derive(Debug)]
pub struct TaskReport {
    pub task_id: usize,
    pub processor: ProcessorId,
    pub item_count: usize,
    pub cost: u64,
    /// Time from start (or submission) to completion
    pub elapsed: Duration,
    pub outcome: Result<Vec<MultimodalSample>, DispatchError>,
}

impl TaskReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Samples of a successful task, empty otherwise
    pub fn samples(&self) -> &[MultimodalSample] {
        self.outcome.as_deref().unwrap_or(&[])
    }
}

/// Task header carried alongside the work
#[derive(Debug, Clone)]
struct TaskMeta {
    task_id: usize,
    processor: ProcessorId,
    item_count: usize,
    cost: u64,
}

/// A task bound to its processor instance
struct PreparedTask {
    meta: TaskMeta,
    items: Vec<Descriptor>,
    processor: Arc<dyn Processor>,
}

/// State shared by every task body
struct TaskRunner {
    sink: Arc<dyn ResultSink>,
    state: Arc<ExecutionState>,
    metrics: Arc<DispatchMetrics>,
    use_fast: bool,
}

impl TaskRunner {
    #[instrument(
        name = "engine_run_task",
        skip_all,
        fields(
            task_id = task.meta.task_id,
            processor = %task.meta.processor,
            items = task.meta.item_count,
            cost = task.meta.cost
        )
    )]
    fn run(&self, task: PreparedTask) -> Vec<MultimodalSample> {
        let samples = task
            .processor
            .process_batch(&task.items, self.use_fast, &*self.state);

        if samples.is_empty() {
            debug!("no samples produced, nothing to persist");
            return samples;
        }

        if let Err(e) = self.sink.persist(&task.meta.processor, &samples) {
            error!(sink = self.sink.name(), error = %e, "failed to persist task results");
            self.metrics.inc_persist_failures();
            observability::record_persist_failure(&task.meta.processor);
        }

        samples
    }

    fn report(
        &self,
        meta: TaskMeta,
        elapsed: Duration,
        outcome: Result<Vec<MultimodalSample>, DispatchError>,
    ) -> TaskReport {
        match &outcome {
            Ok(samples) => {
                self.metrics.inc_task_completed(samples.len());
                debug!(task_id = meta.task_id, processor = %meta.processor, samples = samples.len(), "task finished");
            }
            Err(e) => {
                self.metrics.inc_task_failed();
                warn!(task_id = meta.task_id, processor = %meta.processor, error = %e, "task failed");
            }
        }
        observability::record_task_finished(
            &meta.processor,
            outcome.is_ok(),
            elapsed.as_secs_f64() * 1000.0,
        );

        TaskReport {
            task_id: meta.task_id,
            processor: meta.processor,
            item_count: meta.item_count,
            cost: meta.cost,
            elapsed,
            outcome,
        }
    }
}

/// Run a task on the blocking pool and build its report
async fn run_local(runner: Arc<TaskRunner>, task: PreparedTask) -> TaskReport {
    let meta = task.meta.clone();
    let started = Instant::now();
    let body = Arc::clone(&runner);
    let outcome = tokio::task::spawn_blocking(move || body.run(task))
        .await
        .map_err(|e| DispatchError::LocalTask {
            task_id: meta.task_id,
            processor: meta.processor.to_string(),
            message: e.to_string(),
        });
    runner.report(meta, started.elapsed(), outcome)
}

/// Executes planned tasks
pub struct DispatchEngine {
    runner: Arc<TaskRunner>,
    processors: HashMap<ProcessorId, Arc<dyn Processor>>,
}

impl DispatchEngine {
    /// Engine over already instantiated processors
    pub fn new(
        processors: HashMap<ProcessorId, Arc<dyn Processor>>,
        sink: Arc<dyn ResultSink>,
        state: Arc<ExecutionState>,
        metrics: Arc<DispatchMetrics>,
        use_fast: bool,
    ) -> Self {
        Self {
            runner: Arc::new(TaskRunner {
                sink,
                state,
                metrics,
                use_fast,
            }),
            processors,
        }
    }

    fn prepare(&self, tasks: Vec<Task>) -> Result<Vec<PreparedTask>, DispatchError> {
        tasks
            .into_iter()
            .map(|task| {
                let processor = self.processors.get(&task.processor).cloned().ok_or_else(|| {
                    DispatchError::processor_configuration(
                        task.processor.as_str(),
                        "processor was not instantiated",
                    )
                })?;
                Ok(PreparedTask {
                    meta: TaskMeta {
                        task_id: task.task_id,
                        processor: task.processor,
                        item_count: task.items.len(),
                        cost: task.cost,
                    },
                    items: task.items,
                    processor,
                })
            })
            .collect()
    }

    /// Start executing `tasks`
    ///
    /// Must be called from within a tokio runtime. Every task is bound to
    /// its processor before anything runs.
    #[instrument(name = "engine_execute", skip_all, fields(tasks = tasks.len(), mode = ?mode))]
    pub fn execute(
        self,
        tasks: Vec<Task>,
        mode: ExecutionMode,
    ) -> Result<DispatchResults, DispatchError> {
        let prepared = self.prepare(tasks)?;
        let total = prepared.len();
        info!(tasks = total, "dispatching");

        let inner = match mode {
            ExecutionMode::Sequential => ResultsInner::Sequential {
                pending: prepared.into(),
                runner: self.runner,
            },
            ExecutionMode::Pool { workers } => {
                ResultsInner::Channel(spawn_pool(self.runner, prepared, workers))
            }
            ExecutionMode::Distributed(cluster) => {
                ResultsInner::Channel(submit_all(self.runner, prepared, cluster.as_ref()))
            }
        };

        Ok(DispatchResults {
            inner,
            total,
            yielded: 0,
        })
    }
}

fn spawn_pool(
    runner: Arc<TaskRunner>,
    tasks: Vec<PreparedTask>,
    workers: usize,
) -> mpsc::Receiver<TaskReport> {
    let (tx, rx) = mpsc::channel(tasks.len().max(1));
    let slots = Arc::new(Semaphore::new(workers.max(1)));

    for task in tasks {
        let runner = Arc::clone(&runner);
        let slots = Arc::clone(&slots);
        let tx = tx.clone();
        tokio::spawn(async move {
            let Ok(_permit) = slots.acquire_owned().await else {
                return;
            };
            let report = run_local(runner, task).await;
            // Receiver dropped means the caller stopped consuming
            let _ = tx.send(report).await;
        });
    }

    rx
}

fn submit_all(
    runner: Arc<TaskRunner>,
    tasks: Vec<PreparedTask>,
    cluster: &dyn ClusterClient,
) -> mpsc::Receiver<TaskReport> {
    let (tx, rx) = mpsc::channel(tasks.len().max(1));

    for task in tasks {
        let meta = task.meta.clone();
        let key = format!("{}-{}", meta.processor, meta.task_id);
        let body = Arc::clone(&runner);
        let job: ClusterJob = Box::new(move || body.run(task));

        debug!(job = %key, items = meta.item_count, "submitting task");
        let started = Instant::now();
        let handle = cluster.submit(key, job);

        let runner = Arc::clone(&runner);
        let tx = tx.clone();
        tokio::spawn(async move {
            let outcome = match handle.await {
                Ok(Ok(samples)) => Ok(samples),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err("scheduler dropped the job".to_string()),
            }
            .map_err(|message| DispatchError::RemoteTask {
                task_id: meta.task_id,
                processor: meta.processor.to_string(),
                message,
            });
            let report = runner.report(meta, started.elapsed(), outcome);
            let _ = tx.send(report).await;
        });
    }

    rx
}

enum ResultsInner {
    Sequential {
        pending: VecDeque<PreparedTask>,
        runner: Arc<TaskRunner>,
    },
    Channel(mpsc::Receiver<TaskReport>),
}

/// Lazy, finite stream of task reports
///
/// Yields exactly one report per planned task, then `None`.
pub struct DispatchResults {
    inner: ResultsInner,
    total: usize,
    yielded: usize,
}

impl DispatchResults {
    /// Number of tasks in this run
    pub fn total_tasks(&self) -> usize {
        self.total
    }

    /// Reports not yet yielded
    pub fn remaining(&self) -> usize {
        self.total - self.yielded
    }

    /// Next finished task
    pub async fn next(&mut self) -> Option<TaskReport> {
        let report = match &mut self.inner {
            ResultsInner::Sequential { pending, runner } => {
                let task = pending.pop_front()?;
                run_local(Arc::clone(runner), task).await
            }
            ResultsInner::Channel(rx) => rx.recv().await?,
        };
        self.yielded += 1;
        Some(report)
    }

    /// Drain every remaining report
    pub async fn collect(mut self) -> Vec<TaskReport> {
        let mut reports = Vec::with_capacity(self.remaining());
        while let Some(report) = self.next().await {
            reports.push(report);
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterFaults, InProcessCluster};
    use crate::sinks::JsonlSink;
    use contracts::{ContractError, FileDescriptor, ProcessorError};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Emits one sample per item, counting calls
    struct Echo {
        calls: AtomicUsize,
    }

    impl Processor for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn process_one(
            &self,
            item: &Descriptor,
            _fast: bool,
        ) -> Result<MultimodalSample, ProcessorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(MultimodalSample::new(vec![item.source()], vec![], item.source()))
        }
    }

    struct Panics;

    impl Processor for Panics {
        fn name(&self) -> &str {
            "Panics"
        }

        fn process_one(
            &self,
            _item: &Descriptor,
            _fast: bool,
        ) -> Result<MultimodalSample, ProcessorError> {
            panic!("processor bug")
        }
    }

    /// Records persisted batches
    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<(String, usize)>>,
        fail: bool,
    }

    impl ResultSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn persist(
            &self,
            processor: &ProcessorId,
            samples: &[MultimodalSample],
        ) -> Result<(), ContractError> {
            if self.fail {
                return Err(ContractError::sink_write("recording", "disk full"));
            }
            self.batches
                .lock()
                .unwrap()
                .push((processor.to_string(), samples.len()));
            Ok(())
        }
    }

    fn tasks(processor: &str, sizes: &[usize]) -> Vec<Task> {
        sizes
            .iter()
            .enumerate()
            .map(|(task_id, &n)| Task {
                task_id,
                processor: ProcessorId::new(processor),
                items: (0..n)
                    .map(|i| FileDescriptor::new(format!("/in/{task_id}-{i}.txt")).into())
                    .collect(),
                cost: n as u64,
            })
            .collect()
    }

    fn local_state() -> Arc<ExecutionState> {
        let state = Arc::new(ExecutionState::new());
        state.initialize(false, None).unwrap();
        state
    }

    fn engine_with(
        processor: Arc<dyn Processor>,
        sink: Arc<dyn ResultSink>,
        state: Arc<ExecutionState>,
    ) -> (DispatchEngine, Arc<DispatchMetrics>) {
        let metrics = Arc::new(DispatchMetrics::new());
        let mut processors = HashMap::new();
        processors.insert(ProcessorId::new(processor.name()), processor);
        (
            DispatchEngine::new(processors, sink, state, Arc::clone(&metrics), true),
            metrics,
        )
    }

    fn echo() -> Arc<Echo> {
        Arc::new(Echo {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_sequential_is_lazy() {
        let processor = echo();
        let sink = Arc::new(RecordingSink::default());
        let (engine, _) = engine_with(processor.clone(), sink.clone(), local_state());

        let mut results = engine
            .execute(tasks("Echo", &[2, 3]), ExecutionMode::Sequential)
            .unwrap();
        assert_eq!(results.total_tasks(), 2);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);

        let first = results.next().await.unwrap();
        assert_eq!(first.task_id, 0);
        assert_eq!(first.samples().len(), 2);
        assert_eq!(processor.calls.load(Ordering::SeqCst), 2);

        let second = results.next().await.unwrap();
        assert_eq!(second.task_id, 1);
        assert!(results.next().await.is_none());
        assert_eq!(
            *sink.batches.lock().unwrap(),
            vec![("Echo".to_string(), 2), ("Echo".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_zero_tasks_in_every_mode() {
        let cluster = InProcessCluster::start("inproc://empty", 2).unwrap();
        let modes = [
            ExecutionMode::Sequential,
            ExecutionMode::Pool { workers: 4 },
            ExecutionMode::Distributed(Arc::new(cluster)),
        ];
        for mode in modes {
            let (engine, _) = engine_with(echo(), Arc::new(RecordingSink::default()), local_state());
            let results = engine.execute(Vec::new(), mode).unwrap();
            assert!(results.collect().await.is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_reports_every_task() {
        let (engine, metrics) =
            engine_with(echo(), Arc::new(RecordingSink::default()), local_state());
        let reports = engine
            .execute(tasks("Echo", &[1, 2, 3, 4, 5]), ExecutionMode::Pool { workers: 3 })
            .unwrap()
            .collect()
            .await;

        let mut ids: Vec<_> = reports.iter().map(|r| r.task_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(metrics.snapshot().samples_produced, 15);
        assert_eq!(metrics.snapshot().tasks_completed, 5);
    }

    #[tokio::test]
    async fn test_panicking_processor_fails_only_its_task() {
        let (engine, metrics) =
            engine_with(Arc::new(Panics), Arc::new(RecordingSink::default()), local_state());
        let reports = engine
            .execute(tasks("Panics", &[1]), ExecutionMode::Sequential)
            .unwrap()
            .collect()
            .await;

        assert!(matches!(
            reports[0].outcome,
            Err(DispatchError::LocalTask { task_id: 0, .. })
        ));
        assert_eq!(metrics.tasks_failed(), 1);
    }

    #[tokio::test]
    async fn test_persist_failure_still_yields_samples() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let (engine, metrics) = engine_with(echo(), sink, local_state());
        let reports = engine
            .execute(tasks("Echo", &[2]), ExecutionMode::Sequential)
            .unwrap()
            .collect()
            .await;

        assert_eq!(reports[0].samples().len(), 2);
        assert_eq!(metrics.persist_failures(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_run_produces_nothing() {
        let state = local_state();
        let sink = Arc::new(RecordingSink::default());
        let (engine, _) = engine_with(echo(), sink.clone(), Arc::clone(&state));

        let mut results = engine
            .execute(tasks("Echo", &[3, 3]), ExecutionMode::Sequential)
            .unwrap();
        state.request_stop().unwrap();

        while let Some(report) = results.next().await {
            assert!(report.is_success());
            assert!(report.samples().is_empty());
        }
        assert!(sink.batches.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_distributed_failure_is_per_task() {
        let dir = tempdir().unwrap();
        let cluster = InProcessCluster::start("inproc://engine", 2)
            .unwrap()
            .with_faults(ClusterFaults {
                fail_jobs: vec!["Echo-1".into()],
            });
        let cluster: Arc<dyn ClusterClient> = Arc::new(cluster);

        let state = Arc::new(ExecutionState::new());
        state.initialize(true, Some(cluster.as_ref())).unwrap();
        let sink = Arc::new(JsonlSink::new(Some(dir.path().to_path_buf())));
        let (engine, metrics) = engine_with(echo(), sink, state);

        let reports = engine
            .execute(tasks("Echo", &[2, 2, 2]), ExecutionMode::Distributed(cluster))
            .unwrap()
            .collect()
            .await;

        assert_eq!(reports.len(), 3);
        let failed: Vec<_> = reports.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].task_id, 1);
        assert!(matches!(
            failed[0].outcome,
            Err(DispatchError::RemoteTask { .. })
        ));
        assert_eq!(metrics.tasks_completed(), 2);

        let written = std::fs::read_to_string(dir.path().join("processors/Echo/results.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_unknown_processor_rejected_before_running() {
        let (engine, _) = engine_with(echo(), Arc::new(RecordingSink::default()), local_state());
        let err = engine
            .execute(tasks("Missing", &[1]), ExecutionMode::Sequential)
            .err()
            .unwrap();
        assert!(err.to_string().contains("Missing"));
    }

    #[test]
    fn test_local_mode_selection() {
        assert!(matches!(ExecutionMode::local(1), ExecutionMode::Sequential));
        assert!(matches!(ExecutionMode::local(0), ExecutionMode::Sequential));
        assert!(!ExecutionMode::local(64).is_distributed());
    }
}
