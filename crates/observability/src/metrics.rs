//! Dispatch metrics
//!
//! Prometheus recorders for routing, planning and task execution, plus an
//! in-memory aggregator used for end-of-run summaries.

use std::collections::BTreeMap;

use metrics::{counter, histogram};

/// Record items routed to a processor type
pub fn record_items_routed(processor: &str, count: usize) {
    counter!(
        "file_dispatch_items_routed_total",
        "processor" => processor.to_string()
    )
    .increment(count as u64);
}

/// Record an item no processor accepted
pub fn record_item_unrouted() {
    counter!("file_dispatch_items_unrouted_total").increment(1);
}

/// Record one planned batch and its aggregate cost
pub fn record_batch_planned(processor: &str, cost: u64) {
    counter!(
        "file_dispatch_batches_planned_total",
        "processor" => processor.to_string()
    )
    .increment(1);
    histogram!(
        "file_dispatch_batch_cost",
        "processor" => processor.to_string()
    )
    .record(cost as f64);
}

/// Record a finished task
pub fn record_task_finished(processor: &str, success: bool, duration_ms: f64) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "file_dispatch_tasks_total",
        "processor" => processor.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "file_dispatch_task_duration_ms",
        "processor" => processor.to_string()
    )
    .record(duration_ms);
}

/// Record a failed result write
pub fn record_persist_failure(processor: &str) {
    counter!(
        "file_dispatch_persist_failures_total",
        "processor" => processor.to_string()
    )
    .increment(1);
}

/// Per-run task aggregator
#[derive(Debug, Clone, Default)]
pub struct DispatchAggregator {
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub samples: u64,
    pub cost_stats: RunningStats,
    pub duration_stats: RunningStats,
    pub per_processor: BTreeMap<String, ProcessorTally>,
}

/// Task counts for one processor type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorTally {
    pub tasks: u64,
    pub failed: u64,
    pub samples: u64,
}

impl DispatchAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one task outcome into the totals
    pub fn update(
        &mut self,
        processor: &str,
        cost: u64,
        samples: Option<usize>,
        duration_ms: Option<f64>,
    ) {
        let tally = self.per_processor.entry(processor.to_string()).or_default();
        tally.tasks += 1;
        match samples {
            Some(n) => {
                self.tasks_succeeded += 1;
                self.samples += n as u64;
                tally.samples += n as u64;
            }
            None => {
                self.tasks_failed += 1;
                tally.failed += 1;
            }
        }

        self.cost_stats.push(cost as f64);
        if let Some(ms) = duration_ms {
            self.duration_stats.push(ms);
        }
    }

    pub fn summary(&self) -> DispatchSummary {
        let total = self.tasks_succeeded + self.tasks_failed;
        DispatchSummary {
            tasks_total: total,
            tasks_failed: self.tasks_failed,
            samples: self.samples,
            failure_rate: if total > 0 {
                self.tasks_failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            batch_cost: StatsSummary::from(&self.cost_stats),
            task_duration_ms: StatsSummary::from(&self.duration_stats),
            per_processor: self.per_processor.clone(),
        }
    }
}

/// End-of-run report
#[derive(Debug, Clone, Default)]
pub struct DispatchSummary {
    pub tasks_total: u64,
    pub tasks_failed: u64,
    pub samples: u64,
    pub failure_rate: f64,
    pub batch_cost: StatsSummary,
    pub task_duration_ms: StatsSummary,
    pub per_processor: BTreeMap<String, ProcessorTally>,
}

impl std::fmt::Display for DispatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Dispatch Summary ===")?;
        writeln!(
            f,
            "Tasks: {} ({} failed, {:.2}%)",
            self.tasks_total, self.tasks_failed, self.failure_rate
        )?;
        writeln!(f, "Samples: {}", self.samples)?;
        writeln!(f, "Batch cost: {}", self.batch_cost)?;
        writeln!(f, "Task duration (ms): {}", self.task_duration_ms)?;

        if !self.per_processor.is_empty() {
            writeln!(f, "Per processor:")?;
            for (processor, tally) in &self.per_processor {
                writeln!(
                    f,
                    "  {}: tasks={}, failed={}, samples={}",
                    processor, tally.tasks, tally.failed, tally.samples
                )?;
            }
        }

        Ok(())
    }
}

/// Summary statistics
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean / variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.mean }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
