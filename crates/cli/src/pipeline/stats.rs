//! Run statistics.

use std::time::Duration;

use dispatcher::{MetricsSnapshot, TaskReport};
use observability::DispatchAggregator;

/// Statistics from a dispatch run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Files and URLs handed to the dispatcher
    pub items_discovered: usize,

    /// Tasks planned for the run
    pub tasks_planned: usize,

    /// Total duration of the run
    pub duration: Duration,

    /// Whether a stop was requested before all tasks finished
    pub stopped: bool,

    /// Dispatcher counters at the end of the run
    pub counters: MetricsSnapshot,

    /// Per-task aggregation
    pub tasks: DispatchAggregator,
}

impl RunStats {
    /// Fold one task report into the statistics
    pub fn record(&mut self, report: &TaskReport) {
        let samples = report.outcome.as_ref().ok().map(Vec::len);
        let duration_ms = samples.map(|_| report.elapsed.as_secs_f64() * 1000.0);
        self.tasks
            .update(&report.processor, report.cost, samples, duration_ms);
    }

    /// Samples per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.counters.samples_produced as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn failed_tasks(&self) -> u64 {
        self.tasks.tasks_failed
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Dispatch Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   Items discovered: {}", self.items_discovered);
        println!("   Items without processor: {}", self.counters.items_unrouted);
        println!("   Tasks planned: {}", self.tasks_planned);
        println!("   Samples: {}", self.counters.samples_produced);
        println!("   Samples/s: {:.2}", self.throughput());
        if self.counters.persist_failures > 0 {
            println!("   Persist failures: {}", self.counters.persist_failures);
        }
        if self.stopped {
            println!("   Stopped early: yes");
        }

        println!("\n{}", self.tasks.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MultimodalSample, ProcessorId};
    use dispatcher::DispatchError;

    fn report(task_id: usize, outcome: Result<Vec<MultimodalSample>, DispatchError>) -> TaskReport {
        TaskReport {
            task_id,
            processor: ProcessorId::new("TextProcessor"),
            item_count: 2,
            cost: 2,
            elapsed: Duration::from_millis(5),
            outcome,
        }
    }

    #[test]
    fn test_record_reports() {
        let mut stats = RunStats::default();
        stats.record(&report(
            0,
            Ok(vec![
                MultimodalSample::placeholder("/a.txt"),
                MultimodalSample::placeholder("/b.txt"),
            ]),
        ));
        stats.record(&report(
            1,
            Err(DispatchError::RemoteTask {
                task_id: 1,
                processor: "TextProcessor".into(),
                message: "lost".into(),
            }),
        ));

        let summary = stats.tasks.summary();
        assert_eq!(summary.tasks_total, 2);
        assert_eq!(summary.samples, 2);
        assert_eq!(stats.failed_tasks(), 1);
    }

    #[test]
    fn test_throughput_without_duration() {
        assert_eq!(RunStats::default().throughput(), 0.0);
    }
}
