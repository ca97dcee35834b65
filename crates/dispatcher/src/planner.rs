//! BatchPlanner - best-fit-decreasing partitioning of processor buckets
//!
//! Items are sorted by cost (descending, stable) and each one is placed in
//! the open batch it fills most tightly. An item that fits nowhere opens a
//! new batch, so a single over-capacity item ends up alone.

use contracts::{Cost, Descriptor, DispatchConfig, ProcessorId, UnsizedPolicy};
use processors::ProcessorRegistry;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::router::Buckets;

/// One bin produced by [`best_fit_decreasing`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin<T> {
    pub items: Vec<T>,
    pub cost: u64,
}

/// Pack `(item, cost)` pairs into bins of capacity `capacity`
///
/// Ties on remaining capacity go to the earliest opened bin. Equal costs
/// keep their input order.
pub fn best_fit_decreasing<T>(items: Vec<(T, u64)>, capacity: u64) -> Vec<Bin<T>> {
    let mut sorted = items;
    // sort_by is stable
    sorted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut bins: Vec<Bin<T>> = Vec::new();
    for (item, cost) in sorted {
        let best = bins
            .iter()
            .enumerate()
            .filter_map(|(idx, bin)| {
                bin.cost
                    .checked_add(cost)
                    .and_then(|total| capacity.checked_sub(total))
                    .map(|remaining| (idx, remaining))
            })
            // min_by_key returns the first minimum
            .min_by_key(|&(_, remaining)| remaining)
            .map(|(idx, _)| idx);

        match best {
            Some(idx) => {
                let bin = &mut bins[idx];
                bin.items.push(item);
                bin.cost += cost;
            }
            None => bins.push(Bin {
                items: vec![item],
                cost,
            }),
        }
    }

    bins
}

/// A processor type paired with one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    /// Position in the run's task list
    pub task_id: usize,
    pub processor: ProcessorId,
    pub items: Vec<Descriptor>,
    /// Aggregate cost; unsized items count as zero
    pub cost: u64,
}

/// Plans tasks from routed buckets
pub struct BatchPlanner<'a> {
    registry: &'a ProcessorRegistry,
    config: &'a DispatchConfig,
}

impl<'a> BatchPlanner<'a> {
    pub fn new(registry: &'a ProcessorRegistry, config: &'a DispatchConfig) -> Self {
        Self { registry, config }
    }

    /// Batches for a single bucket
    ///
    /// Sized items are packed first. Unsized items follow as single-item
    /// batches, or are dropped with a warning under [`UnsizedPolicy::Skip`].
    #[instrument(
        name = "planner_plan_bucket",
        skip_all,
        fields(processor = %processor, items = items.len())
    )]
    pub fn plan_bucket(
        &self,
        processor: &ProcessorId,
        items: &[Descriptor],
    ) -> Vec<Bin<Descriptor>> {
        let capacity = self.config.capacity_for(processor);
        let mut sized = Vec::with_capacity(items.len());
        let mut unsized_items = Vec::new();

        for item in items {
            match self.registry.cost(processor, item) {
                Cost::Sized(cost) => sized.push((item.clone(), cost)),
                Cost::Unsized => unsized_items.push(item.clone()),
            }
        }

        let mut bins = best_fit_decreasing(sized, capacity);

        for item in unsized_items {
            match self.config.unsized_policy {
                UnsizedPolicy::Isolate => {
                    warn!(processor = %processor, item = %item, "unsized item, dispatching alone");
                    bins.push(Bin {
                        items: vec![item],
                        cost: 0,
                    });
                }
                UnsizedPolicy::Skip => {
                    warn!(processor = %processor, item = %item, "unsized item skipped");
                }
            }
        }

        for bin in &bins {
            if bin.cost > capacity {
                debug!(processor = %processor, cost = bin.cost, capacity, "oversized item in its own batch");
            }
            observability::record_batch_planned(processor, bin.cost);
        }

        debug!(processor = %processor, capacity, batches = bins.len(), "bucket planned");
        bins
    }

    /// Tasks for every non-empty bucket, in bucket order
    pub fn plan(&self, buckets: &Buckets) -> Vec<Task> {
        let mut tasks = Vec::new();

        for (processor, items) in buckets.iter() {
            if items.is_empty() {
                continue;
            }
            for bin in self.plan_bucket(processor, items) {
                tasks.push(Task {
                    task_id: tasks.len(),
                    processor: processor.clone(),
                    items: bin.items,
                    cost: bin.cost,
                });
            }
        }

        tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::CapabilityRouter;
    use contracts::{FileDescriptor, MultimodalSample, Processor, ProcessorConfig, ProcessorError};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn labels(bins: &[Bin<&'static str>]) -> Vec<Vec<&'static str>> {
        bins.iter().map(|b| b.items.clone()).collect()
    }

    #[test]
    fn test_reference_scenario() {
        let bins = best_fit_decreasing(vec![("A", 90), ("B", 60), ("C", 40), ("D", 30)], 100);
        assert_eq!(labels(&bins), vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
        assert_eq!(bins.iter().map(|b| b.cost).collect::<Vec<_>>(), vec![90, 100, 30]);
    }

    #[test]
    fn test_input_order_does_not_matter_for_distinct_costs() {
        let bins = best_fit_decreasing(vec![("D", 30), ("C", 40), ("A", 90), ("B", 60)], 100);
        assert_eq!(labels(&bins), vec![vec!["A"], vec!["B", "C"], vec!["D"]]);
    }

    #[test]
    fn test_best_fit_prefers_tightest_bin() {
        // After sorting: 70 -> bin0 (30 left), 50 -> bin1 (50 left), 25 -> bin0
        let bins = best_fit_decreasing(vec![("x", 50), ("y", 70), ("z", 25)], 100);
        assert_eq!(labels(&bins), vec![vec!["y", "z"], vec!["x"]]);
    }

    #[test]
    fn test_equal_remaining_goes_to_first_bin() {
        let bins = best_fit_decreasing(vec![("a", 60), ("b", 60), ("c", 40)], 100);
        assert_eq!(labels(&bins), vec![vec!["a", "c"], vec!["b"]]);
    }

    #[test]
    fn test_equal_costs_keep_input_order() {
        let bins = best_fit_decreasing(vec![("a", 1), ("b", 1), ("c", 1)], 2);
        assert_eq!(labels(&bins), vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn test_oversized_item_stands_alone() {
        let bins = best_fit_decreasing(vec![("big", 250), ("small", 10)], 100);
        assert_eq!(labels(&bins), vec![vec!["big"], vec!["small"]]);
        assert_eq!(bins[0].cost, 250);
    }

    #[test]
    fn test_exact_fit_allowed() {
        let bins = best_fit_decreasing(vec![("a", 100)], 100);
        assert_eq!(bins.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(best_fit_decreasing::<()>(vec![], 100).is_empty());
    }

    struct Paged;

    impl Processor for Paged {
        fn name(&self) -> &str {
            "PagedProcessor"
        }

        fn process_one(
            &self,
            item: &Descriptor,
            _fast: bool,
        ) -> Result<MultimodalSample, ProcessorError> {
            Ok(MultimodalSample::placeholder(item.source()))
        }
    }

    /// `.pdf` files cost their size; `.bin` files are unsized
    fn paged_registry() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::new();
        registry
            .register(
                "PagedProcessor",
                Arc::new(|item: &Descriptor| {
                    item.as_file()
                        .is_some_and(|f| f.file_extension == ".pdf" || f.file_extension == ".bin")
                }),
                Arc::new(|item: &Descriptor| match item.as_file() {
                    Some(f) if f.file_extension == ".pdf" => Cost::Sized(f.file_size),
                    _ => Cost::Unsized,
                }),
                Arc::new(|_: &ProcessorConfig| Ok(Arc::new(Paged) as Arc<dyn Processor>)),
            )
            .unwrap();
        registry
    }

    fn sized(name: &str, size: u64) -> FileDescriptor {
        let mut file = FileDescriptor::new(format!("/docs/{name}"));
        file.file_size = size;
        file
    }

    fn paged_buckets(registry: &ProcessorRegistry) -> Buckets {
        let files = [
            sized("a.pdf", 90),
            sized("b.pdf", 60),
            sized("blob.bin", 5),
            sized("c.pdf", 40),
            sized("d.pdf", 30),
        ];
        CapabilityRouter::new(registry).route(files.iter(), &[])
    }

    #[test]
    fn test_unsized_isolated_by_default() {
        let registry = paged_registry();
        let config = DispatchConfig::default();
        let tasks = BatchPlanner::new(&registry, &config).plan(&paged_buckets(&registry));

        let sources: Vec<Vec<String>> = tasks
            .iter()
            .map(|t| t.items.iter().map(Descriptor::source).collect())
            .collect();
        assert_eq!(
            sources,
            vec![
                vec!["/docs/a.pdf".to_string()],
                vec!["/docs/b.pdf".to_string(), "/docs/c.pdf".to_string()],
                vec!["/docs/d.pdf".to_string()],
                vec!["/docs/blob.bin".to_string()],
            ]
        );
        assert_eq!(
            tasks.iter().map(|t| t.task_id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(tasks[3].cost, 0);
    }

    #[test]
    fn test_unsized_skipped_on_request() {
        let registry = paged_registry();
        let config = DispatchConfig {
            unsized_policy: UnsizedPolicy::Skip,
            ..Default::default()
        };
        let tasks = BatchPlanner::new(&registry, &config).plan(&paged_buckets(&registry));
        assert_eq!(tasks.len(), 3);
        assert!(tasks
            .iter()
            .flat_map(|t| &t.items)
            .all(|item| !item.source().ends_with(".bin")));
    }

    #[test]
    fn test_multiplier_scales_capacity() {
        let registry = paged_registry();
        let config = DispatchConfig {
            batch_multiplier: 3,
            unsized_policy: UnsizedPolicy::Skip,
            ..Default::default()
        };
        let tasks = BatchPlanner::new(&registry, &config).plan(&paged_buckets(&registry));
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].cost, 220);
    }

    #[test]
    fn test_empty_bucket_yields_no_tasks() {
        let registry = ProcessorRegistry::builtin();
        let config = DispatchConfig::default();
        let buckets = CapabilityRouter::new(&registry).route(std::iter::empty(), &[]);
        assert!(BatchPlanner::new(&registry, &config).plan(&buckets).is_empty());
    }

    proptest! {
        #[test]
        fn prop_batches_respect_capacity(
            costs in prop::collection::vec(0u64..200, 0..40),
            capacity in 1u64..300,
        ) {
            let items: Vec<_> = costs.iter().copied().enumerate().collect();
            for bin in best_fit_decreasing(items, capacity) {
                prop_assert!(bin.cost <= capacity || bin.items.len() == 1);
            }
        }

        #[test]
        fn prop_items_preserved(
            costs in prop::collection::vec(0u64..200, 0..40),
            capacity in 1u64..300,
        ) {
            let items: Vec<_> = costs.iter().copied().enumerate().collect();
            let mut packed: Vec<usize> = best_fit_decreasing(items, capacity)
                .into_iter()
                .flat_map(|bin| bin.items)
                .collect();
            packed.sort_unstable();
            prop_assert_eq!(packed, (0..costs.len()).collect::<Vec<_>>());
        }

        #[test]
        fn prop_bin_cost_matches_items(
            costs in prop::collection::vec(0u64..200, 0..40),
            capacity in 1u64..300,
        ) {
            let items: Vec<_> = costs.iter().copied().enumerate().collect();
            for bin in best_fit_decreasing(items, capacity) {
                let sum: u64 = bin.items.iter().map(|&idx| costs[idx]).sum();
                prop_assert_eq!(sum, bin.cost);
            }
        }

        #[test]
        fn prop_deterministic(
            costs in prop::collection::vec(0u64..200, 0..40),
            capacity in 1u64..300,
        ) {
            let items: Vec<_> = costs.iter().copied().enumerate().collect();
            prop_assert_eq!(
                best_fit_decreasing(items.clone(), capacity),
                best_fit_decreasing(items, capacity)
            );
        }

        // Bin count is monotone in capacity when every item costs the same.
        #[test]
        fn prop_uniform_bin_count_monotone(
            count in 0usize..60,
            cost in 1u64..50,
            capacity in 1u64..200,
            extra in 0u64..200,
        ) {
            let items = || (0..count).map(|i| (i, cost)).collect::<Vec<_>>();
            let smaller = best_fit_decreasing(items(), capacity).len();
            let larger = best_fit_decreasing(items(), capacity + extra).len();
            prop_assert!(larger <= smaller);
        }
    }

    #[test]
    fn test_bin_count_non_increasing_for_reference_bucket() {
        let items = vec![("A", 90), ("B", 60), ("C", 40), ("D", 30)];
        let counts: Vec<usize> = [50, 100, 130, 220, 1000]
            .iter()
            .map(|&c| best_fit_decreasing(items.clone(), c).len())
            .collect();
        assert!(counts.windows(2).all(|w| w[1] <= w[0]), "got {counts:?}");
    }
}
