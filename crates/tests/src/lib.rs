//! # Integration Tests
//!
//! End-to-end dispatch runs over temporary directories:
//! configuration -> routing -> batching -> execution -> JSONL results.

#[cfg(test)]
mod support {
    use std::fs;
    use std::path::{Path, PathBuf};

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DispatchConfig, DispatcherReadyResult, FileDescriptor, MultimodalSample};

    /// Write `files` under `root` and build a discovery result over them
    pub fn discovered(root: &Path, files: &[(&str, &str)]) -> DispatcherReadyResult {
        let mut descriptors = Vec::new();
        for (name, content) in files {
            let path = root.join(name);
            fs::write(&path, content).unwrap();
            descriptors.push(FileDescriptor::from_path(&path).unwrap());
        }
        let mut result = DispatcherReadyResult::new();
        result.add_files(root.to_path_buf(), descriptors);
        result
    }

    pub fn config(toml: &str) -> DispatchConfig {
        ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap()
    }

    pub fn results_file(output: &Path, processor: &str) -> PathBuf {
        output
            .join("processors")
            .join(processor)
            .join(dispatcher::RESULTS_FILE_NAME)
    }

    pub fn read_results(path: &Path) -> Vec<MultimodalSample> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

#[cfg(test)]
mod local_tests {
    use super::support::*;
    use dispatcher::Dispatcher;

    #[tokio::test]
    async fn test_local_run_writes_results() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let result = discovered(
            input.path(),
            &[("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")],
        );
        let config = config(&format!(
            "output_path = {:?}\nprocess_batch_sizes = [{{ TextProcessor = 2 }}]\n",
            output.path()
        ));

        let dispatcher = Dispatcher::new(result, config);
        let metrics = dispatcher.metrics();
        let reports = dispatcher.dispatch().await.unwrap().collect().await;

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.is_success()));

        let mut texts: Vec<_> = read_results(&results_file(output.path(), "TextProcessor"))
            .into_iter()
            .map(|s| s.text)
            .collect();
        texts.sort();
        assert_eq!(texts, vec!["alpha", "beta", "gamma"]);
        assert_eq!(metrics.snapshot().samples_produced, 3);
    }

    #[tokio::test]
    async fn test_empty_bucket_gets_no_file() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let result = discovered(input.path(), &[("notes.txt", "hello")]);
        let config = config(&format!("output_path = {:?}\n", output.path()));

        let reports = Dispatcher::new(result, config)
            .dispatch()
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(reports.len(), 1);
        assert!(results_file(output.path(), "TextProcessor").exists());
        assert!(!output.path().join("processors/UrlProcessor").exists());
    }

    #[tokio::test]
    async fn test_unrouted_files_are_counted() {
        let input = tempfile::tempdir().unwrap();
        let result = discovered(input.path(), &[("a.txt", "a"), ("image.png", "png")]);

        let dispatcher = Dispatcher::new(result, config(""));
        let metrics = dispatcher.metrics();
        let reports = dispatcher.dispatch().await.unwrap().collect().await;

        assert_eq!(reports.len(), 1);
        assert_eq!(metrics.snapshot().items_unrouted, 1);
    }

    #[tokio::test]
    async fn test_stop_after_first_task() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let result = discovered(
            input.path(),
            &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")],
        );
        let config = config(&format!(
            "output_path = {:?}\nprocess_batch_sizes = [{{ TextProcessor = 1 }}]\n",
            output.path()
        ));

        let dispatcher = Dispatcher::new(result, config);
        let state = dispatcher.execution_state();
        let mut results = dispatcher.dispatch().await.unwrap();

        let first = results.next().await.unwrap();
        assert_eq!(first.samples().len(), 1);
        state.request_stop().unwrap();

        let rest = results.collect().await;
        assert_eq!(rest.len(), 2);
        assert!(rest.iter().all(|r| r.is_success() && r.samples().is_empty()));

        let lines = read_results(&results_file(output.path(), "TextProcessor"));
        assert_eq!(lines.len(), 1);
    }
}

#[cfg(test)]
mod distributed_tests {
    use std::sync::Arc;

    use super::support::*;
    use dispatcher::{ClusterFaults, DispatchError, Dispatcher, InProcessCluster};

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_job_does_not_sink_siblings() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let result = discovered(
            input.path(),
            &[("a.txt", "a"), ("b.txt", "b"), ("c.txt", "c")],
        );
        let config = config(&format!(
            "distributed = true\nscheduler_file = \"unused.json\"\noutput_path = {:?}\n\
             process_batch_sizes = [{{ TextProcessor = 1 }}]\n",
            output.path()
        ));

        let cluster = InProcessCluster::start("inproc://e2e", 2)
            .unwrap()
            .with_faults(ClusterFaults {
                fail_jobs: vec!["TextProcessor-1".to_string()],
            });

        let mut reports = Dispatcher::new(result, config)
            .with_cluster(Arc::new(cluster))
            .dispatch()
            .await
            .unwrap()
            .collect()
            .await;
        reports.sort_by_key(|r| r.task_id);

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_success());
        assert!(matches!(
            reports[1].outcome,
            Err(DispatchError::RemoteTask { task_id: 1, .. })
        ));
        assert!(reports[2].is_success());

        let lines = read_results(&results_file(output.path(), "TextProcessor"));
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scheduler_file_connects() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let scheduler = input.path().join("scheduler.json");
        std::fs::write(&scheduler, r#"{"address": "inproc://from-file", "workers": 2}"#).unwrap();

        let result = discovered(input.path(), &[("a.txt", "a"), ("b.txt", "b")]);
        let config = config(&format!(
            "distributed = true\nscheduler_file = {:?}\noutput_path = {:?}\n",
            scheduler,
            output.path()
        ));

        let dispatcher = Dispatcher::new(result, config);
        let state = dispatcher.execution_state();
        let reports = dispatcher.dispatch().await.unwrap().collect().await;

        // Both text files fit one batch under the default capacity
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_success());
        assert_eq!(state.get(), Ok(false));
    }
}

#[cfg(test)]
mod registry_tests {
    use std::sync::Arc;

    use super::support::*;
    use contracts::{
        ContractError, Cost, Descriptor, MultimodalSample, Processor, ProcessorConfig,
        ProcessorError,
    };
    use dispatcher::Dispatcher;
    use processors::ProcessorRegistry;

    struct Upper;

    impl Processor for Upper {
        fn name(&self) -> &str {
            "UpperProcessor"
        }

        fn process_one(
            &self,
            item: &Descriptor,
            _fast: bool,
        ) -> Result<MultimodalSample, ProcessorError> {
            let file = item.as_file().ok_or_else(|| ProcessorError::Unsupported {
                processor: self.name().to_string(),
                descriptor: item.source(),
            })?;
            let text = std::fs::read_to_string(&file.file_path)
                .map_err(|source| ProcessorError::Read {
                    path: item.source(),
                    source,
                })?;
            Ok(MultimodalSample::new(
                vec![text.to_uppercase()],
                vec![],
                item.source(),
            ))
        }
    }

    fn registry_with_upper() -> ProcessorRegistry {
        let mut registry = ProcessorRegistry::builtin();
        registry
            .register(
                "UpperProcessor",
                Arc::new(|item: &Descriptor| {
                    item.as_file().is_some_and(|f| f.file_extension == ".md")
                }),
                Arc::new(|item: &Descriptor| {
                    item.as_file().map_or(Cost::Unsized, |f| Cost::Sized(f.file_size))
                }),
                Arc::new(|_: &ProcessorConfig| {
                    Ok::<_, ContractError>(Arc::new(Upper) as Arc<dyn Processor>)
                }),
            )
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_custom_processor_sized_by_bytes() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let result = discovered(
            input.path(),
            &[
                ("a.md", "aaaaaaaaaa"),
                ("b.md", "bbbbbb"),
                ("c.md", "cccc"),
                ("d.txt", "plain"),
            ],
        );
        let config = config(&format!(
            "output_path = {:?}\nprocess_batch_sizes = [{{ UpperProcessor = 10 }}]\n",
            output.path()
        ));

        let dispatcher = Dispatcher::new(result, config).with_registry(registry_with_upper());
        let tasks = dispatcher.plan().unwrap();

        // a.md fills a batch alone; b.md and c.md share one
        let upper: Vec<_> = tasks
            .iter()
            .filter(|t| t.processor == "UpperProcessor")
            .map(|t| t.cost)
            .collect();
        assert_eq!(upper, vec![10, 10]);

        let reports = dispatcher.dispatch().await.unwrap().collect().await;
        assert_eq!(reports.len(), 3);

        let mut texts: Vec<_> = read_results(&results_file(output.path(), "UpperProcessor"))
            .into_iter()
            .map(|s| s.text)
            .collect();
        texts.sort();
        assert_eq!(texts, vec!["AAAAAAAAAA", "BBBBBB", "CCCC"]);
    }
}
