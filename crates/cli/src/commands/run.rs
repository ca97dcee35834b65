//! `run` command implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use contracts::DispatchConfig;
use dispatcher::{Dispatcher, ExecutionState};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{self, RunStats};

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    let mut config = pipeline::load_config(&args.input)?;
    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration")?;

    info!(
        distributed = config.distributed,
        local_workers = config.local_workers,
        use_fast = config.use_fast_processors,
        output = ?config.output_path,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics exporter")?;
    }

    let inputs = pipeline::discover(&args.input.inputs, &args.input.urls, !args.input.no_recursive)?;

    let mut stats = RunStats {
        items_discovered: inputs.len(),
        ..Default::default()
    };

    let dispatcher = Dispatcher::new(inputs, config);
    let state = dispatcher.execution_state();
    let metrics = dispatcher.metrics();

    let started = Instant::now();
    let mut results = dispatcher
        .dispatch()
        .await
        .map_err(CliError::from)
        .context("Dispatch failed")?;
    stats.tasks_planned = results.total_tasks();

    // The state is initialized only once dispatch() returns
    let shutdown = tokio::spawn(stop_when(shutdown_signal(), Arc::clone(&state)));

    info!(tasks = stats.tasks_planned, "Dispatch started");

    while let Some(report) = results.next().await {
        match &report.outcome {
            Ok(samples) => info!(
                task_id = report.task_id,
                processor = %report.processor,
                samples = samples.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Task finished"
            ),
            Err(e) => warn!(task_id = report.task_id, error = %e, "Task failed"),
        }
        stats.record(&report);
    }
    shutdown.abort();

    stats.duration = started.elapsed();
    stats.counters = metrics.snapshot();
    stats.stopped = state.get().unwrap_or(false);
    stats.print_summary();

    let failed = stats.failed_tasks();
    if failed > 0 {
        return Err(CliError::TasksFailed {
            failed,
            total: stats.tasks_planned as u64,
        }
        .into());
    }

    info!("Dispatch finished");
    Ok(())
}

fn apply_overrides(config: &mut DispatchConfig, args: &RunArgs) {
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output path from CLI");
        config.output_path = Some(output.clone());
    }
    if let Some(workers) = args.workers {
        info!(workers, "Overriding local workers from CLI");
        config.local_workers = workers;
    }
    if let Some(ref scheduler) = args.scheduler_file {
        info!(scheduler = %scheduler.display(), "Switching to distributed execution");
        config.distributed = true;
        config.scheduler_file = Some(scheduler.clone());
    }
    if args.slow {
        config.use_fast_processors = false;
    }
}

/// Raise the stop flag once `signal` resolves
async fn stop_when(signal: impl Future<Output = ()>, state: Arc<ExecutionState>) {
    signal.await;

    warn!("Received shutdown signal, stopping remaining tasks...");
    if let Err(e) = state.request_stop() {
        warn!(error = %e, "Could not raise stop flag");
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
