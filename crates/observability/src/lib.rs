//! # Observability
//!
//! Tracing subscriber setup and Prometheus metrics for file dispatch.
//!
//! ## Usage
//!
//! ```ignore
//! use observability::{init_with_config, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::default())?;
//! observability::record_items_routed("TextProcessor", 12);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_batch_planned, record_item_unrouted, record_items_routed, record_persist_failure,
    record_task_finished, DispatchAggregator, DispatchSummary, ProcessorTally, RunningStats,
    StatsSummary,
};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    /// Multi-line, human readable
    Pretty,
    Compact,
}

/// Observability settings
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (`None` disables the exporter)
    pub metrics_port: Option<u16>,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Use `log_level` even when `RUST_LOG` is set
    pub override_env: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            log_level: "info".to_string(),
            override_env: false,
        }
    }
}

impl ObservabilityConfig {
    /// Settings for a command-line run at the given verbosity
    ///
    /// `quiet` pins the level to `warn` regardless of `RUST_LOG`.
    pub fn for_cli(log_format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let log_level = match (quiet, verbose) {
            (true, _) => "warn",
            (false, 0) => "info",
            (false, 1) => "debug",
            (false, _) => "trace",
        };
        Self {
            log_format,
            metrics_port: None,
            log_level: log_level.to_string(),
            override_env: quiet,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        if self.override_env {
            return EnvFilter::new(&self.log_level);
        }
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}

/// Install the tracing subscriber and, if configured, the metrics exporter
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::debug!(
        log_format = ?config.log_format,
        log_level = %config.log_level,
        "Observability initialized"
    );
    Ok(())
}

/// Install only the Prometheus exporter
///
/// For runs that decide on metrics after logging is up.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert!(config.metrics_port.is_none());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(!config.override_env);
    }

    #[test]
    fn test_cli_levels() {
        let level = |verbose, quiet| ObservabilityConfig::for_cli(LogFormat::Pretty, verbose, quiet);
        assert_eq!(level(0, false).log_level, "info");
        assert_eq!(level(1, false).log_level, "debug");
        assert_eq!(level(3, false).log_level, "trace");

        let quiet = level(2, true);
        assert_eq!(quiet.log_level, "warn");
        assert!(quiet.override_env);
    }
}
