//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// File Dispatch - capability-routed batch processing of files and URLs
#[derive(Parser, Debug)]
#[command(
    name = "file-dispatch",
    author,
    version,
    about = "Route files to processors and run them in capacity-bounded batches",
    long_about = "Discovers files under the given directories, routes each one to the first \n\
                  processor type that accepts it, packs every type's items into batches \n\
                  (best-fit-decreasing) and runs them locally or on a cluster scheduler."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "FILE_DISPATCH_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "FILE_DISPATCH_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover, route, batch and execute
    Run(RunArgs),

    /// Show the batches a run would execute
    Plan(PlanArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// List registered processor types
    Processors(ProcessorsArgs),
}

/// Inputs shared by `run` and `plan`
#[derive(Parser, Debug, Clone)]
pub struct InputArgs {
    /// Configuration file (TOML, JSON or YAML); defaults apply when omitted
    #[arg(short, long, env = "FILE_DISPATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory (or single file) to discover inputs in; repeatable
    #[arg(short, long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    /// URL to dispatch to the URL processor; repeatable
    #[arg(long = "url")]
    pub urls: Vec<String>,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,

    /// Override `batch_multiplier`
    #[arg(long)]
    pub batch_multiplier: Option<u64>,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Override the output root (`output_path`)
    #[arg(short, long, env = "FILE_DISPATCH_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override the local worker count
    #[arg(long, env = "FILE_DISPATCH_WORKERS")]
    pub workers: Option<usize>,

    /// Run distributed using this scheduler file
    #[arg(long, env = "FILE_DISPATCH_SCHEDULER_FILE")]
    pub scheduler_file: Option<PathBuf>,

    /// Disable the fast processor paths
    #[arg(long)]
    pub slow: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "FILE_DISPATCH_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `plan` command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `processors` command
#[derive(Parser, Debug)]
pub struct ProcessorsArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "file-dispatch",
            "run",
            "--input",
            "/data/a",
            "--input",
            "/data/b",
            "--url",
            "https://example.com",
            "--workers",
            "4",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.input.inputs.len(), 2);
        assert_eq!(args.input.urls, vec!["https://example.com"]);
        assert_eq!(args.workers, Some(4));
        assert!(args.input.config.is_none());
    }

    #[test]
    fn test_input_required() {
        assert!(Cli::try_parse_from(["file-dispatch", "plan"]).is_err());
    }
}
