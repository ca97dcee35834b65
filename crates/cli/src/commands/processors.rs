//! `processors` command implementation.

use anyhow::{Context, Result};
use processors::ProcessorRegistry;
use serde::Serialize;

use crate::cli::ProcessorsArgs;

#[derive(Serialize, Debug, PartialEq, Eq)]
struct ProcessorInfo {
    name: String,
    handles_urls: bool,
}

/// Execute the `processors` command
pub fn run_processors(args: &ProcessorsArgs) -> Result<()> {
    let listing = list(&ProcessorRegistry::builtin());

    if args.json {
        let json =
            serde_json::to_string_pretty(&listing).context("Failed to serialize processors")?;
        println!("{}", json);
    } else {
        println!("\n=== Registered Processors ===\n");
        for info in &listing {
            let marker = if info.handles_urls { " (urls)" } else { "" };
            println!("  - {}{}", info.name, marker);
        }
        println!();
    }
    Ok(())
}

fn list(registry: &ProcessorRegistry) -> Vec<ProcessorInfo> {
    let url_processor = registry.url_processor();
    registry
        .list_all()
        .map(|id| ProcessorInfo {
            name: id.to_string(),
            handles_urls: Some(id) == url_processor,
        })
        .collect()
}
