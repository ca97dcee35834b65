//! `plan` command implementation.

use anyhow::{Context, Result};
use dispatcher::{BatchPlanner, Dispatcher, Task};
use serde::Serialize;
use tracing::info;

use crate::cli::PlanArgs;
use crate::error::CliError;
use crate::pipeline;

/// One batch in JSON output
#[derive(Serialize)]
struct PlannedTask<'a> {
    task_id: usize,
    processor: &'a str,
    cost: u64,
    items: Vec<String>,
}

/// Execute the `plan` command
pub fn run_plan(args: &PlanArgs) -> Result<()> {
    let config = pipeline::load_config(&args.input)?;
    let inputs = pipeline::discover(&args.input.inputs, &args.input.urls, !args.input.no_recursive)?;

    let dispatcher = Dispatcher::new(inputs, config);
    dispatcher.validate().map_err(CliError::from)?;
    let buckets = dispatcher.route().map_err(CliError::from)?;
    let tasks = BatchPlanner::new(dispatcher.registry(), dispatcher.config()).plan(&buckets);

    info!(tasks = tasks.len(), "Plan computed");

    if args.json {
        let planned: Vec<_> = tasks.iter().map(planned_task).collect();
        let json = serde_json::to_string_pretty(&planned).context("Failed to serialize plan")?;
        println!("{}", json);
    } else {
        print_plan(&tasks, buckets.unrouted().len());
    }
    Ok(())
}

fn planned_task(task: &Task) -> PlannedTask<'_> {
    PlannedTask {
        task_id: task.task_id,
        processor: task.processor.as_str(),
        cost: task.cost,
        items: task.items.iter().map(|item| item.source()).collect(),
    }
}

fn print_plan(tasks: &[Task], unrouted: usize) {
    println!("\n=== Dispatch Plan ===\n");
    println!("Tasks: {}", tasks.len());
    if unrouted > 0 {
        println!("Items without processor: {}", unrouted);
    }

    for task in tasks {
        println!(
            "\n  [{}] {} - {} items, cost {}",
            task.task_id,
            task.processor,
            task.items.len(),
            task.cost
        );
        for item in &task.items {
            println!("      {}", item.source());
        }
    }
    println!();
}
