//! taskpipe - run task pipelines from the command line
//!
//! Loads a pipeline from the local model cache with the ONNX backend, runs it
//! on one input (or a JSON array batch) and prints the result as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use taskpipe_pipeline::{LocalModelStore, OnnxBackend, PipelineFactory, ProgressEvent, Task};

mod config;

use crate::config::{CliArgs, Command, RunArgs};

fn main() -> Result<()> {
    let args = CliArgs::parse();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    match &args.command {
        Command::Tasks => {
            list_tasks();
            Ok(())
        }
        Command::Run(run) => run_pipeline(&args, run),
    }
}

fn list_tasks() {
    for task in Task::ALL {
        println!("{:<32} {}", task.as_str(), task.default_model());
    }
}

fn run_pipeline(args: &CliArgs, run: &RunArgs) -> Result<()> {
    let settings = args.settings()?;
    let store = match &run.cache_dir {
        Some(dir) => LocalModelStore::new(dir),
        None => LocalModelStore::from_settings(&settings),
    };
    log::info!("Model store: {:?}", store.root());

    let factory = PipelineFactory::new(store, OnnxBackend::default()).with_settings(settings);

    let mut options = run.pipeline_options();
    if run.progress {
        options = options.with_progress(|event: ProgressEvent| {
            match serde_json::to_string(&event) {
                Ok(line) => eprintln!("{}", line),
                Err(e) => log::warn!("Unprintable progress event {:?}: {}", event, e),
            }
        });
    }

    let pipeline = factory
        .create(&run.task, options)
        .with_context(|| format!("Failed to load {} pipeline", run.task))?;

    let output = pipeline
        .call_json(run.input_value(), run.options_value()?)
        .with_context(|| format!("{} pipeline failed", pipeline.task()))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
