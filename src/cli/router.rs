//! Command routing and execution

use crate::cli::args::Commands;
use crate::cli::help::format_function_list;
use crate::config::ConfigLoader;
use crate::engine::{Job, Orchestrator};
use crate::functions::FunctionRegistry;
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

/// Execute a CLI command based on the parsed arguments
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            input_dir,
            output_dir,
            num_reducers,
            mapper,
            reducer,
            config,
            strict,
            keep_intermediate,
            report,
        } => {
            let request = RunRequest {
                input_dir,
                output_dir,
                num_reducers,
                mapper,
                reducer,
                config,
                strict,
                keep_intermediate,
                report,
            };
            run_job(request, &FunctionRegistry::default()).await
        }
        Commands::List => {
            print!("{}", format_function_list(&FunctionRegistry::default()));
            Ok(())
        }
    }
}

/// Arguments of the `run` subcommand
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub num_reducers: usize,
    pub mapper: String,
    pub reducer: String,
    pub config: Option<PathBuf>,
    pub strict: bool,
    pub keep_intermediate: bool,
    pub report: Option<PathBuf>,
}

pub async fn run_job(request: RunRequest, registry: &FunctionRegistry) -> Result<()> {
    info!("Starting MapReduce...");

    let mut loader = ConfigLoader::new();
    if let Some(path) = &request.config {
        loader = loader.with_file(path);
    }
    let mut config = loader
        .load()
        .await
        .context("Failed to load engine configuration")?;
    config.strict |= request.strict;
    config.keep_intermediate |= request.keep_intermediate;

    let job = Job::from_registry(
        registry,
        &request.input_dir,
        &request.output_dir,
        request.num_reducers,
        &request.mapper,
        &request.reducer,
    )?;

    let orchestrator = Orchestrator::new(config).with_signal_handler(true);
    let strict = orchestrator.config().strict;
    debug!(config = ?orchestrator.config(), "Effective engine configuration");
    let report = orchestrator.run(&job).await?;

    if let Some(path) = &request.report {
        tokio::fs::write(path, report.to_json()?)
            .await
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    if strict {
        report.into_strict()?;
    }
    Ok(())
}
