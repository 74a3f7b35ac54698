//! Job orchestration
//!
//! Validates the job, creates the shuffle store, launches one map task per
//! input file and one reduce task per partition concurrently, waits for all of
//! them and removes the store. Task failures end up in the [`JobReport`]; only
//! input and setup problems make [`Orchestrator::run`] return an error.

use super::map_task::{MapOutcome, MapTask};
use super::reduce_task::{PollSettings, ReduceOutcome, ReduceTask};
use super::report::{JobReport, MapperReport, ReducerReport};
use super::shuffle::ShuffleStore;
use super::shutdown::TeardownGuard;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::functions::{FunctionRegistry, Mapper, Reducer};
use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// One end-to-end execution: inputs, output location and user logic
#[derive(Clone)]
pub struct Job {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub reducers: usize,
    pub mapper: Arc<dyn Mapper>,
    pub reducer: Arc<dyn Reducer>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("reducers", &self.reducers)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        reducers: usize,
        mapper: Arc<dyn Mapper>,
        reducer: Arc<dyn Reducer>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            reducers,
            mapper,
            reducer,
        }
    }

    /// Build a job whose functions are looked up by name
    pub fn from_registry(
        registry: &FunctionRegistry,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        reducers: usize,
        mapper: &str,
        reducer: &str,
    ) -> Result<Self> {
        Ok(Self::new(
            input_dir,
            output_dir,
            reducers,
            registry.mapper(mapper)?,
            registry.reducer(reducer)?,
        ))
    }

    pub fn validate(&self) -> Result<()> {
        if self.reducers == 0 {
            return Err(Error::Validation(
                "number of reducers must be greater than 0".to_string(),
            ));
        }
        if !self.input_dir.is_dir() {
            return Err(Error::Validation(format!(
                "input directory {} does not exist",
                self.input_dir.display()
            )));
        }
        Ok(())
    }
}

/// List the regular files directly inside `dir`, sorted by name
///
/// The position in this list is the mapper id of each file.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Validation(format!("cannot list input directory {}: {e}", dir.display()))
        })?;
        if entry.path().is_file() {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(Error::EmptyInput(dir.to_path_buf()));
    }
    Ok(files)
}

pub struct Orchestrator {
    config: EngineConfig,
    handle_signals: bool,
}

impl Orchestrator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            handle_signals: false,
        }
    }

    /// Remove the shuffle store and exit when SIGINT/SIGTERM arrives mid-run
    pub fn with_signal_handler(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn run(&self, job: &Job) -> Result<JobReport> {
        self.config.validate()?;
        job.validate()?;

        let inputs = discover_inputs(&job.input_dir)?;
        info!("Found {} input files", inputs.len());

        tokio::fs::create_dir_all(&job.output_dir).await?;

        let store = ShuffleStore::create(self.config.temp_dir.as_deref(), &self.config.temp_prefix)?
            .keep_on_teardown(self.config.keep_intermediate);
        info!("Temp dir: {}", store.root().display());

        let guard = if self.handle_signals && !self.config.keep_intermediate {
            Some(TeardownGuard::install(store.root().to_path_buf())?)
        } else {
            None
        };

        let result = self.execute(job, &inputs, &store).await;

        drop(guard);
        if let Err(e) = store.teardown().await {
            warn!("Failed to clean temp dir {}: {}", store.root().display(), e);
        }

        let report = result?;
        info!("Job finished: {}", report.summary());
        Ok(report)
    }

    async fn execute(
        &self,
        job: &Job,
        inputs: &[PathBuf],
        store: &ShuffleStore,
    ) -> Result<JobReport> {
        let started_at = Utc::now();
        let mappers = inputs.len();

        let mut map_tasks = Vec::with_capacity(mappers);
        for (id, input) in inputs.iter().enumerate() {
            let dir = store.create_mapper_dir(id).await?;
            map_tasks.push(
                MapTask::new(id, input, dir, job.reducers, Arc::clone(&job.mapper))
                    .with_buffer_size(self.config.buffer_size),
            );
        }

        let map_handles: Vec<_> = map_tasks
            .into_iter()
            .map(|task| {
                debug!(mapper_id = task.id(), "Spawning map task");
                tokio::spawn(task.run())
            })
            .collect();

        info!("Starting {} reducers", job.reducers);
        let settings = PollSettings::from_config(&self.config, mappers);
        let reduce_tasks: Vec<_> = (0..job.reducers)
            .map(|partition| {
                ReduceTask::new(
                    partition,
                    store.clone(),
                    mappers,
                    &job.output_dir,
                    Arc::clone(&job.reducer),
                    settings,
                )
            })
            .collect();
        let outputs: Vec<PathBuf> = reduce_tasks.iter().map(|t| t.output_path()).collect();
        let reduce_handles: Vec<_> = reduce_tasks
            .into_iter()
            .map(|task| {
                debug!(partition = task.partition(), "Spawning reduce task");
                tokio::spawn(task.run())
            })
            .collect();

        info!("Waiting for mappers...");
        let map_outcomes: Vec<MapOutcome> = join_all(map_handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| MapOutcome::Failed {
                    reason: format!("map task aborted: {e}"),
                })
            })
            .collect();
        info!("All mappers completed");

        info!("Waiting for reducers...");
        let reduce_outcomes: Vec<ReduceOutcome> = join_all(reduce_handles)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| ReduceOutcome::Failed {
                    reason: format!("reduce task aborted: {e}"),
                })
            })
            .collect();
        info!("All reducers completed");

        for (id, outcome) in map_outcomes.iter().enumerate() {
            debug!(mapper_id = id, ?outcome, "Map outcome");
        }

        Ok(JobReport {
            started_at,
            finished_at: Utc::now(),
            shuffle_root: store.root().to_path_buf(),
            mappers: inputs
                .iter()
                .zip(map_outcomes)
                .enumerate()
                .map(|(mapper_id, (input, outcome))| MapperReport {
                    mapper_id,
                    input: input.clone(),
                    outcome,
                })
                .collect(),
            reducers: outputs
                .into_iter()
                .zip(reduce_outcomes)
                .enumerate()
                .map(|(partition, (output, outcome))| ReducerReport {
                    partition,
                    output,
                    outcome,
                })
                .collect(),
        })
    }
}
