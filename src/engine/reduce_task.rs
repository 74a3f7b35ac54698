//! Reduce task
//!
//! A reducer owns one partition index. It polls the shuffle store for mapper
//! directories, consumes `part-<partition>` from each mapper that finished
//! successfully, and once every mapper is accounted for (or the retry budget
//! runs out) reduces the grouped values key by key in sorted order.
//!
//! ```text
//! Polling ──list──▶ Discover ──.complete──▶ Consume ──▶ Polling
//!    │                 │ .error / pending
//!    │                 └──────────────────────────────────▶ Polling
//!    ├── all mappers processed ──▶ Done
//!    └── retry ceiling reached ──▶ TimedOut (partial data)
//! ```

use super::errors::{guard_user, TaskError, TaskResult};
use super::record::{encode_line, split_line, CollectingEmitter};
use super::shuffle::{
    parse_mapper_id, partition_file_name, partition_path, MarkerState, ShuffleStore,
};
use crate::config::EngineConfig;
use crate::functions::Reducer;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, trace, warn};

/// Values collected per key; iteration order is the sorted key order
pub type GroupedTable = BTreeMap<String, Vec<String>>;

/// How a reduce task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReduceOutcome {
    Done {
        mappers: usize,
        keys: usize,
        records: u64,
    },
    TimedOut {
        processed: usize,
        total: usize,
        keys: usize,
        records: u64,
    },
    Failed {
        reason: String,
    },
}

impl ReduceOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, ReduceOutcome::Done { .. })
    }
}

/// Polling behaviour of a reduce task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Pause after a full discovery pass that left mappers outstanding
    pub poll_interval: Duration,
    /// Pause after the store root could not be listed
    pub list_retry_interval: Duration,
    /// Total pauses allowed before giving up
    pub max_retries: usize,
}

impl PollSettings {
    pub fn from_config(config: &EngineConfig, mappers: usize) -> Self {
        Self {
            poll_interval: config.poll_interval,
            list_retry_interval: config.list_retry_interval,
            max_retries: config.max_retries(mappers),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollEnd {
    Done,
    TimedOut,
}

struct Collected {
    table: GroupedTable,
    processed: usize,
    end: PollEnd,
}

pub struct ReduceTask {
    partition: usize,
    store: ShuffleStore,
    mappers: usize,
    output_dir: PathBuf,
    reducer: Arc<dyn Reducer>,
    settings: PollSettings,
}

impl ReduceTask {
    pub fn new(
        partition: usize,
        store: ShuffleStore,
        mappers: usize,
        output_dir: impl Into<PathBuf>,
        reducer: Arc<dyn Reducer>,
        settings: PollSettings,
    ) -> Self {
        Self {
            partition,
            store,
            mappers,
            output_dir: output_dir.into(),
            reducer,
            settings,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Path of the file this task writes
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(partition_file_name(self.partition))
    }

    /// Run to completion; failures end this reducer only
    pub async fn run(self) -> ReduceOutcome {
        info!(partition = self.partition, "Starting reducer #{}", self.partition);

        match self.execute().await {
            Ok(outcome) => {
                info!(partition = self.partition, "Reducer #{} completed", self.partition);
                outcome
            }
            Err(e) => {
                error!(partition = self.partition, "Reducer #{} failed: {}", self.partition, e);
                ReduceOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn execute(&self) -> TaskResult<ReduceOutcome> {
        let output_path = self.output_path();
        fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| TaskError::write(&self.output_dir, e))?;
        let file = File::create(&output_path)
            .await
            .map_err(|e| TaskError::write(&output_path, e))?;

        let Collected {
            table,
            processed,
            end,
        } = self.collect().await?;
        if end == PollEnd::TimedOut {
            warn!(
                partition = self.partition,
                "Reducer {} TIMEOUT! Completed {}/{} mappers",
                self.partition,
                processed,
                self.mappers
            );
        }

        let keys = table.len();
        info!(partition = self.partition, "Reducer {}: processing {} keys", self.partition, keys);

        // User reduce logic runs on the blocking pool, off the polling workers
        let reducer = Arc::clone(&self.reducer);
        let file = file.into_std().await;
        let records = tokio::task::spawn_blocking(move || {
            reduce_into(reducer.as_ref(), table, file, &output_path)
        })
        .await
        .map_err(|e| TaskError::Panic(format!("reduce worker aborted: {e}")))??;

        Ok(match end {
            PollEnd::Done => ReduceOutcome::Done {
                mappers: processed,
                keys,
                records,
            },
            PollEnd::TimedOut => ReduceOutcome::TimedOut {
                processed,
                total: self.mappers,
                keys,
                records,
            },
        })
    }

    /// Poll the store until every mapper is processed or retries run out
    async fn collect(&self) -> TaskResult<Collected> {
        let mut table = GroupedTable::new();
        let mut processed: HashSet<PathBuf> = HashSet::new();
        let mut completed = 0;
        let mut retries = 0;
        let max_retries = self.settings.max_retries;

        while completed < self.mappers && retries < max_retries {
            let dirs = match self.store.list_mapper_dirs().await {
                Ok(dirs) => dirs,
                Err(e) => {
                    retries += 1;
                    debug!(
                        partition = self.partition,
                        "Listing {} failed ({}), retry {}/{}",
                        self.store.root().display(),
                        e,
                        retries,
                        max_retries
                    );
                    tokio::time::sleep(self.settings.list_retry_interval).await;
                    continue;
                }
            };

            for dir in dirs {
                if processed.contains(&dir) {
                    continue;
                }

                match ShuffleStore::marker_state(&dir).await {
                    Ok(MarkerState::Pending) => continue,
                    Ok(MarkerState::Failed) => {
                        warn!(
                            partition = self.partition,
                            "Reducer {}: {} failed, treating it as empty",
                            self.partition,
                            dir_name(&dir)
                        );
                    }
                    Ok(MarkerState::Complete) => {
                        let values = self.consume(&dir, &mut table).await?;
                        trace!(
                            partition = self.partition,
                            values,
                            "Consumed {}",
                            dir_name(&dir)
                        );
                    }
                    Err(e) => {
                        debug!(
                            partition = self.partition,
                            "Could not read markers of {}: {}",
                            dir_name(&dir),
                            e
                        );
                        continue;
                    }
                }

                processed.insert(dir);
                completed += 1;
                info!(
                    partition = self.partition,
                    "Reducer {}: processed {}/{} mappers",
                    self.partition,
                    completed,
                    self.mappers
                );
            }

            if completed < self.mappers {
                retries += 1;
                tokio::time::sleep(self.settings.poll_interval).await;
                debug!(
                    partition = self.partition,
                    "Reducer {}: waiting... retry {}/{}",
                    self.partition,
                    retries,
                    max_retries
                );
            }
        }

        let end = if completed >= self.mappers {
            PollEnd::Done
        } else {
            PollEnd::TimedOut
        };

        Ok(Collected {
            table,
            processed: completed,
            end,
        })
    }

    /// Read this task's partition file from a completed mapper, then delete it
    ///
    /// Returns the number of values added to the table.
    async fn consume(&self, mapper_dir: &Path, table: &mut GroupedTable) -> TaskResult<usize> {
        let path = partition_path(mapper_dir, self.partition);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(
                    partition = self.partition,
                    "Reducer {}: no data in {}",
                    self.partition,
                    dir_name(mapper_dir)
                );
                return Ok(0);
            }
            Err(e) => return Err(TaskError::read(&path, e)),
        };

        let mut lines = BufReader::new(file).lines();
        let mut added = 0;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| TaskError::read(&path, e))?
        {
            match split_line(&line) {
                Some((key, value)) => {
                    table.entry(key.to_string()).or_default().push(value.to_string());
                    added += 1;
                }
                None => trace!(partition = self.partition, "Skipping malformed line {:?}", line),
            }
        }

        if let Err(e) = fs::remove_file(&path).await {
            warn!(
                partition = self.partition,
                "Failed to delete consumed partition file {}: {}",
                path.display(),
                e
            );
        }

        Ok(added)
    }
}

/// Invoke the user reducer once per key, in sorted key order
fn reduce_into(
    reducer: &dyn Reducer,
    table: GroupedTable,
    file: std::fs::File,
    output_path: &Path,
) -> TaskResult<u64> {
    let mut writer = std::io::BufWriter::new(file);
    let mut emitter = CollectingEmitter::new();
    let mut written = 0;

    for (key, values) in table {
        guard_user(|| reducer.reduce(&key, &values, &mut emitter))?;

        for record in emitter.drain() {
            writeln!(writer, "{}", encode_line(&record.key, &record.value))
                .map_err(|e| TaskError::write(output_path, e))?;
            written += 1;
        }
    }

    writer.flush().map_err(|e| TaskError::write(output_path, e))?;
    Ok(written)
}

/// `mapper <id>` for store directories, the plain path otherwise
fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .and_then(|name| parse_mapper_id(&name.to_string_lossy()))
        .map(|id| format!("mapper {id}"))
        .unwrap_or_else(|| dir.display().to_string())
}
