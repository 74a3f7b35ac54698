//! Map task
//!
//! Reads one input file line by line, feeds each line to the user mapper and
//! routes emitted records into `part-<partition>` files inside the task's own
//! mapper directory. The directory ends with exactly one marker: `.complete`
//! when every partition file is final, `.error` otherwise.
//!
//! The read/map/write loop runs on the blocking pool, so a slow or stuck
//! mapper never holds a runtime worker that reducers need for polling.

use super::errors::{guard_user, TaskError, TaskResult};
use super::partition::partition;
use super::record::{encode_line, Emitter};
use super::shuffle::{partition_path, ShuffleStore};
use crate::functions::{Mapper, UserError};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How a map task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MapOutcome {
    Completed {
        lines: u64,
        records: u64,
    },
    Failed {
        reason: String,
    },
}

impl MapOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, MapOutcome::Completed { .. })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MapStats {
    lines: u64,
    records: u64,
}

/// One unit of map work: an input file and the directory it writes into
#[derive(Clone)]
pub struct MapTask {
    id: usize,
    input: PathBuf,
    dir: PathBuf,
    reducers: usize,
    buffer_size: usize,
    mapper: Arc<dyn Mapper>,
}

impl MapTask {
    pub fn new(
        id: usize,
        input: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        reducers: usize,
        mapper: Arc<dyn Mapper>,
    ) -> Self {
        Self {
            id,
            input: input.into(),
            dir: dir.into(),
            reducers,
            buffer_size: 1000,
            mapper,
        }
    }

    /// Records held per partition before they are written out
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Run to completion, leaving exactly one marker behind
    ///
    /// Failures are absorbed here; the caller only sees the outcome.
    pub async fn run(self) -> MapOutcome {
        info!(
            mapper_id = self.id,
            "Starting mapper for {}",
            self.input.display()
        );

        let worker = self.clone();
        let result = match tokio::task::spawn_blocking(move || worker.execute()).await {
            Ok(result) => result,
            Err(e) => Err(TaskError::Panic(format!("map worker aborted: {e}"))),
        };
        let result = match result {
            Ok(stats) => ShuffleStore::mark_complete(&self.dir)
                .await
                .map(|()| stats)
                .map_err(|source| TaskError::Marker {
                    dir: self.dir.clone(),
                    source,
                }),
            Err(e) => Err(e),
        };

        match result {
            Ok(stats) => {
                info!(
                    mapper_id = self.id,
                    lines = stats.lines,
                    records = stats.records,
                    "Mapper completed"
                );
                MapOutcome::Completed {
                    lines: stats.lines,
                    records: stats.records,
                }
            }
            Err(e) => {
                if e.is_user_fault() {
                    warn!(mapper_id = self.id, "Mapper failed in user code: {}", e);
                } else {
                    error!(mapper_id = self.id, "Mapper failed: {}", e);
                }
                if let Err(marker_err) = ShuffleStore::mark_failed(&self.dir).await {
                    error!(
                        mapper_id = self.id,
                        "Failed to write error marker in {}: {}",
                        self.dir.display(),
                        marker_err
                    );
                }
                MapOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn execute(&self) -> TaskResult<MapStats> {
        let file = File::open(&self.input).map_err(|e| TaskError::read(&self.input, e))?;

        let mut emitter = PartitionEmitter::new(self.reducers, self.buffer_size);
        let mut writers = PartitionWriters::new(self.dir.clone(), self.reducers);
        let mut stats = MapStats::default();

        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| TaskError::read(&self.input, e))?;
            stats.lines += 1;
            guard_user(|| self.mapper.map(&line, &mut emitter))?;

            for p in emitter.full_partitions() {
                writers.append(p, emitter.take(p))?;
            }
        }

        for p in 0..self.reducers {
            let pending = emitter.take(p);
            if !pending.is_empty() {
                writers.append(p, pending)?;
            }
        }

        stats.records = emitter.emitted();
        let empty = writers.finish()?;
        debug!(
            mapper_id = self.id,
            empty_partitions = empty,
            "Partition files closed"
        );

        Ok(stats)
    }
}

/// Map-side emitter: routes records to per-partition line buffers
pub(crate) struct PartitionEmitter {
    buffers: Vec<Vec<String>>,
    buffer_size: usize,
    emitted: u64,
}

impl PartitionEmitter {
    pub(crate) fn new(reducers: usize, buffer_size: usize) -> Self {
        Self {
            buffers: vec![Vec::new(); reducers],
            buffer_size,
            emitted: 0,
        }
    }

    fn full_partitions(&self) -> Vec<usize> {
        self.buffers
            .iter()
            .enumerate()
            .filter(|(_, buffer)| buffer.len() >= self.buffer_size)
            .map(|(p, _)| p)
            .collect()
    }

    fn take(&mut self, p: usize) -> Vec<String> {
        std::mem::take(&mut self.buffers[p])
    }

    fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl Emitter for PartitionEmitter {
    fn emit(&mut self, key: &str, value: &str) -> Result<(), UserError> {
        let p = partition(key, self.buffers.len());
        self.buffers[p].push(encode_line(key, value));
        self.emitted += 1;
        Ok(())
    }
}

/// Lazily opened buffered writers, one per partition
struct PartitionWriters {
    dir: PathBuf,
    writers: Vec<Option<BufWriter<File>>>,
}

impl PartitionWriters {
    fn new(dir: PathBuf, reducers: usize) -> Self {
        Self {
            dir,
            writers: (0..reducers).map(|_| None).collect(),
        }
    }

    fn append(&mut self, p: usize, lines: Vec<String>) -> TaskResult<()> {
        let path = partition_path(&self.dir, p);
        let writer = match &mut self.writers[p] {
            Some(writer) => writer,
            slot => {
                let file = File::create(&path).map_err(|e| TaskError::write(&path, e))?;
                slot.insert(BufWriter::new(file))
            }
        };

        for line in lines {
            writeln!(writer, "{line}").map_err(|e| TaskError::write(&path, e))?;
        }
        Ok(())
    }

    /// Flush opened writers and create empty files for the rest
    ///
    /// Returns the number of empty partition files created.
    fn finish(self) -> TaskResult<usize> {
        let mut empty = 0;
        for (p, writer) in self.writers.into_iter().enumerate() {
            let path = partition_path(&self.dir, p);
            match writer {
                Some(mut writer) => {
                    writer.flush().map_err(|e| TaskError::write(&path, e))?;
                }
                None => {
                    File::create(&path).map_err(|e| TaskError::write(&path, e))?;
                    empty += 1;
                }
            }
        }
        Ok(empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::shuffle::{COMPLETE_MARKER, ERROR_MARKER};
    use crate::functions::WordCountMapper;
    use std::path::Path;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    struct FailOn(&'static str);

    impl Mapper for FailOn {
        fn map(&self, line: &str, emit: &mut dyn Emitter) -> Result<(), UserError> {
            if line.contains(self.0) {
                return Err(UserError::other(format!("refusing {line:?}")));
            }
            emit.emit(line, "1")
        }
    }

    struct PanicOn(&'static str);

    impl Mapper for PanicOn {
        fn map(&self, line: &str, emit: &mut dyn Emitter) -> Result<(), UserError> {
            if line.contains(self.0) {
                panic!("mapper blew up");
            }
            emit.emit(line, "1")
        }
    }

    fn setup(content: &str) -> (TempDir, PathBuf, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("input.txt");
        std::fs::write(&input, content).unwrap();
        let dir = temp_dir.path().join("mapper-0");
        std::fs::create_dir(&dir).unwrap();
        (temp_dir, input, dir)
    }

    fn read_partition(dir: &Path, p: usize) -> Vec<String> {
        std::fs::read_to_string(partition_path(dir, p))
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_word_count_single_partition() {
        let (_temp, input, dir) = setup("a b a\n");
        let task = MapTask::new(0, &input, &dir, 1, Arc::new(WordCountMapper));

        let outcome = task.run().await;

        assert_eq!(outcome, MapOutcome::Completed { lines: 1, records: 3 });
        assert_eq!(read_partition(&dir, 0), vec!["a\t1", "b\t1", "a\t1"]);
        assert!(dir.join(COMPLETE_MARKER).exists());
        assert!(!dir.join(ERROR_MARKER).exists());
    }

    #[tokio::test]
    async fn test_records_routed_by_partition() {
        // With two reducers "a" lands in partition 1 and "b" in partition 0
        let (_temp, input, dir) = setup("a b\nb\n");
        let task = MapTask::new(0, &input, &dir, 2, Arc::new(WordCountMapper));

        assert!(task.run().await.is_completed());
        assert_eq!(read_partition(&dir, 0), vec!["b\t1", "b\t1"]);
        assert_eq!(read_partition(&dir, 1), vec!["a\t1"]);
    }

    #[tokio::test]
    async fn test_all_partitions_present_even_when_empty() {
        let (_temp, input, dir) = setup("a\n");
        let task = MapTask::new(0, &input, &dir, 5, Arc::new(WordCountMapper));

        assert!(task.run().await.is_completed());
        for p in 0..5 {
            assert!(partition_path(&dir, p).exists(), "part-{p} missing");
        }
        let non_empty: usize = (0..5).map(|p| read_partition(&dir, p).len()).sum();
        assert_eq!(non_empty, 1);
    }

    #[tokio::test]
    async fn test_empty_input_completes_with_empty_partitions() {
        let (_temp, input, dir) = setup("");
        let task = MapTask::new(0, &input, &dir, 3, Arc::new(WordCountMapper));

        assert_eq!(
            task.run().await,
            MapOutcome::Completed { lines: 0, records: 0 }
        );
        for p in 0..3 {
            assert_eq!(std::fs::metadata(partition_path(&dir, p)).unwrap().len(), 0);
        }
    }

    #[tokio::test]
    async fn test_small_buffer_flushes_in_order() {
        let content: String = (0..25).map(|i| format!("w{i}\n")).collect();
        let (_temp, input, dir) = setup(&content);
        let task =
            MapTask::new(0, &input, &dir, 1, Arc::new(WordCountMapper)).with_buffer_size(4);

        assert!(task.run().await.is_completed());
        let expected: Vec<String> = (0..25).map(|i| format!("w{i}\t1")).collect();
        assert_eq!(read_partition(&dir, 0), expected);
    }

    #[tokio::test]
    async fn test_user_error_writes_error_marker() {
        let (_temp, input, dir) = setup("ok\nbad\nok\n");
        let task = MapTask::new(0, &input, &dir, 2, Arc::new(FailOn("bad")));

        let outcome = task.run().await;

        match outcome {
            MapOutcome::Failed { reason } => assert!(reason.contains("refusing")),
            other => panic!("Expected Failed, got {other:?}"),
        }
        assert!(dir.join(ERROR_MARKER).exists());
        assert!(!dir.join(COMPLETE_MARKER).exists());
    }

    #[tokio::test]
    async fn test_user_panic_writes_error_marker() {
        let (_temp, input, dir) = setup("fine\nexplode\n");
        let task = MapTask::new(0, &input, &dir, 1, Arc::new(PanicOn("explode")));

        let outcome = task.run().await;

        assert!(matches!(outcome, MapOutcome::Failed { reason } if reason.contains("panicked")));
        assert!(dir.join(ERROR_MARKER).exists());
        assert!(!dir.join(COMPLETE_MARKER).exists());
    }

    #[tokio::test]
    async fn test_missing_input_writes_error_marker() {
        let (temp, _input, dir) = setup("");
        let missing = temp.path().join("nope.txt");
        let task = MapTask::new(0, &missing, &dir, 1, Arc::new(WordCountMapper));

        assert!(!task.run().await.is_completed());
        assert!(dir.join(ERROR_MARKER).exists());
    }

    #[tokio::test]
    async fn test_stalled_mapper_leaves_runtime_free() {
        let (_temp, input, dir) = setup("slow\n");
        let stall = |line: &str, emit: &mut dyn Emitter| {
            std::thread::sleep(Duration::from_millis(400));
            emit.emit(line, "1")
        };
        let handle = tokio::spawn(MapTask::new(0, &input, &dir, 1, Arc::new(stall)).run());

        // Single-threaded runtime: the timer only fires on time if the
        // mapper is off the runtime thread
        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(!dir.join(COMPLETE_MARKER).exists());

        assert!(handle.await.unwrap().is_completed());
        assert!(dir.join(COMPLETE_MARKER).exists());
    }

    #[test]
    fn test_partition_emitter_buffers() {
        let mut emitter = PartitionEmitter::new(2, 2);
        emitter.emit("a", "1").unwrap();
        assert!(emitter.full_partitions().is_empty());
        emitter.emit("a", "2").unwrap();
        assert_eq!(emitter.full_partitions(), vec![1]);
        assert_eq!(emitter.take(1), vec!["a\t1", "a\t2"]);
        assert_eq!(emitter.emitted(), 2);
    }
}
