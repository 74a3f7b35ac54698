//! On-disk shuffle store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/mapper-<id>/part-<partition>   key\tvalue lines
//! <root>/mapper-<id>/.complete          empty, written last on success
//! <root>/mapper-<id>/.error             empty, written instead of .complete on failure
//! ```
//!
//! The store has no locking. Each mapper directory has a single writer, each
//! partition file a single reader, and the marker files are the only signal
//! passed between them.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

pub const MAPPER_DIR_PREFIX: &str = "mapper-";
pub const PARTITION_FILE_PREFIX: &str = "part-";
pub const COMPLETE_MARKER: &str = ".complete";
pub const ERROR_MARKER: &str = ".error";

/// Terminal state of a mapper as seen through its markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    /// No marker yet
    Pending,
    /// `.complete` present, all partition files are final
    Complete,
    /// `.error` present, the mapper produced no usable data
    Failed,
}

/// Name of a partition file, `part-<partition>`
pub fn partition_file_name(partition: usize) -> String {
    format!("{PARTITION_FILE_PREFIX}{partition}")
}

/// Path of partition `partition` inside a mapper directory
pub fn partition_path(mapper_dir: &Path, partition: usize) -> PathBuf {
    mapper_dir.join(partition_file_name(partition))
}

/// Mapper id encoded in a `mapper-<id>` directory name
pub fn parse_mapper_id(name: &str) -> Option<usize> {
    name.strip_prefix(MAPPER_DIR_PREFIX)?.parse().ok()
}

/// Handle on a shuffle store root
#[derive(Debug, Clone)]
pub struct ShuffleStore {
    root: PathBuf,
    keep: bool,
}

impl ShuffleStore {
    /// Create a fresh, uniquely named store root
    ///
    /// The directory is placed under `base` when given, otherwise under the
    /// system temp directory. Removal is explicit, see [`ShuffleStore::teardown`].
    pub fn create(base: Option<&Path>, prefix: &str) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).keep(true);
        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };

        let root = dir.path().to_path_buf();
        debug!("Created shuffle store at {}", root.display());
        Ok(Self { root, keep: false })
    }

    /// Attach to an existing root
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            keep: false,
        }
    }

    /// Leave the store on disk when torn down
    pub fn keep_on_teardown(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mapper_dir(&self, mapper_id: usize) -> PathBuf {
        self.root.join(format!("{MAPPER_DIR_PREFIX}{mapper_id}"))
    }

    pub async fn create_mapper_dir(&self, mapper_id: usize) -> io::Result<PathBuf> {
        let dir = self.mapper_dir(mapper_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// List every `mapper-<id>` directory currently present
    ///
    /// Directories created while the listing runs may or may not be included;
    /// callers poll until they have seen all of them.
    pub async fn list_mapper_dirs(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut dirs = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if parse_mapper_id(&entry.file_name().to_string_lossy()).is_some() {
                dirs.push(entry.path());
            }
        }

        dirs.sort();
        Ok(dirs)
    }

    /// Current marker state of a mapper directory
    pub async fn marker_state(mapper_dir: &Path) -> io::Result<MarkerState> {
        if fs::try_exists(mapper_dir.join(COMPLETE_MARKER)).await? {
            return Ok(MarkerState::Complete);
        }
        if fs::try_exists(mapper_dir.join(ERROR_MARKER)).await? {
            return Ok(MarkerState::Failed);
        }
        Ok(MarkerState::Pending)
    }

    pub async fn mark_complete(mapper_dir: &Path) -> io::Result<()> {
        create_marker(mapper_dir, COMPLETE_MARKER).await
    }

    pub async fn mark_failed(mapper_dir: &Path) -> io::Result<()> {
        create_marker(mapper_dir, ERROR_MARKER).await
    }

    /// Remove the store root unless it is configured to be kept
    pub async fn teardown(&self) -> io::Result<()> {
        if self.keep {
            debug!("Keeping shuffle store at {}", self.root.display());
            return Ok(());
        }

        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                debug!("Removed shuffle store at {}", self.root.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

const REMOVE_ATTEMPTS: usize = 3;

/// Blocking best-effort removal, for use outside the async runtime
///
/// Tasks may still be writing while this runs, so a removal that races with
/// a new file is retried.
pub fn remove_root(root: &Path) {
    for attempt in 1..=REMOVE_ATTEMPTS {
        match std::fs::remove_dir_all(root) {
            Ok(()) => return,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return,
            Err(e) if attempt == REMOVE_ATTEMPTS => {
                warn!("Failed to clean shuffle store {}: {}", root.display(), e);
            }
            Err(e) => debug!("Retrying removal of {}: {}", root.display(), e),
        }
    }
}

// Markers are empty, so creating the file is the whole write and a reader
// can never see a partial one.
async fn create_marker(mapper_dir: &Path, name: &str) -> io::Result<()> {
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(mapper_dir.join(name))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_naming() {
        let store = ShuffleStore::open("/tmp/store");
        let dir = store.mapper_dir(3);
        assert_eq!(dir, PathBuf::from("/tmp/store/mapper-3"));
        assert_eq!(
            partition_path(&dir, 1),
            PathBuf::from("/tmp/store/mapper-3/part-1")
        );
        assert_eq!(parse_mapper_id("mapper-12"), Some(12));
        assert_eq!(parse_mapper_id("mapper-x"), None);
        assert_eq!(parse_mapper_id("other-1"), None);
    }

    #[tokio::test]
    async fn test_create_under_base_with_prefix() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::create(Some(base.path()), "mapreduce").unwrap();

        assert!(store.root().is_dir());
        assert!(store.root().starts_with(base.path()));
        let name = store.root().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("mapreduce"));

        store.teardown().await.unwrap();
        assert!(!store.root().exists());
    }

    #[tokio::test]
    async fn test_list_only_mapper_dirs() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::open(base.path());
        store.create_mapper_dir(1).await.unwrap();
        store.create_mapper_dir(0).await.unwrap();
        std::fs::create_dir(base.path().join("unrelated")).unwrap();
        std::fs::create_dir(base.path().join("mapper-tmp")).unwrap();
        std::fs::write(base.path().join("notes.txt"), "x").unwrap();

        let dirs = store.list_mapper_dirs().await.unwrap();
        assert_eq!(dirs, vec![store.mapper_dir(0), store.mapper_dir(1)]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_error() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::open(base.path().join("gone"));
        assert!(store.list_mapper_dirs().await.is_err());
    }

    #[tokio::test]
    async fn test_marker_states() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::open(base.path());
        let ok_dir = store.create_mapper_dir(0).await.unwrap();
        let bad_dir = store.create_mapper_dir(1).await.unwrap();

        assert_eq!(
            ShuffleStore::marker_state(&ok_dir).await.unwrap(),
            MarkerState::Pending
        );

        ShuffleStore::mark_complete(&ok_dir).await.unwrap();
        ShuffleStore::mark_failed(&bad_dir).await.unwrap();

        assert_eq!(
            ShuffleStore::marker_state(&ok_dir).await.unwrap(),
            MarkerState::Complete
        );
        assert_eq!(
            ShuffleStore::marker_state(&bad_dir).await.unwrap(),
            MarkerState::Failed
        );
        assert_eq!(std::fs::metadata(ok_dir.join(COMPLETE_MARKER)).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_marker_is_created_once() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::open(base.path());
        let dir = store.create_mapper_dir(0).await.unwrap();

        ShuffleStore::mark_complete(&dir).await.unwrap();
        let second = ShuffleStore::mark_complete(&dir).await;
        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_keep_on_teardown() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::create(Some(base.path()), "keep")
            .unwrap()
            .keep_on_teardown(true);

        store.teardown().await.unwrap();
        assert!(store.root().exists());
    }

    #[tokio::test]
    async fn test_teardown_twice_is_ok() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::create(Some(base.path()), "twice").unwrap();
        store.create_mapper_dir(0).await.unwrap();

        store.teardown().await.unwrap();
        store.teardown().await.unwrap();
        remove_root(store.root());
    }

    #[tokio::test]
    async fn test_listing_while_dirs_appear() {
        let base = TempDir::new().unwrap();
        let store = ShuffleStore::open(base.path());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for id in 0..20 {
                    store.create_mapper_dir(id).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut seen = 0;
        while seen < 20 {
            seen = store.list_mapper_dirs().await.unwrap().len();
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(seen, 20);
    }
}
