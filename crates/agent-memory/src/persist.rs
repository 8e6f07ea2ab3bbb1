//! Snapshot storage backends.
//!
//! - [`FsSnapshotStore`]: `<dir>/memory.json`, written atomically
//! - [`InMemorySnapshotStore`]: in-process fake for tests and ephemeral sessions
//!
//! I/O failures surface as [`MemoryError::CodecIo`] and are never retried.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::action::ActionRegistry;
use crate::codec;
use crate::error::{MemoryError, MemoryResult};
use crate::obs;
use crate::store::MemoryStore;

/// File name of the snapshot inside a storage directory.
pub const SNAPSHOT_FILE: &str = "memory.json";

/// Somewhere a [`MemoryStore`] snapshot can be saved to and loaded from.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist the log of `store`, replacing any previous snapshot.
    async fn save(&self, store: &MemoryStore) -> MemoryResult<()>;

    /// Load and rebuild a store. Fails if no snapshot exists.
    async fn load(&self, registry: &ActionRegistry) -> MemoryResult<MemoryStore>;

    async fn exists(&self) -> MemoryResult<bool>;

    /// Load if a snapshot exists, otherwise start empty.
    async fn load_or_default(&self, registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
        if self.exists().await? {
            self.load(registry).await
        } else {
            Ok(MemoryStore::new())
        }
    }
}

/// Snapshot stored as `memory.json` in a directory.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }
}

/// Write `bytes` to `path` via a temp file in `dir` that is renamed into
/// place. The temp file is removed on drop if it was never persisted.
fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> MemoryResult<()> {
    fs::create_dir_all(dir).map_err(|e| MemoryError::codec_io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(&format!(".{SNAPSHOT_FILE}."))
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| MemoryError::codec_io(dir, e))?;
    let tmp_path = tmp.path().to_path_buf();
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| MemoryError::codec_io(tmp_path, e))?;
    tmp.persist(path)
        .map_err(|e| MemoryError::codec_io(path, e.error))?;
    Ok(())
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn save(&self, store: &MemoryStore) -> MemoryResult<()> {
        let bytes = codec::to_bytes(store)?;
        let len = bytes.len();
        let dir = self.dir.clone();
        let path = self.path();
        let target = path.clone();

        // Runs to completion even if this future is dropped mid-save.
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(|e| MemoryError::codec_io(&path, std::io::Error::other(e)))??;

        obs::emit_snapshot_saved(&path, store.count(), len);
        Ok(())
    }

    async fn load(&self, registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
        let path = self.path();
        let result = match tokio::fs::read(&path).await {
            Ok(bytes) => load_bytes(&bytes, registry),
            Err(e) => Err(MemoryError::codec_io(&path, e)),
        };
        match &result {
            Ok((records, store)) => obs::emit_snapshot_loaded(&path, *records, store.count()),
            Err(e) => obs::emit_load_failed(&path, e),
        }
        result.map(|(_, store)| store)
    }

    async fn exists(&self) -> MemoryResult<bool> {
        let path = self.path();
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| MemoryError::codec_io(&path, e))
    }
}

fn load_bytes(bytes: &[u8], registry: &ActionRegistry) -> MemoryResult<(usize, MemoryStore)> {
    let snapshot: codec::Snapshot = serde_json::from_slice(bytes)?;
    let records = snapshot.len();
    Ok((records, codec::deserialize(snapshot, registry)?))
}

/// Holds the most recent snapshot in memory.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes of the last save, if any.
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }

    /// Overwrite the held snapshot with arbitrary bytes.
    pub fn put_raw(&self, bytes: impl Into<Vec<u8>>) {
        *self.bytes.lock() = Some(bytes.into());
    }
}

const IN_MEMORY_LOCATION: &str = "<in-memory>";

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, store: &MemoryStore) -> MemoryResult<()> {
        let bytes = codec::to_bytes(store)?;
        let len = bytes.len();
        *self.bytes.lock() = Some(bytes);
        obs::emit_snapshot_saved(Path::new(IN_MEMORY_LOCATION), store.count(), len);
        Ok(())
    }

    async fn load(&self, registry: &ActionRegistry) -> MemoryResult<MemoryStore> {
        let location = Path::new(IN_MEMORY_LOCATION);
        let result = match self.bytes.lock().clone() {
            Some(bytes) => load_bytes(&bytes, registry),
            None => Err(MemoryError::codec_io(
                location,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no snapshot saved"),
            )),
        };
        match &result {
            Ok((records, store)) => obs::emit_snapshot_loaded(location, *records, store.count()),
            Err(e) => obs::emit_load_failed(location, e),
        }
        result.map(|(_, store)| store)
    }

    async fn exists(&self) -> MemoryResult<bool> {
        Ok(self.bytes.lock().is_some())
    }
}
