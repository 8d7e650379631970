//! Durable key-value store adapters.
//!
//! Implements [`StoragePort`] twice:
//!
//! - [`FileStore`] keeps every key in one postcard-encoded map on disk.
//!   Each write re-encodes the map into `<file>.tmp`, fsyncs it and
//!   renames it over the live file, so a crash leaves either the old or
//!   the new map and never a torn one.
//! - [`MemoryStore`] is a `HashMap` for tests and simulation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::StoragePort;
use crate::error::StorageError;

pub struct FileStore {
    path: PathBuf,
    cache: BTreeMap<String, u64>,
}

impl FileStore {
    /// Open (or create) the store at `path`.  A corrupted file is an
    /// error; the caller decides whether to start over.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let cache = match fs::read(&path) {
            Ok(bytes) => postcard::from_bytes(&bytes).map_err(|e| {
                warn!("store: {} undecodable: {e}", path.display());
                StorageError::Corrupted
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("store: cannot read {}: {e}", path.display());
                return Err(StorageError::Io);
            }
        };
        info!("store: {} opened, {} keys", path.display(), cache.len());
        Ok(Self { path, cache })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, map: &BTreeMap<String, u64>) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(map).map_err(|_| StorageError::Corrupted)?;
        let tmp = self.path.with_extension("tmp");
        let write = || -> std::io::Result<()> {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir)?;
            }
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| {
            warn!("store: write {} failed: {e}", self.path.display());
            if e.raw_os_error() == Some(28) {
                StorageError::Full
            } else {
                StorageError::Io
            }
        })
    }

    /// Apply `change` to a copy, flush it, and only then adopt it, so the
    /// cache never runs ahead of the disk.
    fn update(&mut self, change: impl FnOnce(&mut BTreeMap<String, u64>)) -> Result<(), StorageError> {
        let mut next = self.cache.clone();
        change(&mut next);
        if next == self.cache {
            return Ok(());
        }
        self.flush(&next)?;
        self.cache = next;
        Ok(())
    }
}

impl StoragePort for FileStore {
    fn get_number(&self, key: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.cache.get(key).copied())
    }

    fn set_number(&mut self, key: &str, value: u64) -> Result<(), StorageError> {
        self.update(|m| {
            m.insert(key.to_owned(), value);
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.update(|m| {
            m.remove(key);
        })
    }
}

/// In-memory store.  Not durable; for tests and simulation.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    map: HashMap<String, u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl StoragePort for MemoryStore {
    fn get_number(&self, key: &str) -> Result<Option<u64>, StorageError> {
        Ok(self.map.get(key).copied())
    }

    fn set_number(&mut self, key: &str, value: u64) -> Result<(), StorageError> {
        self.map.insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }
}
