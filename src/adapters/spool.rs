//! Spool-directory work queue.
//!
//! Implements [`WorkQueuePort`] over three sibling directories:
//!
//! ```text
//! <root>/pending/<id>   queued while offline
//! <root>/outbox/<id>    transferred, awaiting commit
//! <root>/synced/<id>    acknowledged
//! ```
//!
//! `sync_item` copies into `outbox/` (overwriting, so a repeat after a
//! crash is harmless).  `commit` moves each item from `pending/` to
//! `synced/` and clears its outbox copy.  Items are offered in file-name
//! order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::ports::{WorkItem, WorkQueuePort};
use crate::error::WorkError;

pub struct SpoolQueue {
    root: PathBuf,
}

impl SpoolQueue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Queue a work item (producer side).
    pub fn enqueue(&self, id: &str, payload: &[u8]) -> io::Result<()> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad item id"));
        }
        let pending = self.dir("pending");
        fs::create_dir_all(&pending)?;
        fs::write(pending.join(id), payload)
    }

    pub fn synced_count(&self) -> usize {
        list_files(&self.dir("synced")).map_or(0, |v| v.len())
    }
}

fn list_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    files.push(entry.path());
                }
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    files.sort();
    Ok(files)
}

impl WorkQueuePort for SpoolQueue {
    fn pending_items(&mut self) -> Result<Vec<WorkItem>, WorkError> {
        let files = list_files(&self.dir("pending")).map_err(|e| {
            warn!("spool: list failed: {e}");
            WorkError::Fetch
        })?;
        files
            .into_iter()
            .map(|path| {
                let id = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or(WorkError::Fetch)?
                    .to_owned();
                let payload = fs::read(&path).map_err(|_| WorkError::Fetch)?;
                Ok(WorkItem { id, payload })
            })
            .collect()
    }

    fn sync_item(&mut self, item: &WorkItem) -> Result<(), WorkError> {
        let outbox = self.dir("outbox");
        fs::create_dir_all(&outbox)
            .and_then(|()| fs::write(outbox.join(&item.id), &item.payload))
            .map_err(|e| {
                warn!("spool: transfer of {} failed: {e}", item.id);
                WorkError::Transfer
            })?;
        debug!("spool: {} transferred", item.id);
        Ok(())
    }

    fn commit(&mut self, items: &[WorkItem]) -> Result<(), WorkError> {
        let synced = self.dir("synced");
        fs::create_dir_all(&synced).map_err(|_| WorkError::Commit)?;
        for item in items {
            fs::rename(self.dir("pending").join(&item.id), synced.join(&item.id))
                .map_err(|e| {
                    warn!("spool: commit of {} failed: {e}", item.id);
                    WorkError::Commit
                })?;
            // The outbox copy is only a transfer marker.
            let _ = fs::remove_file(self.dir("outbox").join(&item.id));
        }
        Ok(())
    }
}
