//! Pending-command slot on disk.
//!
//! Implements [`CommandSourcePort`].  A receiver that gets a command
//! while the controller is not running drops it into a single JSON file;
//! the next start (or foreground resume) reads it once and removes it.
//! A newer delivery overwrites an unread older one.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::CommandSourcePort;
use crate::command::CommandMessage;
use crate::error::CommandSourceError;

pub struct CommandInbox {
    path: PathBuf,
}

impl CommandInbox {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `msg` as the pending command (receiver side).
    pub fn deliver(&self, msg: &CommandMessage) -> Result<(), CommandSourceError> {
        let json = serde_json::to_vec(msg).map_err(|_| CommandSourceError::Io)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("inbox: write {} failed: {e}", self.path.display());
                CommandSourceError::Io
            })
    }

    pub fn has_pending(&self) -> bool {
        self.path.exists()
    }
}

impl CommandSourcePort for CommandInbox {
    fn fetch_pending_command(&mut self) -> Result<Option<CommandMessage>, CommandSourceError> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("inbox: read {} failed: {e}", self.path.display());
                return Err(CommandSourceError::Io);
            }
        };
        // Clear before parsing: an unreadable slot must not be retried forever.
        fs::remove_file(&self.path).map_err(|_| CommandSourceError::Io)?;
        match serde_json::from_slice(&bytes) {
            Ok(msg) => {
                info!("inbox: pending command consumed");
                Ok(Some(msg))
            }
            Err(e) => {
                warn!("inbox: discarding malformed pending command: {e}");
                Ok(None)
            }
        }
    }
}
