//! Return-to-online synchronization.
//!
//! ```text
//!  guards ──▶ debounce ──▶ fetch ──▶ [0 items] ──▶ Success(0)
//!                            │
//!                            ▼
//!                 sync each (abort on first failure)
//!                            │
//!                            ▼
//!             commit batch ──▶ persist last_sync ──▶ Success(n)
//! ```
//!
//! The batch is all-or-nothing: items are acknowledged only after every
//! transfer succeeded, so a crash or failure mid-batch leaves the whole
//! batch pending for the next attempt.  No automatic retry.

use core::fmt;

use log::{info, warn};

use crate::fsm::{Mode, TriggerSource};

use super::events::AppEvent;
use super::ports::{keys, EventSink, StoragePort, WorkQueuePort};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A command holds the device offline.
    AuthoritativeOffline,
    NotOffline,
    InProgress,
    /// A successful sync finished inside the debounce window.
    RecentSuccess,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthoritativeOffline => write!(f, "offline by command"),
            Self::NotOffline => write!(f, "not offline"),
            Self::InProgress => write!(f, "sync already running"),
            Self::RecentSuccess => write!(f, "synced recently"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success(usize),
    Skipped(SkipReason),
    Failure(String),
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Last-attempt memory.  Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRecord {
    pub timestamp_ms: u64,
    pub success: bool,
    pub items_synced: usize,
    pub error: Option<String>,
}

/// The controller state the engine is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncView {
    pub mode: Mode,
    pub source: TriggerSource,
}

pub struct SyncEngine {
    debounce_ms: u64,
    in_progress: bool,
    last: Option<SyncRecord>,
    /// Pending count seen by the last attempt that reached the fetch.
    last_pending: Option<usize>,
}

impl SyncEngine {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            in_progress: false,
            last: None,
            last_pending: None,
        }
    }

    pub fn attempt_return_to_online(
        &mut self,
        view: SyncView,
        now_ms: u64,
        io: &mut (impl WorkQueuePort + StoragePort),
        sink: &mut impl EventSink,
    ) -> SyncOutcome {
        let outcome = self.run(view, now_ms, io, sink);
        match &outcome {
            SyncOutcome::Success(n) => info!("SYNC: success, {n} items"),
            SyncOutcome::Skipped(why) => info!("SYNC: skipped ({why})"),
            SyncOutcome::Failure(msg) => warn!("SYNC: failed: {msg}"),
        }
        sink.emit(&AppEvent::SyncFinished(outcome.clone()));
        outcome
    }

    fn run(
        &mut self,
        view: SyncView,
        now_ms: u64,
        io: &mut (impl WorkQueuePort + StoragePort),
        sink: &mut impl EventSink,
    ) -> SyncOutcome {
        if let Some(reason) = self.precondition(view, now_ms) {
            return SyncOutcome::Skipped(reason);
        }

        let items = match io.pending_items() {
            Ok(items) => items,
            Err(e) => return self.fail(now_ms, format!("{e}")),
        };
        self.last_pending = Some(items.len());

        if items.is_empty() {
            self.record(now_ms, true, 0, None);
            return SyncOutcome::Success(0);
        }

        self.in_progress = true;
        sink.emit(&AppEvent::SyncStarted { items: items.len() });
        info!("SYNC: started, {} pending", items.len());

        let transferred = items.iter().try_for_each(|item| {
            io.sync_item(item)
                .map_err(|e| format!("item {}: {e}", item.id))
        });
        let result = transferred.and_then(|()| io.commit(&items).map_err(|e| format!("{e}")));
        self.in_progress = false;

        if let Err(msg) = result {
            return self.fail(now_ms, msg);
        }

        if let Err(e) = io.set_number(keys::LAST_SYNC, now_ms) {
            warn!("SYNC: could not persist {}: {e}", keys::LAST_SYNC);
            sink.emit(&AppEvent::PersistenceFailed {
                key: keys::LAST_SYNC,
                error: e,
            });
        }
        self.last_pending = Some(0);
        self.record(now_ms, true, items.len(), None);
        SyncOutcome::Success(items.len())
    }

    fn precondition(&self, view: SyncView, now_ms: u64) -> Option<SkipReason> {
        if view.source == TriggerSource::Command {
            return Some(SkipReason::AuthoritativeOffline);
        }
        if view.mode != Mode::Offline {
            return Some(SkipReason::NotOffline);
        }
        if self.in_progress {
            return Some(SkipReason::InProgress);
        }
        match &self.last {
            Some(r) if r.success && now_ms.saturating_sub(r.timestamp_ms) < self.debounce_ms => {
                Some(SkipReason::RecentSuccess)
            }
            _ => None,
        }
    }

    /// Zero-item fast path check.  A fetch failure counts as "not empty".
    pub fn pending_is_empty(&self, io: &mut impl WorkQueuePort) -> bool {
        io.pending_count().is_ok_and(|n| n == 0)
    }

    fn fail(&mut self, now_ms: u64, msg: String) -> SyncOutcome {
        self.record(now_ms, false, 0, Some(msg.clone()));
        SyncOutcome::Failure(msg)
    }

    fn record(&mut self, now_ms: u64, success: bool, items_synced: usize, error: Option<String>) {
        self.last = Some(SyncRecord {
            timestamp_ms: now_ms,
            success,
            items_synced,
            error,
        });
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn last_record(&self) -> Option<&SyncRecord> {
        self.last.as_ref()
    }

    /// Error of the last attempt, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last.as_ref().and_then(|r| r.error.as_deref())
    }

    pub fn last_pending(&self) -> Option<usize> {
        self.last_pending
    }
}
