//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ModeController / SyncEngine (domain)
//! ```
//!
//! Driven adapters (durable store, probe, command channel, work spool,
//! event sinks) implement these traits.  The domain consumes them via
//! generics injected at call sites, so the core never touches a file,
//! socket or clock directly.
//!
//! All port errors are typed; none of them is fatal to the controller.

use crate::command::CommandMessage;
use crate::error::{CommandSourceError, ProbeError, StorageError, WorkError};

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Durable store (driven adapter: domain ↔ disk)
// ───────────────────────────────────────────────────────────────

/// Keys the domain persists.  The controller and the sync engine write
/// disjoint keys.
pub mod keys {
    /// Epoch ms at which the in-flight countdown started.
    pub const COUNTDOWN_START: &str = "countdown_start_timestamp";
    /// Epoch ms of the last successful non-empty sync.
    pub const LAST_SYNC: &str = "last_sync_timestamp";
    /// Epoch ms at which a command forced offline mode.
    pub const COMMAND_OVERRIDE: &str = "command_override_timestamp";
}

/// Synchronous, restart-durable key-value store of numbers.
///
/// Writes MUST be atomic: after a crash a key holds either the old or the
/// new value, never a torn one.
pub trait StoragePort {
    fn get_number(&self, key: &str) -> Result<Option<u64>, StorageError>;

    fn set_number(&mut self, key: &str, value: u64) -> Result<(), StorageError>;

    /// Returns `Ok(())` even if the key didn't exist.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Connectivity probe
// ───────────────────────────────────────────────────────────────

/// On-demand reachability check.  Change notifications do not go through
/// this trait: adapters post raw reports into the inbound queue.
pub trait ConnectivityPort {
    /// An error is treated as "unreachable" by the caller.
    fn probe_now(&mut self) -> Result<bool, ProbeError>;
}

// ───────────────────────────────────────────────────────────────
// Command channel
// ───────────────────────────────────────────────────────────────

pub trait CommandSourcePort {
    /// Read and clear the pending-command slot.  A message is returned at
    /// most once.
    fn fetch_pending_command(&mut self) -> Result<Option<CommandMessage>, CommandSourceError>;
}

// ───────────────────────────────────────────────────────────────
// Pending work (opaque to the domain)
// ───────────────────────────────────────────────────────────────

/// One unit of locally queued work awaiting upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub payload: Vec<u8>,
}

pub trait WorkQueuePort {
    fn pending_items(&mut self) -> Result<Vec<WorkItem>, WorkError>;

    /// Transfer one item.  Must be safe to repeat for an item that was
    /// transferred but never committed.
    fn sync_item(&mut self, item: &WorkItem) -> Result<(), WorkError>;

    /// Acknowledge a fully transferred batch so it is not offered again.
    fn commit(&mut self, items: &[WorkItem]) -> Result<(), WorkError>;

    fn pending_count(&mut self) -> Result<usize, WorkError> {
        self.pending_items().map(|items| items.len())
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: domain → log / UI / metrics)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

/// Discards everything.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}
