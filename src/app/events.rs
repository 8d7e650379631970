//! Outbound application events.
//!
//! The [`ModeController`](super::service::ModeController) and
//! [`Runtime`](super::runtime::Runtime) emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log a line, update a UI, bump a
//! counter.

use crate::command::{CommandKind, Rejection};
use crate::error::StorageError;
use crate::fsm::{Mode, TriggerSource};

use super::sync::SyncOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Restore finished (carries the recovered mode).
    Started { mode: Mode, source: TriggerSource },

    ModeChanged {
        from: Mode,
        to: Mode,
        source: TriggerSource,
    },

    /// Debounced connectivity changed.
    ConnectivityChanged { reachable: bool },

    CountdownStarted { started_at_ms: u64, duration_ms: u64 },

    /// Read-only periodic progress while counting down.
    CountdownStatus { elapsed_ms: u64, remaining_ms: u64 },

    /// Connectivity returned before the deadline.
    CountdownCancelled { remaining_ms: u64 },

    CountdownExpired,

    /// Connectivity returned while a command holds the device offline.
    OverrideSuppressed,

    CommandApplied { kind: CommandKind },

    /// Authenticated, but a no-op in the current mode.
    CommandIgnored { kind: CommandKind, mode: Mode },

    CommandRejected { reason: Rejection },

    /// Network-sourced offline reached; a return sync is allowed.
    SyncEligible,

    SyncStarted { items: usize },

    SyncFinished(SyncOutcome),

    /// A durable write failed; the transition went ahead in memory.
    PersistenceFailed {
        key: &'static str,
        error: StorageError,
    },
}
