//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one tagged line per [`AppEvent`]
//! to the `log` facade.  Tags keep the console greppable:
//! `MODE`, `COUNTDOWN`, `NET`, `CMD`, `SYNC`, `STORE`.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::sync::SyncOutcome;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { mode, source } => {
                info!("MODE | started in {} (source={:?})", mode.label(), source);
            }
            AppEvent::ModeChanged { from, to, source } => {
                info!("MODE | {} -> {} (source={:?})", from.label(), to.label(), source);
            }
            AppEvent::ConnectivityChanged { reachable } => {
                info!("NET | {}", if *reachable { "reachable" } else { "unreachable" });
            }
            AppEvent::CountdownStarted {
                started_at_ms,
                duration_ms,
            } => {
                info!(
                    "COUNTDOWN | started at {} for {}s",
                    started_at_ms,
                    duration_ms / 1000
                );
            }
            AppEvent::CountdownStatus {
                elapsed_ms,
                remaining_ms,
            } => {
                info!(
                    "COUNTDOWN | elapsed={}s remaining={}s",
                    elapsed_ms / 1000,
                    remaining_ms / 1000
                );
            }
            AppEvent::CountdownCancelled { remaining_ms } => {
                info!("COUNTDOWN | cancelled with {}s left", remaining_ms / 1000);
            }
            AppEvent::CountdownExpired => info!("COUNTDOWN | expired"),
            AppEvent::OverrideSuppressed => {
                info!("NET | restored, staying offline (command override)");
            }
            AppEvent::CommandApplied { kind } => info!("CMD | {} applied", kind.label()),
            AppEvent::CommandIgnored { kind, mode } => {
                info!("CMD | {} ignored in {}", kind.label(), mode.label());
            }
            AppEvent::CommandRejected { reason } => warn!("CMD | rejected: {reason}"),
            AppEvent::SyncEligible => info!("SYNC | eligible on reconnect"),
            AppEvent::SyncStarted { items } => info!("SYNC | started, {items} items"),
            AppEvent::SyncFinished(outcome) => match outcome {
                SyncOutcome::Success(n) => info!("SYNC | ok, {n} items"),
                SyncOutcome::Skipped(why) => info!("SYNC | skipped: {why}"),
                SyncOutcome::Failure(e) => warn!("SYNC | failed: {e}"),
            },
            AppEvent::PersistenceFailed { key, error } => {
                warn!("STORE | write of {key} failed: {error}");
            }
        }
    }
}
