//! Runtime diagnostics and crash logging.
//!
//! [`Diagnostics`] is an [`EventSink`] that counts the things an operator
//! wants to see at a glance: mode changes, rejected commands, failed syncs,
//! suppressed reconnects and failed durable writes.  A snapshot is
//! serialisable for the console `status` command.
//!
//! [`install_panic_handler`] appends one line per panic to a crash log so
//! a restart loop leaves a trail.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::adapters::time::SystemClock;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::sync::SyncOutcome;
use crate::fsm::Mode;

/// Counters accumulated since startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    pub mode_changes: u32,
    pub countdowns_started: u32,
    pub countdowns_cancelled: u32,
    pub countdowns_expired: u32,
    pub commands_applied: u32,
    pub commands_ignored: u32,
    pub commands_rejected: u32,
    pub overrides_suppressed: u32,
    pub syncs_ok: u32,
    pub syncs_skipped: u32,
    pub syncs_failed: u32,
    pub items_synced: u64,
    pub persistence_failures: u32,
    pub last_mode: Option<Mode>,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    report: DiagnosticsReport,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &DiagnosticsReport {
        &self.report
    }

    pub fn reset(&mut self) {
        self.report = DiagnosticsReport::default();
    }
}

impl EventSink for Diagnostics {
    fn emit(&mut self, event: &AppEvent) {
        let r = &mut self.report;
        match event {
            AppEvent::Started { mode, .. } => r.last_mode = Some(*mode),
            AppEvent::ModeChanged { to, .. } => {
                r.mode_changes += 1;
                r.last_mode = Some(*to);
            }
            AppEvent::CountdownStarted { .. } => r.countdowns_started += 1,
            AppEvent::CountdownCancelled { .. } => r.countdowns_cancelled += 1,
            AppEvent::CountdownExpired => r.countdowns_expired += 1,
            AppEvent::OverrideSuppressed => r.overrides_suppressed += 1,
            AppEvent::CommandApplied { .. } => r.commands_applied += 1,
            AppEvent::CommandIgnored { .. } => r.commands_ignored += 1,
            AppEvent::CommandRejected { .. } => r.commands_rejected += 1,
            AppEvent::SyncFinished(outcome) => match outcome {
                SyncOutcome::Success(n) => {
                    r.syncs_ok += 1;
                    r.items_synced += *n as u64;
                }
                SyncOutcome::Skipped(_) => r.syncs_skipped += 1,
                SyncOutcome::Failure(_) => r.syncs_failed += 1,
            },
            AppEvent::PersistenceFailed { .. } => r.persistence_failures += 1,
            AppEvent::ConnectivityChanged { .. }
            | AppEvent::CountdownStatus { .. }
            | AppEvent::SyncEligible
            | AppEvent::SyncStarted { .. } => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Longest panic reason kept in the crash log.
const MAX_REASON: usize = 256;

/// Install a panic hook that logs the reason and appends
/// `<epoch_ms> <reason>` to `crash_log`.
///
/// Call once during init.  A failed append is logged and otherwise
/// ignored; the default hook still runs afterwards.
pub fn install_panic_handler(crash_log: PathBuf) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        let reason = truncate(reason, MAX_REASON);

        log::error!("PANIC: {}", reason);

        let line = format!("{} {}\n", SystemClock::new().now_ms(), reason.replace('\n', " "));
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&crash_log)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = written {
            log::error!("panic handler: crash log not written: {e}");
        }

        default_hook(info);
    }));
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
