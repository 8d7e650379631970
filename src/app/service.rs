//! Mode controller — the hexagonal core.
//!
//! [`ModeController`] owns the FSM, its context, the timer table and the
//! sync engine.  It is the single writer of the mode and of the persisted
//! countdown and override keys.  All I/O flows through port traits
//! injected at call sites.
//!
//! ```text
//!  Debouncer ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                │     ModeController      │
//!  CommandGate ─▶│  FSM · timers · sync    │ ◀─▶ StoragePort
//!                └─────────────────────────┘ ◀─▶ WorkQueuePort
//! ```
//!
//! Within one step the FSM decides, then queued actions run in order
//! (durable writes first, then timers), then events go out.  A failed
//! write is reported and the transition stands in memory.

use log::{info, warn};

use crate::command::{Command, CommandKind};
use crate::config::FallbackConfig;
use crate::connectivity::ConnectivityChange;
use crate::fsm::context::{Action, CountdownState, FsmContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Decision, Fsm, Mode, Trigger, TriggerSource};
use crate::scheduler::{TimerKind, TimerTable};

use super::events::AppEvent;
use super::ports::{keys, EventSink, StoragePort, WorkQueuePort};
use super::sync::{SkipReason, SyncEngine, SyncOutcome, SyncRecord, SyncView};

/// Read-only view for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSnapshot {
    pub mode: Mode,
    pub source: TriggerSource,
    pub countdown_started_at_ms: Option<u64>,
    pub remaining_ms: u64,
    /// Last debounced connectivity; `None` before the first settle.
    pub connected: Option<bool>,
    pub sync_in_progress: bool,
    pub last_sync: Option<SyncRecord>,
    pub last_sync_error: Option<String>,
    pub pending_items: Option<usize>,
}

pub struct ModeController {
    fsm: Fsm,
    ctx: FsmContext,
    timers: TimerTable,
    sync: SyncEngine,
    status_interval_ms: u64,
    connected: Option<bool>,
}

impl ModeController {
    /// Does **not** read storage; call [`restore`](Self::restore) next.
    pub fn new(config: &FallbackConfig) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), Mode::Online),
            ctx: FsmContext::new(config.countdown_duration_ms),
            timers: TimerTable::new(),
            sync: SyncEngine::new(config.sync_debounce_ms),
            status_interval_ms: config.status_interval_ms,
            connected: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Rebuild the mode from durable state after a (re)start.
    ///
    /// A persisted override wins over any countdown.  A countdown whose
    /// deadline passed while the process was dead goes straight to
    /// `Offline{Network}` with no timer armed.
    pub fn restore(&mut self, now_ms: u64, store: &mut impl StoragePort, sink: &mut impl EventSink) {
        self.ctx.now_ms = now_ms;
        let override_since = read_key(store, keys::COMMAND_OVERRIDE, sink);
        let countdown_start = read_key(store, keys::COUNTDOWN_START, sink);

        if let Some(since) = override_since {
            if countdown_start.is_some() {
                write_key(store, keys::COUNTDOWN_START, None, sink);
            }
            self.ctx.source = TriggerSource::Command;
            self.ctx.override_since = Some(since);
            self.fsm.resume(Mode::Offline, &mut self.ctx);
            info!("restore: command override active since {since}");
        } else if let Some(started_at_ms) = countdown_start {
            let countdown = CountdownState {
                started_at_ms,
                duration_ms: self.ctx.countdown_duration_ms,
            };
            self.ctx.source = TriggerSource::Network;
            if countdown.is_expired(now_ms) {
                write_key(store, keys::COUNTDOWN_START, None, sink);
                self.fsm.resume(Mode::Offline, &mut self.ctx);
                sink.emit(&AppEvent::CountdownExpired);
                info!("restore: countdown expired while stopped");
            } else {
                self.ctx.countdown = Some(countdown);
                self.fsm.resume(Mode::CountingDown, &mut self.ctx);
                info!(
                    "restore: countdown resumed, {} ms left",
                    countdown.remaining_ms(now_ms)
                );
            }
        } else {
            self.fsm.resume(Mode::Online, &mut self.ctx);
        }

        self.apply_actions(now_ms, store, sink);
        sink.emit(&AppEvent::Started {
            mode: self.current_mode(),
            source: self.ctx.source,
        });
    }

    // ── Triggers ──────────────────────────────────────────────

    /// Feed a debounced connectivity change.
    pub fn on_connectivity(
        &mut self,
        change: ConnectivityChange,
        now_ms: u64,
        io: &mut (impl StoragePort + WorkQueuePort),
        sink: &mut impl EventSink,
    ) {
        let reachable = change.is_reachable();
        self.connected = Some(reachable);
        sink.emit(&AppEvent::ConnectivityChanged { reachable });

        let trigger = if reachable {
            Trigger::NetworkRestored
        } else {
            Trigger::NetworkLost
        };
        match self.step(trigger, now_ms, io, sink) {
            Decision::Suppress => {
                info!("connectivity restored, offline held by command");
                sink.emit(&AppEvent::OverrideSuppressed);
            }
            Decision::AttemptSync => {
                self.run_sync(now_ms, io, sink);
            }
            _ => {}
        }
    }

    /// Apply an authenticated command.  The gate has already de-duplicated it.
    pub fn on_command(
        &mut self,
        cmd: &Command,
        now_ms: u64,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let trigger = match cmd.kind {
            CommandKind::EnableOffline => Trigger::EnableOffline,
            CommandKind::EnableOnline => Trigger::EnableOnline,
        };
        match self.step(trigger, now_ms, store, sink) {
            Decision::Goto(_) | Decision::Retag => {
                info!("command {} applied", cmd.kind.label());
                sink.emit(&AppEvent::CommandApplied { kind: cmd.kind });
            }
            _ => {
                info!(
                    "command {} ignored in {}",
                    cmd.kind.label(),
                    self.current_mode().label()
                );
                sink.emit(&AppEvent::CommandIgnored {
                    kind: cmd.kind,
                    mode: self.current_mode(),
                });
                return;
            }
        }

        // Lifting an override while the network is known down starts the
        // normal grace period instead of claiming to be online.
        if cmd.kind == CommandKind::EnableOnline && self.connected == Some(false) {
            self.step(Trigger::NetworkLost, now_ms, store, sink);
        }
    }

    /// Manual sync.  Same guards as the automatic path.
    pub fn force_sync(
        &mut self,
        now_ms: u64,
        io: &mut (impl StoragePort + WorkQueuePort),
        sink: &mut impl EventSink,
    ) -> SyncOutcome {
        self.run_sync(now_ms, io, sink)
    }

    // ── Timers ────────────────────────────────────────────────

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_due().map(|(_, deadline)| deadline)
    }

    /// Fire the earliest due timer, if any.
    pub fn fire_next_due(
        &mut self,
        now_ms: u64,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Option<TimerKind> {
        let (kind, deadline) = self.timers.take_next_due(now_ms)?;
        match kind {
            TimerKind::CountdownComplete => {
                self.step(Trigger::CountdownExpired, deadline, store, sink);
            }
            TimerKind::StatusTick => self.status_tick(deadline, sink),
        }
        Some(kind)
    }

    fn status_tick(&self, now_ms: u64, sink: &mut impl EventSink) {
        let Some(countdown) = self.ctx.countdown else {
            return;
        };
        let elapsed_ms = countdown.elapsed_ms(now_ms);
        let remaining_ms = countdown.remaining_ms(now_ms);
        info!(
            "countdown: {}s elapsed, {}s remaining",
            elapsed_ms / 1000,
            remaining_ms / 1000
        );
        sink.emit(&AppEvent::CountdownStatus {
            elapsed_ms,
            remaining_ms,
        });
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn current_mode(&self) -> Mode {
        self.fsm.current_mode()
    }

    pub fn trigger_source(&self) -> TriggerSource {
        self.ctx.source
    }

    pub fn is_counting_down(&self) -> bool {
        self.current_mode() == Mode::CountingDown
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.ctx.countdown.map_or(0, |c| c.remaining_ms(now_ms))
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn snapshot(&self, now_ms: u64) -> ModeSnapshot {
        ModeSnapshot {
            mode: self.current_mode(),
            source: self.ctx.source,
            countdown_started_at_ms: self.ctx.countdown.map(|c| c.started_at_ms),
            remaining_ms: self.remaining_ms(now_ms),
            connected: self.connected,
            sync_in_progress: self.sync.is_in_progress(),
            last_sync: self.sync.last_record().cloned(),
            last_sync_error: self.sync.last_error().map(str::to_owned),
            pending_items: self.sync.last_pending(),
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn run_sync(
        &mut self,
        now_ms: u64,
        io: &mut (impl StoragePort + WorkQueuePort),
        sink: &mut impl EventSink,
    ) -> SyncOutcome {
        let view = SyncView {
            mode: self.current_mode(),
            source: self.ctx.source,
        };
        let outcome = self.sync.attempt_return_to_online(view, now_ms, io, sink);
        let back_online = match &outcome {
            SyncOutcome::Success(_) => true,
            // Nothing queued since the last success: no need to wait out
            // the debounce window.
            SyncOutcome::Skipped(SkipReason::RecentSuccess) => {
                let empty = self.sync.pending_is_empty(io);
                if empty {
                    info!("sync debounced, nothing pending; returning online");
                }
                empty
            }
            _ => false,
        };
        if !back_online {
            return outcome;
        }

        self.step(Trigger::SyncSucceeded, now_ms, io, sink);
        // A manual sync does not prove connectivity; the debouncer will
        // not report the loss again.
        if self.connected == Some(false) && self.current_mode() == Mode::Online {
            info!("synced while disconnected, starting grace period");
            self.step(Trigger::NetworkLost, now_ms, io, sink);
        }
        outcome
    }

    /// Dispatch one trigger, perform its actions, then report.
    fn step(
        &mut self,
        trigger: Trigger,
        now_ms: u64,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Decision {
        let from = self.current_mode();
        let remaining_before = self.remaining_ms(now_ms);

        self.ctx.now_ms = now_ms;
        let decision = self.fsm.dispatch(trigger, &mut self.ctx);
        let countdown = self.ctx.countdown;
        self.apply_actions(now_ms, store, sink);

        let to = self.current_mode();
        if from == to {
            return decision;
        }
        match (from, to) {
            (_, Mode::CountingDown) => {
                if let Some(c) = countdown {
                    sink.emit(&AppEvent::CountdownStarted {
                        started_at_ms: c.started_at_ms,
                        duration_ms: c.duration_ms,
                    });
                }
            }
            (Mode::CountingDown, Mode::Online) => {
                sink.emit(&AppEvent::CountdownCancelled {
                    remaining_ms: remaining_before,
                });
            }
            (Mode::CountingDown, Mode::Offline) if trigger == Trigger::CountdownExpired => {
                sink.emit(&AppEvent::CountdownExpired);
            }
            _ => {}
        }
        sink.emit(&AppEvent::ModeChanged {
            from,
            to,
            source: self.ctx.source,
        });
        decision
    }

    fn apply_actions(&mut self, now_ms: u64, store: &mut impl StoragePort, sink: &mut impl EventSink) {
        for action in self.ctx.drain_actions() {
            match action {
                Action::PersistCountdownStart(ts) => {
                    write_key(store, keys::COUNTDOWN_START, Some(ts), sink);
                }
                Action::ClearCountdownStart => {
                    write_key(store, keys::COUNTDOWN_START, None, sink);
                }
                Action::PersistOverride(ts) => {
                    write_key(store, keys::COMMAND_OVERRIDE, Some(ts), sink);
                }
                Action::ClearOverride => {
                    write_key(store, keys::COMMAND_OVERRIDE, None, sink);
                }
                Action::ArmCountdown(deadline) => {
                    self.timers.arm_at(TimerKind::CountdownComplete, deadline);
                }
                Action::ArmStatusTick => {
                    self.timers
                        .arm_every(TimerKind::StatusTick, now_ms, self.status_interval_ms);
                }
                Action::CancelCountdownTimers => {
                    self.timers.cancel(TimerKind::CountdownComplete);
                    self.timers.cancel(TimerKind::StatusTick);
                }
                Action::SyncEligible => sink.emit(&AppEvent::SyncEligible),
            }
        }
    }
}

/// Set (`Some`) or remove (`None`) a key, reporting failure without
/// propagating it.
fn write_key(
    store: &mut impl StoragePort,
    key: &'static str,
    value: Option<u64>,
    sink: &mut impl EventSink,
) {
    let result = match value {
        Some(v) => store.set_number(key, v),
        None => store.remove(key),
    };
    if let Err(error) = result {
        warn!("storage: write of {key} failed: {error}; continuing in memory");
        sink.emit(&AppEvent::PersistenceFailed { key, error });
    }
}

fn read_key(store: &impl StoragePort, key: &'static str, sink: &mut impl EventSink) -> Option<u64> {
    match store.get_number(key) {
        Ok(v) => v,
        Err(error) => {
            warn!("storage: read of {key} failed: {error}; treating as absent");
            sink.emit(&AppEvent::PersistenceFailed { key, error });
            None
        }
    }
}
