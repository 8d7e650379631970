//! Shared mutable context threaded through every FSM handler.
//!
//! Handlers never touch storage, timers or the event sink directly.  They
//! update the in-memory mode data here and append [`Action`]s, which the
//! [`ModeController`](crate::app::service::ModeController) then performs
//! in [`Action::rank`] order: durable writes that record a mode go first,
//! then clears of stale keys, then timers.  A crash between two writes
//! therefore never leaves neither the old nor the new key on disk.

use heapless::Vec;
use log::warn;

use super::TriggerSource;

/// Maximum actions a single transition can queue (exit + enter).
pub const MAX_ACTIONS: usize = 8;

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// Grace period in flight.  Exists iff the mode is `CountingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownState {
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

impl CountdownState {
    /// Elapsed time; a start in the future counts as zero.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms)
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.duration_ms.saturating_sub(self.elapsed_ms(now_ms))
    }

    pub fn deadline_ms(&self) -> u64 {
        self.started_at_ms.saturating_add(self.duration_ms)
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) >= self.duration_ms
    }
}

// ---------------------------------------------------------------------------
// Actions (written by handlers; performed by the controller)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PersistCountdownStart(u64),
    ClearCountdownStart,
    PersistOverride(u64),
    ClearOverride,
    /// Arm the completion timer at an absolute deadline.
    ArmCountdown(u64),
    ArmStatusTick,
    CancelCountdownTimers,
    /// `Offline{Network}` reached: a later restore may sync.
    SyncEligible,
}

impl Action {
    /// Execution rank within one step; lower runs first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::PersistCountdownStart(_) | Self::PersistOverride(_) => 0,
            Self::ClearCountdownStart | Self::ClearOverride => 1,
            Self::ArmCountdown(_)
            | Self::ArmStatusTick
            | Self::CancelCountdownTimers
            | Self::SyncEligible => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

pub struct FsmContext {
    /// Time of the trigger being handled.
    pub now_ms: u64,
    pub countdown_duration_ms: u64,
    pub countdown: Option<CountdownState>,
    pub source: TriggerSource,
    /// When the sticky command override was set, if it is active.
    pub override_since: Option<u64>,
    actions: Vec<Action, MAX_ACTIONS>,
}

impl FsmContext {
    pub fn new(countdown_duration_ms: u64) -> Self {
        Self {
            now_ms: 0,
            countdown_duration_ms,
            countdown: None,
            source: TriggerSource::None,
            override_since: None,
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: Action) {
        if self.actions.push(action).is_err() {
            warn!("fsm: action queue full, dropping {action:?}");
        }
    }

    /// Take every queued action in execution order, leaving the queue
    /// empty.  The sort is stable, so equal ranks keep queue order.
    pub fn drain_actions(&mut self) -> Vec<Action, MAX_ACTIONS> {
        let mut actions = core::mem::take(&mut self.actions);
        actions.sort_by_key(Action::rank);
        actions
    }

    pub fn pending_actions(&self) -> &[Action] {
        &self.actions
    }
}
