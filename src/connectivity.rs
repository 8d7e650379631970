//! Connectivity debouncer.
//!
//! Raw probe reports flap.  The debouncer turns them into stable
//! transitions:
//!
//! | Input                                    | Output                     |
//! |------------------------------------------|----------------------------|
//! | report, then quiet for `window_ms`       | latest value, if changed   |
//! | report superseded inside the window      | nothing (deadline resets)  |
//! | settled value equal to last emitted      | nothing                    |
//!
//! Before the first emission there is no stable value, so the first
//! settled report always produces an event.

use log::debug;

use crate::scheduler::TimerSlot;

/// Stable connectivity transition delivered to the mode controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityChange {
    Lost,
    Restored,
}

impl ConnectivityChange {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Self::Restored
        } else {
            Self::Lost
        }
    }

    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Restored)
    }
}

pub struct Debouncer {
    window_ms: u64,
    quiet: TimerSlot,
    /// Most recent raw report, evaluated when `quiet` fires.
    latest: Option<bool>,
    /// Last value handed downstream.
    emitted: Option<bool>,
    /// Raw reports swallowed by a superseding report.
    superseded: u32,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            quiet: TimerSlot::new(),
            latest: None,
            emitted: None,
            superseded: 0,
        }
    }

    /// Record a raw report.  Restarts the quiet window.
    pub fn report(&mut self, reachable: bool, at_ms: u64) {
        if self.quiet.is_armed() {
            self.superseded = self.superseded.saturating_add(1);
        }
        self.latest = Some(reachable);
        self.quiet.arm_at(at_ms.saturating_add(self.window_ms));
    }

    /// Evaluate the pending report if its window has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<ConnectivityChange> {
        self.quiet.take_due(now_ms)?;
        let settled = self.latest.take()?;
        if self.emitted == Some(settled) {
            debug!("debounce: settled on {settled}, unchanged");
            return None;
        }
        self.emitted = Some(settled);
        Some(ConnectivityChange::from_reachable(settled))
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.quiet.deadline()
    }

    /// Last emitted stable value; `None` until the first emission.
    pub fn stable(&self) -> Option<bool> {
        self.emitted
    }

    pub fn superseded_reports(&self) -> u32 {
        self.superseded
    }
}
