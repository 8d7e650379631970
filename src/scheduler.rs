//! Timer ownership table.
//!
//! Timers here are deadlines, not threads.  The runtime asks for the
//! earliest armed deadline, and when the clock passes it the owning
//! component fires the timer on the same serialized event loop that
//! handles every other event.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                 TimerTable                    │
//! │  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │ CountdownComplete│  │   StatusTick     │   │
//! │  │ one-shot         │  │   periodic       │   │
//! │  └────────┬─────────┘  └────────┬─────────┘   │
//! │           └──── take_next_due ──┘             │
//! │                       │                       │
//! │                       ▼                       │
//! │                ModeController                 │
//! └───────────────────────────────────────────────┘
//!
//!   Debouncer ── owns its own TimerSlot (quiet window)
//! ```
//!
//! Every slot holds at most one deadline; arming a slot replaces (cancels)
//! whatever was armed there before.

use log::debug;

// ═══════════════════════════════════════════════════════════════
//  Timer kinds
// ═══════════════════════════════════════════════════════════════

/// The kinds of timer the system ever arms.  One slot per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerKind {
    /// Countdown grace period has elapsed.
    CountdownComplete = 0,
    /// Read-only countdown status log.
    StatusTick = 1,
}

impl TimerKind {
    /// Number of timer kinds, sizes the slot array.
    pub const COUNT: usize = 2;

    pub const ALL: [TimerKind; Self::COUNT] = [Self::CountdownComplete, Self::StatusTick];

    pub fn label(self) -> &'static str {
        match self {
            Self::CountdownComplete => "countdown",
            Self::StatusTick => "status",
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Single slot
// ═══════════════════════════════════════════════════════════════

/// A single cancel-before-arm deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerSlot {
    deadline_ms: Option<u64>,
    /// Re-arm period for periodic timers.
    period_ms: Option<u64>,
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self {
            deadline_ms: None,
            period_ms: None,
        }
    }

    /// Arm a one-shot deadline, replacing any previous one.
    pub fn arm_at(&mut self, deadline_ms: u64) {
        self.deadline_ms = Some(deadline_ms);
        self.period_ms = None;
    }

    /// Arm a periodic timer whose first fire is `now_ms + period_ms`.
    pub fn arm_every(&mut self, now_ms: u64, period_ms: u64) {
        self.deadline_ms = Some(now_ms.saturating_add(period_ms));
        self.period_ms = Some(period_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
        self.period_ms = None;
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline_ms
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// If the deadline has passed, consume it and return the deadline.
    /// Periodic slots re-arm themselves one period after the deadline.
    pub fn take_due(&mut self, now_ms: u64) -> Option<u64> {
        let deadline = self.deadline_ms?;
        if deadline > now_ms {
            return None;
        }
        self.deadline_ms = self.period_ms.map(|p| deadline.saturating_add(p.max(1)));
        Some(deadline)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Table
// ═══════════════════════════════════════════════════════════════

/// One [`TimerSlot`] per [`TimerKind`].
#[derive(Debug, Clone, Default)]
pub struct TimerTable {
    slots: [TimerSlot; TimerKind::COUNT],
}

impl TimerTable {
    pub const fn new() -> Self {
        Self {
            slots: [TimerSlot::new(); TimerKind::COUNT],
        }
    }

    pub fn arm_at(&mut self, kind: TimerKind, deadline_ms: u64) {
        debug!("timer: arm {} at {}", kind.label(), deadline_ms);
        self.slots[kind as usize].arm_at(deadline_ms);
    }

    pub fn arm_every(&mut self, kind: TimerKind, now_ms: u64, period_ms: u64) {
        debug!("timer: arm {} every {}ms", kind.label(), period_ms);
        self.slots[kind as usize].arm_every(now_ms, period_ms);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if self.slots[kind as usize].is_armed() {
            debug!("timer: cancel {}", kind.label());
        }
        self.slots[kind as usize].cancel();
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.slots[kind as usize].is_armed()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<u64> {
        self.slots[kind as usize].deadline()
    }

    /// Earliest armed deadline and its kind.  Ties resolve in
    /// [`TimerKind::ALL`] order.
    pub fn next_due(&self) -> Option<(TimerKind, u64)> {
        TimerKind::ALL
            .iter()
            .filter_map(|k| self.slots[*k as usize].deadline().map(|d| (*k, d)))
            .min_by_key(|(_, d)| *d)
    }

    /// Consume the earliest deadline if it is due.
    pub fn take_next_due(&mut self, now_ms: u64) -> Option<(TimerKind, u64)> {
        let (kind, _) = self.next_due()?;
        self.slots[kind as usize]
            .take_due(now_ms)
            .map(|deadline| (kind, deadline))
    }

    /// Number of armed slots.
    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_armed()).count()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
