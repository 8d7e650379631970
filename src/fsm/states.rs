//! Concrete state handlers and table builder.
//!
//! ```text
//!  ONLINE ──[lost]──▶ COUNTING_DOWN ──[expired]──▶ OFFLINE{Network}
//!    ▲  ▲                  │                           │
//!    │  └───[restored]─────┘                           │
//!    └──────────────[restored, sync ok]────────────────┘
//!
//!  any ──[enable-offline]──▶ OFFLINE{Command} ──[enable-online]──▶ ONLINE
//! ```
//!
//! `OFFLINE{Command}` ignores every network trigger.  Only an
//! `enable-online` command leaves it.

use log::info;

use super::context::{Action, CountdownState, FsmContext};
use super::{Decision, Mode, StateDescriptor, Trigger, TriggerSource};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; Mode::COUNT] {
    [
        // Index 0 — Online
        StateDescriptor {
            id: Mode::Online,
            name: "Online",
            on_enter: Some(online_enter),
            on_exit: None,
            on_trigger: online_trigger,
        },
        // Index 1 — CountingDown
        StateDescriptor {
            id: Mode::CountingDown,
            name: "CountingDown",
            on_enter: Some(countdown_enter),
            on_exit: Some(countdown_exit),
            on_trigger: countdown_trigger,
        },
        // Index 2 — Offline
        StateDescriptor {
            id: Mode::Offline,
            name: "Offline",
            on_enter: Some(offline_enter),
            on_exit: Some(offline_exit),
            on_trigger: offline_trigger,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  ONLINE
// ═══════════════════════════════════════════════════════════════════════════

fn online_enter(ctx: &mut FsmContext) {
    ctx.source = TriggerSource::None;
    info!("ONLINE: normal operation");
}

fn online_trigger(ctx: &mut FsmContext, trigger: Trigger) -> Decision {
    match trigger {
        Trigger::NetworkLost => {
            ctx.source = TriggerSource::Network;
            Decision::Goto(Mode::CountingDown)
        }
        Trigger::EnableOffline => {
            ctx.source = TriggerSource::Command;
            Decision::Goto(Mode::Offline)
        }
        _ => Decision::Ignore,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  COUNTING_DOWN — grace period before falling back to offline
// ═══════════════════════════════════════════════════════════════════════════

fn countdown_enter(ctx: &mut FsmContext) {
    // A restored countdown arrives pre-seeded and is already on disk,
    // unless its start lies ahead of the clock: restart it from now.
    let countdown = match ctx.countdown {
        Some(c) if c.started_at_ms <= ctx.now_ms => c,
        _ => {
            let c = CountdownState {
                started_at_ms: ctx.now_ms,
                duration_ms: ctx.countdown_duration_ms,
            };
            ctx.countdown = Some(c);
            ctx.push(Action::PersistCountdownStart(c.started_at_ms));
            c
        }
    };
    ctx.push(Action::ArmCountdown(countdown.deadline_ms()));
    ctx.push(Action::ArmStatusTick);
    info!(
        "COUNTING_DOWN: offline in {}s unless connectivity returns",
        countdown.remaining_ms(ctx.now_ms) / 1000
    );
}

fn countdown_exit(ctx: &mut FsmContext) {
    ctx.countdown = None;
    ctx.push(Action::CancelCountdownTimers);
    ctx.push(Action::ClearCountdownStart);
}

fn countdown_trigger(ctx: &mut FsmContext, trigger: Trigger) -> Decision {
    match trigger {
        Trigger::NetworkRestored => Decision::Goto(Mode::Online),
        Trigger::CountdownExpired => Decision::Goto(Mode::Offline),
        Trigger::EnableOffline => {
            ctx.source = TriggerSource::Command;
            Decision::Goto(Mode::Offline)
        }
        _ => Decision::Ignore,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFFLINE
// ═══════════════════════════════════════════════════════════════════════════

fn offline_enter(ctx: &mut FsmContext) {
    match ctx.source {
        TriggerSource::Command => {
            set_override(ctx);
            info!("OFFLINE: forced by command");
        }
        _ => {
            ctx.source = TriggerSource::Network;
            ctx.push(Action::SyncEligible);
            info!("OFFLINE: connectivity lost past grace period");
        }
    }
}

fn offline_exit(ctx: &mut FsmContext) {
    if ctx.source == TriggerSource::Command {
        ctx.override_since = None;
        ctx.push(Action::ClearOverride);
    }
}

fn offline_trigger(ctx: &mut FsmContext, trigger: Trigger) -> Decision {
    let by_command = ctx.source == TriggerSource::Command;
    match trigger {
        Trigger::NetworkRestored if by_command => Decision::Suppress,
        Trigger::NetworkRestored => Decision::AttemptSync,
        Trigger::SyncSucceeded if !by_command => Decision::Goto(Mode::Online),
        Trigger::EnableOnline => Decision::Goto(Mode::Online),
        Trigger::EnableOffline if !by_command => {
            ctx.source = TriggerSource::Command;
            set_override(ctx);
            info!("OFFLINE: network fallback now held by command");
            Decision::Retag
        }
        _ => Decision::Ignore,
    }
}

/// Record the sticky override unless a restored one is already in place.
fn set_override(ctx: &mut FsmContext) {
    if ctx.override_since.is_none() {
        ctx.override_since = Some(ctx.now_ms);
        ctx.push(Action::PersistOverride(ctx.now_ms));
    }
}
