//! Function-pointer mode state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌──────────────┬──────────┬──────────┬───────────────────┐  │
//! │  │ Mode         │ on_enter │ on_exit  │ on_trigger        │  │
//! │  ├──────────────┼──────────┼──────────┼───────────────────┤  │
//! │  │ Online       │ fn(ctx)  │ —        │ fn(ctx,t)->Dec.   │  │
//! │  │ CountingDown │ fn(ctx)  │ fn(ctx)  │ fn(ctx,t)->Dec.   │  │
//! │  │ Offline      │ fn(ctx)  │ fn(ctx)  │ fn(ctx,t)->Dec.   │  │
//! │  └──────────────┴──────────┴──────────┴───────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every trigger is offered to the **current** state's `on_trigger`.  A
//! [`Decision::Goto`] runs `on_exit` for the current state, moves the
//! pointer, then runs `on_enter` for the next.  Handlers only mutate
//! [`FsmContext`] and queue [`Action`](context::Action)s; all I/O is left
//! to the caller.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{debug, info};

// ---------------------------------------------------------------------------
// Mode identity
// ---------------------------------------------------------------------------

/// Exactly one of these holds at any instant.
/// Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[repr(u8)]
pub enum Mode {
    Online = 0,
    CountingDown = 1,
    Offline = 2,
}

impl Mode {
    /// Total number of modes, sizes the table array.
    pub const COUNT: usize = 3;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Online,
            1 => Self::CountingDown,
            _ => Self::Offline,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::CountingDown => "counting-down",
            Self::Offline => "offline",
        }
    }
}

/// Which actor caused the current offline state or countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum TriggerSource {
    #[default]
    None,
    Network,
    /// Sticky: only an opposing command clears it.
    Command,
}

/// Stimuli the controller feeds to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    NetworkLost,
    NetworkRestored,
    CountdownExpired,
    EnableOffline,
    EnableOnline,
    SyncSucceeded,
}

/// What the current state made of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No effect in this state.
    Ignore,
    /// Network restored while a command holds the device offline.
    Suppress,
    /// Same mode, trigger source changed (`Offline{Network}` to
    /// `Offline{Command}`).
    Retag,
    /// Network restored in `Offline{Network}`: run the sync engine.
    AttemptSync,
    Goto(Mode),
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

pub type StateActionFn = fn(&mut FsmContext);

pub type TriggerFn = fn(&mut FsmContext, Trigger) -> Decision;

/// One row in the table.
pub struct StateDescriptor {
    pub id: Mode,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_trigger: TriggerFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; Mode::COUNT],
    current: usize,
    transitions: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; Mode::COUNT], initial: Mode) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Jump straight into `mode` and run its `on_enter`, without running
    /// any `on_exit`.  Used once at restore, after the context has been
    /// seeded from storage.
    pub fn resume(&mut self, mode: Mode, ctx: &mut FsmContext) {
        self.current = mode as usize;
        info!("FSM resuming in {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Offer a trigger to the current state and apply its decision.
    pub fn dispatch(&mut self, trigger: Trigger, ctx: &mut FsmContext) -> Decision {
        let decision = (self.table[self.current].on_trigger)(ctx, trigger);
        match decision {
            Decision::Goto(next) if next as usize != self.current => {
                self.transition(next, ctx);
            }
            Decision::Goto(_) | Decision::Ignore => {
                debug!(
                    "FSM {}: {:?} ignored",
                    self.table[self.current].name, trigger
                );
            }
            Decision::Suppress | Decision::Retag | Decision::AttemptSync => {}
        }
        decision
    }

    pub fn current_mode(&self) -> Mode {
        Mode::from_index(self.current)
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    fn transition(&mut self, next: Mode, ctx: &mut FsmContext) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.transitions = self.transitions.wrapping_add(1);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
