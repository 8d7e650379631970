//! Inbound event queue.
//!
//! Every stimulus from outside the core is posted here and consumed by the
//! [`Runtime`](crate::app::runtime::Runtime), one event at a time, in FIFO
//! order.  Producers may live on other threads (probe loop, console
//! reader, command receiver).
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Probe loop  │────▶│              │     │              │
//! │ Command rx  │────▶│  EventQueue  │────▶│   Runtime    │
//! │ Console/UI  │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::commands::AppRequest;
use crate::command::CommandMessage;

/// Maximum number of pending inbound events.
pub const INBOUND_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Raw, undebounced probe result.
    Connectivity { reachable: bool, at_ms: u64 },
    /// Live delivery from the command channel, not yet authenticated.
    Command(CommandMessage),
    Request(AppRequest),
}

pub struct EventQueue {
    channel: Channel<CriticalSectionRawMutex, InboundEvent, INBOUND_DEPTH>,
    dropped: AtomicU32,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            dropped: AtomicU32::new(0),
        }
    }

    /// Enqueue without blocking.  Returns `false` (and counts a drop) when
    /// the queue is full.
    pub fn post(&self, event: InboundEvent) -> bool {
        if self.channel.try_send(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!("inbound queue full, dropping event");
            return false;
        }
        true
    }

    pub fn try_next(&self) -> Option<InboundEvent> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next event.
    pub async fn next(&self) -> InboundEvent {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Events lost to a full queue since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
