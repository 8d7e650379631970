//! Serialized event loop.
//!
//! [`Runtime`] owns the consumer side of the [`EventQueue`], the
//! debouncer, the command gate and the controller, plus the bundle of
//! ports.  Nothing else mutates controller state, so every event is
//! processed to completion before the next one starts.
//!
//! ```text
//!  EventQueue ──▶ process(now)
//!                   │ 1. drain queue (FIFO)
//!                   │      Connectivity ──▶ Debouncer
//!                   │      Command      ──▶ CommandGate ──▶ ModeController
//!                   │      Request      ──▶ sync / probe / pending slot
//!                   │ 2. fire due deadlines, earliest first
//!                   │      quiet window ──▶ ModeController::on_connectivity
//!                   ▼      countdown / status ──▶ ModeController
//! ```

use log::{debug, info, warn};

use crate::command::auth::CommandGate;
use crate::command::CommandMessage;
use crate::config::FallbackConfig;
use crate::connectivity::Debouncer;
use crate::events::{EventQueue, InboundEvent};

use super::commands::AppRequest;
use super::events::AppEvent;
use super::ports::{CommandSourcePort, ConnectivityPort, EventSink, StoragePort, WorkQueuePort};
use super::service::{ModeController, ModeSnapshot};

pub struct Runtime<'q, P, S> {
    queue: &'q EventQueue,
    ports: P,
    sink: S,
    debouncer: Debouncer,
    gate: CommandGate,
    controller: ModeController,
}

impl<'q, P, S> Runtime<'q, P, S>
where
    P: StoragePort + ConnectivityPort + CommandSourcePort + WorkQueuePort,
    S: EventSink,
{
    pub fn new(config: &FallbackConfig, queue: &'q EventQueue, ports: P, sink: S) -> Self {
        Self {
            queue,
            ports,
            sink,
            debouncer: Debouncer::new(config.debounce_window_ms),
            gate: CommandGate::from_config(config),
            controller: ModeController::new(config),
        }
    }

    /// Restore, consume any pending command, then take a first probe.
    pub fn start(&mut self, now_ms: u64) {
        self.controller
            .restore(now_ms, &mut self.ports, &mut self.sink);
        self.fetch_pending(now_ms);
        self.probe(now_ms);
        info!(
            "runtime: started in {}",
            self.controller.current_mode().label()
        );
    }

    pub fn post(&self, event: InboundEvent) -> bool {
        self.queue.post(event)
    }

    /// Drain the queue, then fire every deadline up to `now_ms`.
    /// Returns how many events and timers were handled.
    pub fn process(&mut self, now_ms: u64) -> usize {
        let mut handled = 0;
        while let Some(event) = self.queue.try_next() {
            self.handle(event, now_ms);
            handled += 1;
        }
        while self.fire_next_due(now_ms) {
            handled += 1;
        }
        handled
    }

    pub fn resume_foreground(&mut self, now_ms: u64) {
        debug!("runtime: foreground resume");
        self.fetch_pending(now_ms);
    }

    /// Earliest armed deadline across the debounce window, the countdown
    /// and the status tick.
    pub fn next_deadline(&self) -> Option<u64> {
        match (
            self.debouncer.next_deadline(),
            self.controller.next_deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn snapshot(&self, now_ms: u64) -> ModeSnapshot {
        self.controller.snapshot(now_ms)
    }

    pub fn controller(&self) -> &ModeController {
        &self.controller
    }

    pub fn gate(&self) -> &CommandGate {
        &self.gate
    }

    pub fn ports(&self) -> &P {
        &self.ports
    }

    pub fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── Internal ──────────────────────────────────────────────

    fn handle(&mut self, event: InboundEvent, now_ms: u64) {
        match event {
            InboundEvent::Connectivity { reachable, at_ms } => self.report(reachable, at_ms),
            InboundEvent::Command(msg) => self.handle_command(&msg, now_ms),
            InboundEvent::Request(AppRequest::ForceSync) => {
                self.controller
                    .force_sync(now_ms, &mut self.ports, &mut self.sink);
            }
            InboundEvent::Request(AppRequest::ResumeForeground) => self.resume_foreground(now_ms),
            InboundEvent::Request(AppRequest::ProbeNow) => self.probe(now_ms),
        }
    }

    /// Feed a raw report.  Every deadline that fell due before it arrived
    /// (a closed quiet window, a countdown expiry, a status tick) fires
    /// first, in deadline order.
    fn report(&mut self, reachable: bool, at_ms: u64) {
        while self.fire_next_due(at_ms) {}
        self.debouncer.report(reachable, at_ms);
    }

    fn probe(&mut self, now_ms: u64) {
        let reachable = self.ports.probe_now().unwrap_or_else(|e| {
            warn!("probe failed ({e}), treating as unreachable");
            false
        });
        self.report(reachable, now_ms);
    }

    fn fetch_pending(&mut self, now_ms: u64) {
        match self.ports.fetch_pending_command() {
            Ok(Some(msg)) => {
                info!("runtime: pending command found");
                self.handle_command(&msg, now_ms);
            }
            Ok(None) => debug!("runtime: no pending command"),
            Err(e) => warn!("runtime: pending command unreadable: {e}"),
        }
    }

    fn handle_command(&mut self, msg: &CommandMessage, now_ms: u64) {
        match self.gate.admit(msg) {
            Ok(cmd) => self
                .controller
                .on_command(&cmd, now_ms, &mut self.ports, &mut self.sink),
            Err(reason) => self.sink.emit(&AppEvent::CommandRejected { reason }),
        }
    }

    /// Fire whichever deadline is earliest, if it is due.  Debounce wins
    /// ties so a settled connectivity change lands before a countdown
    /// expiry at the same instant.
    fn fire_next_due(&mut self, now_ms: u64) -> bool {
        let debounce = self.debouncer.next_deadline().filter(|d| *d <= now_ms);
        let timer = self.controller.next_deadline().filter(|d| *d <= now_ms);
        match (debounce, timer) {
            (Some(d), Some(t)) if d <= t => self.settle(d),
            (Some(d), None) => self.settle(d),
            (_, Some(_)) => self
                .controller
                .fire_next_due(now_ms, &mut self.ports, &mut self.sink)
                .is_some(),
            (None, None) => false,
        }
    }

    /// Close the quiet window at `deadline` and forward any change.
    fn settle(&mut self, deadline: u64) -> bool {
        if let Some(change) = self.debouncer.poll(deadline) {
            self.controller
                .on_connectivity(change, deadline, &mut self.ports, &mut self.sink);
        }
        true
    }
}
