//! Integration tests for the serialized Runtime loop.
//!
//! Raw connectivity reports, command messages and requests go through the
//! inbound queue exactly as the host binary posts them; time only moves
//! when a test calls `process(now)`.

use super::mock_ports::{MockPorts, RecordingSink, SENDER, config};

use offline_fallback::app::commands::AppRequest;
use offline_fallback::app::events::AppEvent;
use offline_fallback::app::runtime::Runtime;
use offline_fallback::app::sync::SyncOutcome;
use offline_fallback::command::{CommandMessage, Rejection};
use offline_fallback::error::ProbeError;
use offline_fallback::events::{EventQueue, InboundEvent};
use offline_fallback::fsm::{Mode, TriggerSource};

const WINDOW: u64 = 500;
const DURATION: u64 = 300_000;

fn net(reachable: bool, at_ms: u64) -> InboundEvent {
    InboundEvent::Connectivity { reachable, at_ms }
}

fn lost_events(sink: &RecordingSink) -> usize {
    sink.count(|e| matches!(e, AppEvent::ConnectivityChanged { reachable: false }))
}

// ── Debounce ─────────────────────────────────────────────────

#[test]
fn flapping_inside_one_window_yields_one_transition() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);
    assert_eq!(rt.controller().current_mode(), Mode::Online);

    for (i, reachable) in [false, true, false, true, false].into_iter().enumerate() {
        rt.post(net(reachable, 1_000 + i as u64 * 100));
    }
    rt.process(1_400);
    assert_eq!(rt.controller().current_mode(), Mode::Online);

    rt.process(1_400 + WINDOW);
    assert_eq!(rt.controller().current_mode(), Mode::CountingDown);
    assert_eq!(lost_events(rt.sink()), 1);
    assert_eq!(rt.snapshot(1_900).countdown_started_at_ms, Some(1_900));
}

#[test]
fn flap_back_to_same_state_is_invisible() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);
    rt.sink_mut().clear();

    rt.post(net(false, 1_000));
    rt.post(net(true, 1_200));
    rt.process(2_000);

    assert_eq!(rt.controller().current_mode(), Mode::Online);
    assert_eq!(
        rt.sink()
            .count(|e| matches!(e, AppEvent::ConnectivityChanged { .. })),
        0
    );
}

#[test]
fn probe_error_counts_as_unreachable() {
    let queue = EventQueue::new();
    let mut ports = MockPorts::new();
    ports.probe_script.push_back(Err(ProbeError::Timeout));
    let mut rt = Runtime::new(&config(), &queue, ports, RecordingSink::new());

    rt.start(0);
    rt.process(WINDOW);

    assert_eq!(rt.ports().probe_calls, 1);
    assert_eq!(rt.controller().current_mode(), Mode::CountingDown);
}

// ── Full cycle ───────────────────────────────────────────────

#[test]
fn outage_countdown_offline_then_sync_back_online() {
    let queue = EventQueue::new();
    let mut ports = MockPorts::with_items(2);
    ports.probe_script.push_back(Ok(false));
    let mut rt = Runtime::new(&config(), &queue, ports, RecordingSink::new());

    rt.start(0);
    assert_eq!(rt.next_deadline(), Some(WINDOW));
    rt.process(WINDOW);
    assert_eq!(rt.controller().current_mode(), Mode::CountingDown);
    assert_eq!(rt.next_deadline(), Some(WINDOW + 10_000));

    rt.process(WINDOW + DURATION);
    assert_eq!(rt.controller().current_mode(), Mode::Offline);
    assert_eq!(rt.controller().trigger_source(), TriggerSource::Network);
    assert_eq!(rt.next_deadline(), None);

    rt.post(net(true, 400_000));
    rt.process(400_000 + WINDOW);

    assert_eq!(rt.controller().current_mode(), Mode::Online);
    assert!(rt.sink().contains(&AppEvent::SyncFinished(SyncOutcome::Success(2))));
    assert_eq!(rt.ports().committed.len(), 2);
}

#[test]
fn expiry_due_before_a_late_report_fires_first() {
    let queue = EventQueue::new();
    let mut ports = MockPorts::new();
    ports.probe_script.push_back(Ok(false));
    let mut rt = Runtime::new(&config(), &queue, ports, RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);
    let expiry = WINDOW + DURATION;

    // Restored just before expiry; its quiet window closes just after.
    rt.post(net(true, expiry - 100));
    rt.process(expiry - 100);
    assert_eq!(rt.controller().current_mode(), Mode::CountingDown);

    rt.post(net(true, expiry + 500));
    rt.process(expiry + 500);

    let events = &rt.sink().events;
    let expired = events
        .iter()
        .position(|e| *e == AppEvent::CountdownExpired)
        .unwrap();
    let restored = events
        .iter()
        .position(|e| *e == AppEvent::ConnectivityChanged { reachable: true })
        .unwrap();
    assert!(expired < restored);
    assert!(rt.sink().contains(&AppEvent::SyncFinished(SyncOutcome::Success(0))));
    assert_eq!(rt.controller().current_mode(), Mode::Online);
}

#[test]
fn process_fires_timers_in_deadline_order() {
    let queue = EventQueue::new();
    let mut ports = MockPorts::new();
    ports.probe_script.push_back(Ok(false));
    let mut rt = Runtime::new(&config(), &queue, ports, RecordingSink::new());
    rt.start(0);

    // One call covering the whole outage: debounce, 30 status ticks,
    // then expiry.
    rt.process(WINDOW + DURATION);

    let events = &rt.sink().events;
    let started = events
        .iter()
        .position(|e| matches!(e, AppEvent::CountdownStarted { .. }))
        .unwrap();
    let expired = events
        .iter()
        .position(|e| *e == AppEvent::CountdownExpired)
        .unwrap();
    assert!(started < expired);
    assert_eq!(
        rt.sink()
            .count(|e| matches!(e, AppEvent::CountdownStatus { .. })),
        29
    );
}

// ── Commands ─────────────────────────────────────────────────

#[test]
fn pending_command_is_applied_on_start() {
    let queue = EventQueue::new();
    let mut ports = MockPorts::new();
    ports.pending_command = Some(CommandMessage::sms(SENDER, "OFFLINE-246810", 0));
    let mut rt = Runtime::new(&config(), &queue, ports, RecordingSink::new());

    rt.start(0);

    assert_eq!(rt.controller().current_mode(), Mode::Offline);
    assert_eq!(rt.controller().trigger_source(), TriggerSource::Command);
    assert!(rt.ports().pending_command.is_none());
}

#[test]
fn foreground_resume_reads_the_pending_slot() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);

    rt.ports_mut().pending_command = Some(CommandMessage::sms(SENDER, "OFFLINE-135790", 600));
    rt.post(InboundEvent::Request(AppRequest::ResumeForeground));
    rt.process(1_000);

    assert_eq!(rt.controller().current_mode(), Mode::Offline);
}

#[test]
fn live_command_overrides_network_restore() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);

    rt.post(InboundEvent::Command(CommandMessage::sms(SENDER, "OFFLINE-000001", 1_000)));
    rt.post(net(false, 1_000));
    rt.post(net(true, 2_000));
    rt.process(5_000);

    assert_eq!(rt.controller().current_mode(), Mode::Offline);
    assert_eq!(rt.controller().trigger_source(), TriggerSource::Command);
    assert!(rt.sink().contains(&AppEvent::OverrideSuppressed));
}

#[test]
fn rejected_command_is_reported_and_ignored() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);

    rt.post(InboundEvent::Command(CommandMessage::sms("+15550001111", "OFFLINE-000001", 0)));
    rt.process(1);

    assert_eq!(rt.controller().current_mode(), Mode::Online);
    assert!(rt.sink().contains(&AppEvent::CommandRejected {
        reason: Rejection::UnauthorizedSender
    }));
    assert_eq!(rt.gate().rejected(), 1);
}

// ── Requests ─────────────────────────────────────────────────

#[test]
fn probe_request_feeds_the_debouncer() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);
    rt.process(WINDOW);

    rt.ports_mut().probe_script.push_back(Ok(false));
    rt.post(InboundEvent::Request(AppRequest::ProbeNow));
    rt.process(1_000);
    assert_eq!(rt.controller().current_mode(), Mode::Online);

    rt.process(1_000 + WINDOW);
    assert_eq!(rt.controller().current_mode(), Mode::CountingDown);
    assert_eq!(rt.ports().probe_calls, 2);
}

#[test]
fn force_sync_request_runs_the_engine() {
    let queue = EventQueue::new();
    let mut rt = Runtime::new(&config(), &queue, MockPorts::new(), RecordingSink::new());
    rt.start(0);

    rt.post(InboundEvent::Request(AppRequest::ForceSync));
    rt.process(1);

    assert!(rt.sink().events.iter().any(|e| matches!(
        e,
        AppEvent::SyncFinished(SyncOutcome::Skipped(_))
    )));
}
