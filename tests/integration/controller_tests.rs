//! Integration tests for the ModeController → FSM → store pipeline.
//!
//! Drives the controller directly with debounced connectivity changes,
//! authenticated commands and timer deadlines, and checks mode, durable
//! keys, armed timers and the emitted event stream.

use super::mock_ports::{MockPorts, RecordingSink, StoreCall, command, config};

use offline_fallback::app::events::AppEvent;
use offline_fallback::app::ports::keys;
use offline_fallback::app::service::ModeController;
use offline_fallback::command::CommandKind;
use offline_fallback::connectivity::ConnectivityChange;
use offline_fallback::error::StorageError;
use offline_fallback::fsm::{Mode, TriggerSource};
use offline_fallback::scheduler::TimerKind;

const DURATION: u64 = 300_000;

fn started(ports: &mut MockPorts, now: u64) -> (ModeController, RecordingSink) {
    let mut ctrl = ModeController::new(&config());
    let mut sink = RecordingSink::new();
    ctrl.restore(now, ports, &mut sink);
    (ctrl, sink)
}

/// Fire every timer due at `now`.
fn run_timers(ctrl: &mut ModeController, now: u64, ports: &mut MockPorts, sink: &mut RecordingSink) {
    while ctrl.fire_next_due(now, ports, sink).is_some() {}
}

// ── Countdown ────────────────────────────────────────────────

#[test]
fn lost_connection_starts_full_countdown() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    assert!(sink.contains(&AppEvent::Started {
        mode: Mode::Online,
        source: TriggerSource::None
    }));

    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);

    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
    assert!(ctrl.is_counting_down());
    assert_eq!(ctrl.remaining_ms(0), DURATION);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Network);
    assert_eq!(ports.value(keys::COUNTDOWN_START), Some(0));
    assert!(ctrl.is_timer_armed(TimerKind::CountdownComplete));
    assert!(ctrl.is_timer_armed(TimerKind::StatusTick));
    assert!(sink.contains(&AppEvent::CountdownStarted {
        started_at_ms: 0,
        duration_ms: DURATION
    }));
}

#[test]
fn restored_one_ms_before_deadline_never_goes_offline() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);

    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    run_timers(&mut ctrl, 299_999, &mut ports, &mut sink);
    ctrl.on_connectivity(ConnectivityChange::Restored, 299_999, &mut ports, &mut sink);

    assert_eq!(ctrl.current_mode(), Mode::Online);
    assert!(sink.contains(&AppEvent::CountdownCancelled { remaining_ms: 1 }));
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ModeChanged { to: Mode::Offline, .. })),
        0
    );
    assert_eq!(ports.value(keys::COUNTDOWN_START), None);
    assert!(!ctrl.is_timer_armed(TimerKind::CountdownComplete));
    assert!(!ctrl.is_timer_armed(TimerKind::StatusTick));
    assert_eq!(ctrl.next_deadline(), None);
}

#[test]
fn countdown_expiry_enters_network_offline() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);

    run_timers(&mut ctrl, DURATION - 1, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::CountingDown);

    run_timers(&mut ctrl, DURATION, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Network);
    assert!(sink.contains(&AppEvent::CountdownExpired));
    assert!(sink.contains(&AppEvent::SyncEligible));
    assert_eq!(ports.value(keys::COUNTDOWN_START), None);
    assert_eq!(ctrl.next_deadline(), None);
}

#[test]
fn status_ticks_are_read_only() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    let writes = ports.store_calls.len();

    run_timers(&mut ctrl, 30_000, &mut ports, &mut sink);

    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CountdownStatus { .. })),
        3
    );
    assert!(sink.contains(&AppEvent::CountdownStatus {
        elapsed_ms: 20_000,
        remaining_ms: 280_000
    }));
    assert_eq!(ports.store_calls.len(), writes);
    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
}

#[test]
fn lost_while_counting_down_keeps_original_start() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    ctrl.on_connectivity(ConnectivityChange::Lost, 50_000, &mut ports, &mut sink);

    assert_eq!(ports.value(keys::COUNTDOWN_START), Some(0));
    assert_eq!(ctrl.remaining_ms(50_000), 250_000);
}

// ── Command override ─────────────────────────────────────────

#[test]
fn enable_offline_during_countdown_is_sticky() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);

    ctrl.on_command(
        &command(CommandKind::EnableOffline, "123456"),
        0,
        &mut ports,
        &mut sink,
    );
    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Command);
    assert!(!ctrl.is_timer_armed(TimerKind::CountdownComplete));
    assert_eq!(ports.value(keys::COUNTDOWN_START), None);
    assert_eq!(ports.value(keys::COMMAND_OVERRIDE), Some(0));

    ctrl.on_connectivity(ConnectivityChange::Restored, 10, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Command);
    assert!(sink.contains(&AppEvent::OverrideSuppressed));
    assert_eq!(ports.fetch_calls, 0, "a command override never syncs");
}

#[test]
fn enable_offline_from_online_skips_countdown() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);

    ctrl.on_command(
        &command(CommandKind::EnableOffline, "111111"),
        5,
        &mut ports,
        &mut sink,
    );

    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CountdownStarted { .. })),
        0
    );
    assert!(sink.contains(&AppEvent::CommandApplied {
        kind: CommandKind::EnableOffline
    }));
}

#[test]
fn enable_online_lifts_override() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_command(&command(CommandKind::EnableOffline, "111111"), 0, &mut ports, &mut sink);
    ctrl.on_command(&command(CommandKind::EnableOnline, "222222"), 100, &mut ports, &mut sink);

    assert_eq!(ctrl.current_mode(), Mode::Online);
    assert_eq!(ports.value(keys::COMMAND_OVERRIDE), None);
    assert!(
        ports
            .store_calls
            .contains(&StoreCall::Remove(keys::COMMAND_OVERRIDE.into()))
    );
}

#[test]
fn enable_offline_retags_network_offline() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    run_timers(&mut ctrl, DURATION, &mut ports, &mut sink);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Network);

    ctrl.on_command(
        &command(CommandKind::EnableOffline, "333333"),
        DURATION + 1,
        &mut ports,
        &mut sink,
    );
    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Command);
    assert_eq!(ports.value(keys::COMMAND_OVERRIDE), Some(DURATION + 1));
}

#[test]
fn enable_online_while_network_down_restarts_grace_period() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    ctrl.on_command(&command(CommandKind::EnableOffline, "111111"), 10, &mut ports, &mut sink);
    ctrl.on_command(&command(CommandKind::EnableOnline, "222222"), 1_000, &mut ports, &mut sink);

    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
    assert_eq!(ctrl.remaining_ms(1_000), DURATION);
    assert_eq!(ports.value(keys::COUNTDOWN_START), Some(1_000));
}

#[test]
fn redundant_commands_are_ignored() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);

    ctrl.on_command(&command(CommandKind::EnableOnline, "444444"), 0, &mut ports, &mut sink);
    assert!(sink.contains(&AppEvent::CommandIgnored {
        kind: CommandKind::EnableOnline,
        mode: Mode::Online
    }));

    ctrl.on_command(&command(CommandKind::EnableOffline, "555555"), 0, &mut ports, &mut sink);
    ctrl.on_command(&command(CommandKind::EnableOffline, "666666"), 1, &mut ports, &mut sink);
    assert!(sink.contains(&AppEvent::CommandIgnored {
        kind: CommandKind::EnableOffline,
        mode: Mode::Offline
    }));
    assert_eq!(ports.value(keys::COMMAND_OVERRIDE), Some(0));
}

// ── Restart recovery ─────────────────────────────────────────

#[test]
fn restart_after_deadline_goes_straight_offline() {
    let now = 1_700_000_000_000;
    let mut ports = MockPorts::new();
    ports
        .store
        .insert(keys::COUNTDOWN_START.into(), now - DURATION - 1);

    let (ctrl, sink) = started(&mut ports, now);

    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Network);
    assert_eq!(ctrl.next_deadline(), None);
    assert!(sink.contains(&AppEvent::CountdownExpired));
    assert_eq!(ports.value(keys::COUNTDOWN_START), None);
}

#[test]
fn restart_mid_countdown_resumes_remaining_time() {
    let now = 1_700_000_000_000;
    let start = now - 100_000;
    let mut ports = MockPorts::new();
    ports.store.insert(keys::COUNTDOWN_START.into(), start);

    let (ctrl, _sink) = started(&mut ports, now);

    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
    assert_eq!(ctrl.remaining_ms(now), 200_000);
    assert!(ctrl.is_timer_armed(TimerKind::CountdownComplete));
    assert_eq!(ports.value(keys::COUNTDOWN_START), Some(start));
    assert!(
        !ports
            .store_calls
            .iter()
            .any(|c| matches!(c, StoreCall::Set(k, _) if k == keys::COUNTDOWN_START)),
        "the original start timestamp must not be rewritten"
    );
}

#[test]
fn restart_keeps_command_override() {
    let mut ports = MockPorts::new();
    ports.store.insert(keys::COMMAND_OVERRIDE.into(), 42);
    ports.store.insert(keys::COUNTDOWN_START.into(), 10);

    let (mut ctrl, mut sink) = started(&mut ports, 1_000);

    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Command);
    assert_eq!(ports.value(keys::COUNTDOWN_START), None);
    assert_eq!(ports.value(keys::COMMAND_OVERRIDE), Some(42));

    ctrl.on_connectivity(ConnectivityChange::Restored, 2_000, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::Offline);
}

#[test]
fn restart_with_start_ahead_of_clock_restarts_countdown_from_now() {
    let mut ports = MockPorts::new();
    ports.store.insert(keys::COUNTDOWN_START.into(), 1_000_000);

    let (mut ctrl, mut sink) = started(&mut ports, 0);

    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
    assert_eq!(ctrl.remaining_ms(0), DURATION);
    assert_eq!(ports.value(keys::COUNTDOWN_START), Some(0));

    run_timers(&mut ctrl, DURATION - 1, &mut ports, &mut sink);
    assert_eq!(ctrl.remaining_ms(DURATION - 1), 1);
    run_timers(&mut ctrl, DURATION, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert!(sink.contains(&AppEvent::CountdownExpired));
}

#[test]
fn command_offline_mid_countdown_writes_override_first() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);
    ports.store_calls.clear();

    ctrl.on_command(&command(CommandKind::EnableOffline, "112233"), 5_000, &mut ports, &mut sink);

    assert_eq!(
        ports.store_calls,
        [
            StoreCall::Set(keys::COMMAND_OVERRIDE.into(), 5_000),
            StoreCall::Remove(keys::COUNTDOWN_START.into()),
        ]
    );
}

// ── Persistence failures ─────────────────────────────────────

#[test]
fn failed_countdown_write_still_counts_down_in_memory() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ports.fail_writes = true;

    ctrl.on_connectivity(ConnectivityChange::Lost, 0, &mut ports, &mut sink);

    assert_eq!(ctrl.current_mode(), Mode::CountingDown);
    assert!(ctrl.is_timer_armed(TimerKind::CountdownComplete));
    assert!(sink.contains(&AppEvent::PersistenceFailed {
        key: keys::COUNTDOWN_START,
        error: StorageError::Io
    }));

    run_timers(&mut ctrl, DURATION, &mut ports, &mut sink);
    assert_eq!(ctrl.current_mode(), Mode::Offline);
}

#[test]
fn snapshot_reports_countdown() {
    let mut ports = MockPorts::new();
    let (mut ctrl, mut sink) = started(&mut ports, 0);
    ctrl.on_connectivity(ConnectivityChange::Lost, 1_000, &mut ports, &mut sink);

    let snap = ctrl.snapshot(61_000);
    assert_eq!(snap.mode, Mode::CountingDown);
    assert_eq!(snap.source, TriggerSource::Network);
    assert_eq!(snap.countdown_started_at_ms, Some(1_000));
    assert_eq!(snap.remaining_ms, 240_000);
    assert_eq!(snap.connected, Some(false));
    assert!(!snap.sync_in_progress);
}
