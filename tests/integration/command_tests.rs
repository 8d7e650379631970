//! Integration tests for the CommandGate authentication pipeline.
//!
//! Exercises every rejection path in order of precedence, plus the
//! hand-off of accepted commands to the controller.

use super::mock_ports::{MockPorts, PSK, RecordingSink, SENDER, config};

use offline_fallback::app::events::AppEvent;
use offline_fallback::app::service::ModeController;
use offline_fallback::command::auth::CommandGate;
use offline_fallback::command::parse::encode_envelope;
use offline_fallback::command::{CommandKind, CommandMessage, Rejection};
use offline_fallback::fsm::{Mode, TriggerSource};

fn gate() -> CommandGate {
    CommandGate::from_config(&config())
}

// ── SMS ──────────────────────────────────────────────────────

#[test]
fn sms_from_authorized_sender_is_accepted() {
    let mut gate = gate();
    let cmd = gate
        .admit(&CommandMessage::sms(SENDER, "OFFLINE-123456", 77))
        .unwrap();
    assert_eq!(cmd.kind, CommandKind::EnableOffline);
    assert_eq!(cmd.token.as_str(), "123456");
    assert_eq!(cmd.received_at_ms, 77);
    assert_eq!(gate.accepted(), 1);
}

#[test]
fn sms_sender_formatting_is_tolerated() {
    let mut gate = gate();
    assert!(
        gate.admit(&CommandMessage::sms("748 755-840", "ONLINE-654321", 0))
            .is_ok()
    );
}

#[test]
fn sms_from_stranger_is_refused() {
    let mut gate = gate();
    assert_eq!(
        gate.admit(&CommandMessage::sms("+15550001111", "OFFLINE-123456", 0)),
        Err(Rejection::UnauthorizedSender)
    );
    assert_eq!(gate.rejected(), 1);
}

#[test]
fn sms_without_configured_sender_fails_closed() {
    let mut gate = CommandGate::new(None, Some(PSK.as_bytes()));
    assert_eq!(
        gate.admit(&CommandMessage::sms(SENDER, "OFFLINE-123456", 0)),
        Err(Rejection::NoCredentials)
    );
}

#[test]
fn malformed_bodies_are_refused() {
    let mut gate = gate();
    for body in ["OFFLINE-12345", "OFFLINE-1234567", "offline-123456", "hello", "{\"v\":1}"] {
        assert_eq!(
            gate.admit(&CommandMessage::sms(SENDER, body, 0)),
            Err(Rejection::Malformed),
            "body {body:?}"
        );
    }
}

// ── Envelopes ────────────────────────────────────────────────

#[test]
fn signed_envelope_is_accepted() {
    let mut gate = gate();
    let body = encode_envelope(CommandKind::EnableOnline, "000042", Some(PSK.as_bytes()));
    let cmd = gate.admit(&CommandMessage::envelope(&body, 5)).unwrap();
    assert_eq!(cmd.kind, CommandKind::EnableOnline);
}

#[test]
fn envelope_signed_with_other_key_is_refused() {
    let mut gate = gate();
    let body = encode_envelope(CommandKind::EnableOffline, "000042", Some(b"wrong-key"));
    assert_eq!(
        gate.admit(&CommandMessage::envelope(&body, 0)),
        Err(Rejection::BadSignature)
    );
}

#[test]
fn unsigned_envelope_is_refused() {
    let mut gate = gate();
    let body = encode_envelope(CommandKind::EnableOffline, "000042", None);
    assert_eq!(
        gate.admit(&CommandMessage::envelope(&body, 0)),
        Err(Rejection::BadSignature)
    );
}

#[test]
fn signature_does_not_transfer_between_actions() {
    let mut gate = gate();
    let online = encode_envelope(CommandKind::EnableOnline, "000042", Some(PSK.as_bytes()));
    let forged = online.replace("enable-online", "enable-offline");
    assert_eq!(
        gate.admit(&CommandMessage::envelope(&forged, 0)),
        Err(Rejection::BadSignature)
    );
}

#[test]
fn envelope_without_configured_key_fails_closed() {
    let mut gate = CommandGate::new(Some(SENDER), None);
    let body = encode_envelope(CommandKind::EnableOffline, "000042", Some(PSK.as_bytes()));
    assert_eq!(
        gate.admit(&CommandMessage::envelope(&body, 0)),
        Err(Rejection::NoCredentials)
    );
}

// ── Replay ───────────────────────────────────────────────────

#[test]
fn replayed_token_is_refused() {
    let mut gate = gate();
    let msg = CommandMessage::sms(SENDER, "OFFLINE-123456", 0);
    assert!(gate.admit(&msg).is_ok());
    assert_eq!(gate.admit(&msg), Err(Rejection::Replayed));
}

#[test]
fn same_token_for_opposite_action_is_distinct() {
    let mut gate = gate();
    assert!(gate.admit(&CommandMessage::sms(SENDER, "OFFLINE-123456", 0)).is_ok());
    assert!(gate.admit(&CommandMessage::sms(SENDER, "ONLINE-123456", 0)).is_ok());
}

#[test]
fn replayed_command_has_single_effect() {
    let mut ports = MockPorts::new();
    let mut sink = RecordingSink::new();
    let mut ctrl = ModeController::new(&config());
    let mut gate = gate();
    ctrl.restore(0, &mut ports, &mut sink);

    let msg = CommandMessage::sms(SENDER, "OFFLINE-777777", 0);
    for now in [0, 10] {
        match gate.admit(&msg) {
            Ok(cmd) => ctrl.on_command(&cmd, now, &mut ports, &mut sink),
            Err(reason) => sink.events.push(AppEvent::CommandRejected { reason }),
        }
    }

    assert_eq!(ctrl.current_mode(), Mode::Offline);
    assert_eq!(ctrl.trigger_source(), TriggerSource::Command);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::CommandApplied { .. })),
        1
    );
    assert!(sink.contains(&AppEvent::CommandRejected {
        reason: Rejection::Replayed
    }));
}

// ── Rate limit ───────────────────────────────────────────────

#[test]
fn burst_beyond_bucket_is_rate_limited() {
    let mut gate = gate();
    let verdicts: Vec<_> = (0..20)
        .map(|i| gate.admit(&CommandMessage::sms(SENDER, &format!("OFFLINE-{:06}", i), 0)))
        .collect();
    assert!(verdicts[..10].iter().all(Result::is_ok));
    assert_eq!(verdicts[10], Err(Rejection::RateLimited));
}
