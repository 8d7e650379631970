//! Fuzz target: `CommandGate::admit`
//!
//! Splits the input into a sender and a body and runs the full gate
//! with both credentials configured.
//!
//! Invariants checked:
//! - No panics under any input
//! - An admitted message is never admitted a second time
//!
//! cargo fuzz run fuzz_command_gate

#![no_main]

use libfuzzer_sys::fuzz_target;
use offline_fallback::command::auth::CommandGate;
use offline_fallback::command::{CommandMessage, Rejection};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let (sender, body) = text.split_once('\n').unwrap_or(("+254748755840", text));

    let mut gate = CommandGate::new(Some("+254748755840"), Some(b"fuzz-key"));
    let msg = CommandMessage::sms(sender, body, 0);
    if gate.admit(&msg).is_ok() {
        assert_eq!(gate.admit(&msg), Err(Rejection::Replayed));
    }
});
