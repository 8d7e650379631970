//! Fuzz target: `parse_sms`
//!
//! Invariants checked:
//! - No panics under any input
//! - Accepted text always starts with `OFFLINE-` or `ONLINE-` (after trim)
//!   followed by exactly six ASCII digits
//!
//! cargo fuzz run fuzz_sms_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use offline_fallback::command::CommandKind;
use offline_fallback::command::parse::parse_sms;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Some(parsed) = parse_sms(text) else {
        return;
    };

    let prefix = match parsed.kind {
        CommandKind::EnableOffline => "OFFLINE-",
        CommandKind::EnableOnline => "ONLINE-",
    };
    let expected = format!("{prefix}{}", parsed.token);
    assert_eq!(text.trim(), expected);
});
