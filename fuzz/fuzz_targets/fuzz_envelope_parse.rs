//! Fuzz target: `parse_envelope`
//!
//! Feeds arbitrary UTF-8 to the JSON envelope parser.
//!
//! Invariants checked:
//! - No panics under any input
//! - An accepted envelope always carries a six-digit token
//! - Re-encoding an accepted envelope parses back to the same command
//!
//! cargo fuzz run fuzz_envelope_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use offline_fallback::command::parse::{OTP_LEN, encode_envelope, parse_envelope};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let Some(parsed) = parse_envelope(text) else {
        return;
    };

    assert_eq!(parsed.token.len(), OTP_LEN);
    assert!(parsed.token.bytes().all(|b| b.is_ascii_digit()));

    let again = encode_envelope(parsed.kind, &parsed.token, None);
    let reparsed = parse_envelope(&again).expect("re-encoded envelope must parse");
    assert_eq!(reparsed.kind, parsed.kind);
    assert_eq!(reparsed.token, parsed.token);
    assert!(reparsed.sig.is_none());
});
