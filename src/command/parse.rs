//! Wire-form parsers for command bodies.
//!
//! Two forms are accepted:
//!
//! ```text
//! envelope  {"v":1,"action":"enable-offline","otp":"123456","sig":"<64 hex>"}
//! sms       OFFLINE-123456 | ONLINE-123456
//! ```
//!
//! Both parsers fail closed: anything unexpected yields `None`, never a
//! partially filled command.  Signatures cover `v1|<action>|<otp>`.

use serde::{Deserialize, Serialize};

use super::{CommandKind, Token};

/// Only envelope version understood by this build.
pub const ENVELOPE_VERSION: u8 = 1;

/// Length of every one-time token.
pub const OTP_LEN: usize = 6;

/// Which wire form a command was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireForm {
    Envelope,
    Sms,
}

/// Parser output: a candidate command not yet authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    pub token: Token,
    pub form: WireForm,
    /// Envelope signature, if one was attached.
    pub sig: Option<[u8; 32]>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    v: u8,
    action: CommandKind,
    otp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sig: Option<String>,
}

/// Dispatch on shape: a body starting with `{` is an envelope, anything
/// else is tried as SMS text.
pub fn parse_body(body: &str) -> Option<ParsedCommand> {
    let trimmed = body.trim();
    if trimmed.starts_with('{') {
        parse_envelope(trimmed)
    } else {
        parse_sms(trimmed)
    }
}

pub fn parse_envelope(text: &str) -> Option<ParsedCommand> {
    let env: Envelope = serde_json::from_str(text).ok()?;
    if env.v != ENVELOPE_VERSION {
        return None;
    }
    let token = otp_token(&env.otp)?;
    let sig = match env.sig {
        Some(hex_sig) => {
            let mut raw = [0u8; 32];
            hex::decode_to_slice(hex_sig, &mut raw).ok()?;
            Some(raw)
        }
        None => None,
    };
    Some(ParsedCommand {
        kind: env.action,
        token,
        form: WireForm::Envelope,
        sig,
    })
}

pub fn parse_sms(text: &str) -> Option<ParsedCommand> {
    let text = text.trim();
    let (kind, otp) = if let Some(rest) = text.strip_prefix("OFFLINE-") {
        (CommandKind::EnableOffline, rest)
    } else if let Some(rest) = text.strip_prefix("ONLINE-") {
        (CommandKind::EnableOnline, rest)
    } else {
        return None;
    };
    Some(ParsedCommand {
        kind,
        token: otp_token(otp)?,
        form: WireForm::Sms,
        sig: None,
    })
}

/// Bytes covered by an envelope signature.
pub fn signing_payload(kind: CommandKind, otp: &str) -> String {
    format!("v{ENVELOPE_VERSION}|{}|{otp}", kind.label())
}

pub fn sign(kind: CommandKind, otp: &str, psk: &[u8]) -> [u8; 32] {
    hmac_sha256::HMAC::mac(signing_payload(kind, otp).as_bytes(), psk)
}

/// Build an envelope body, signed when `psk` is given.  Used by the
/// operator console and tests.
pub fn encode_envelope(kind: CommandKind, otp: &str, psk: Option<&[u8]>) -> String {
    let env = Envelope {
        v: ENVELOPE_VERSION,
        action: kind,
        otp: otp.to_owned(),
        sig: psk.map(|k| hex::encode(sign(kind, otp, k))),
    };
    // Serializing a plain struct of strings cannot fail.
    serde_json::to_string(&env).unwrap_or_default()
}

fn otp_token(otp: &str) -> Option<Token> {
    if otp.len() != OTP_LEN || !otp.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Token::try_from(otp).ok()
}
