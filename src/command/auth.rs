//! Command gate: authenticate and de-duplicate before the controller.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. rate limit (token bucket, 10 burst / 10 per second)
//! 2. parse (fail closed)
//! 3. credentials: SMS needs an authorized sender, envelopes need a valid
//!    HMAC-SHA256 signature over `v1|<action>|<otp>`
//! 4. replay: `(kind, token)` pairs seen recently are refused
//!
//! HMAC verification is constant-time via `hmac-sha256`.

use burster::Limiter;
use core::time::Duration;
use heapless::Deque;
use log::{info, warn};

use super::parse::{self, ParsedCommand, WireForm};
use super::{Command, CommandKind, CommandMessage, Rejection, Token};
use crate::config::FallbackConfig;

/// Recently accepted `(kind, token)` pairs kept for replay detection.
pub const REPLAY_WINDOW: usize = 32;

/// Minimum digits both sides of a sender comparison must share.
const MIN_SENDER_DIGITS: usize = 6;

pub struct CommandGate {
    authorized_sender: Option<String>,
    psk: Option<Vec<u8>>,
    rate_limiter: burster::TokenBucket<fn() -> Duration>,
    seen: Deque<(CommandKind, Token), REPLAY_WINDOW>,
    accepted: u32,
    rejected: u32,
}

impl CommandGate {
    pub fn new(authorized_sender: Option<&str>, psk: Option<&[u8]>) -> Self {
        Self {
            authorized_sender: authorized_sender.map(normalize_number),
            psk: psk.map(<[u8]>::to_vec),
            rate_limiter: burster::TokenBucket::new_with_time_provider(
                10,
                10, // 10 tokens per second, 10 burst capacity
                platform_now as fn() -> Duration,
            ),
            seen: Deque::new(),
            accepted: 0,
            rejected: 0,
        }
    }

    pub fn from_config(cfg: &FallbackConfig) -> Self {
        Self::new(
            cfg.authorized_sender.as_deref(),
            cfg.command_psk.as_deref().map(str::as_bytes),
        )
    }

    /// Run every check.  On success the `(kind, token)` pair is remembered
    /// so the same command cannot be applied twice.
    pub fn admit(&mut self, msg: &CommandMessage) -> Result<Command, Rejection> {
        let verdict = self.check(msg);
        match &verdict {
            Ok(cmd) => {
                self.accepted = self.accepted.saturating_add(1);
                info!("gate: accepted {} ({})", cmd.kind.label(), cmd.token);
            }
            Err(why) => {
                self.rejected = self.rejected.saturating_add(1);
                warn!("gate: rejected command: {why}");
            }
        }
        verdict
    }

    fn check(&mut self, msg: &CommandMessage) -> Result<Command, Rejection> {
        if self.rate_limiter.try_consume(1).is_err() {
            return Err(Rejection::RateLimited);
        }

        let parsed = parse::parse_body(&msg.body).ok_or(Rejection::Malformed)?;

        match parsed.form {
            WireForm::Sms => self.check_sender(msg.sender.as_deref())?,
            WireForm::Envelope => self.check_signature(&parsed)?,
        }

        if self.seen_recently(parsed.kind, &parsed.token) {
            return Err(Rejection::Replayed);
        }
        self.remember(parsed.kind, parsed.token.clone());

        Ok(Command {
            kind: parsed.kind,
            token: parsed.token,
            received_at_ms: msg.received_at_ms,
        })
    }

    fn check_sender(&self, sender: Option<&str>) -> Result<(), Rejection> {
        let Some(authorized) = &self.authorized_sender else {
            return Err(Rejection::NoCredentials);
        };
        match sender {
            Some(s) if sender_matches(authorized, &normalize_number(s)) => Ok(()),
            _ => Err(Rejection::UnauthorizedSender),
        }
    }

    fn check_signature(&self, parsed: &ParsedCommand) -> Result<(), Rejection> {
        let Some(psk) = &self.psk else {
            return Err(Rejection::NoCredentials);
        };
        let Some(sig) = &parsed.sig else {
            return Err(Rejection::BadSignature);
        };
        let payload = parse::signing_payload(parsed.kind, parsed.token.as_str());
        if hmac_sha256::HMAC::verify(payload.as_bytes(), psk, sig) {
            Ok(())
        } else {
            Err(Rejection::BadSignature)
        }
    }

    fn seen_recently(&self, kind: CommandKind, token: &Token) -> bool {
        self.seen.iter().any(|(k, t)| *k == kind && t == token)
    }

    fn remember(&mut self, kind: CommandKind, token: Token) {
        if self.seen.is_full() {
            self.seen.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.seen.push_back((kind, token));
    }

    pub fn accepted(&self) -> u32 {
        self.accepted
    }

    pub fn rejected(&self) -> u32 {
        self.rejected
    }
}

/// Drop the spaces and dashes carriers and operators use to group digits.
pub fn normalize_number(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, ' ' | '-')).collect()
}

/// Suffix match in either direction over the digit tails, requiring at
/// least six shared digits.
pub fn sender_matches(authorized: &str, sender: &str) -> bool {
    let a = authorized.trim_start_matches('+');
    let s = sender.trim_start_matches('+');
    let shorter = a.len().min(s.len());
    if shorter < MIN_SENDER_DIGITS {
        return false;
    }
    a.ends_with(s) || s.ends_with(a)
}

// ── Platform time for rate limiter ───────────────────────────

fn platform_now() -> Duration {
    use std::time::Instant;
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    START.get_or_init(Instant::now).elapsed()
}
