//! Out-of-band commands.
//!
//! A raw [`CommandMessage`] arrives from the command channel (live or from
//! the pending slot).  [`parse`] turns its body into a candidate command,
//! and [`auth::CommandGate`] decides whether the controller gets to see it.

pub mod auth;
pub mod parse;

use core::fmt;

/// One-time token carried by every command (six ASCII digits on the wire).
pub type Token = heapless::String<16>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    EnableOffline,
    EnableOnline,
}

impl CommandKind {
    /// Wire label, also the signed action name.
    pub fn label(self) -> &'static str {
        match self {
            Self::EnableOffline => "enable-offline",
            Self::EnableOnline => "enable-online",
        }
    }
}

/// An authenticated command.  Immutable; consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub token: Token,
    pub received_at_ms: u64,
}

/// Raw message as delivered by the channel, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CommandMessage {
    /// Originating address for SMS delivery; `None` for envelopes that
    /// arrive over a local channel.
    #[serde(default)]
    pub sender: Option<String>,
    pub body: String,
    pub received_at_ms: u64,
}

impl CommandMessage {
    pub fn sms(sender: &str, body: &str, received_at_ms: u64) -> Self {
        Self {
            sender: Some(sender.to_owned()),
            body: body.to_owned(),
            received_at_ms,
        }
    }

    pub fn envelope(body: &str, received_at_ms: u64) -> Self {
        Self {
            sender: None,
            body: body.to_owned(),
            received_at_ms,
        }
    }
}

/// Why the gate refused a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    RateLimited,
    /// Body did not parse as any accepted wire form.
    Malformed,
    UnauthorizedSender,
    /// Envelope signature missing or wrong.
    BadSignature,
    /// Nothing to authenticate against: no sender configured for SMS,
    /// no key configured for envelopes.
    NoCredentials,
    /// Same `(kind, token)` seen recently.
    Replayed,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited"),
            Self::Malformed => write!(f, "malformed"),
            Self::UnauthorizedSender => write!(f, "unauthorized sender"),
            Self::BadSignature => write!(f, "bad signature"),
            Self::NoCredentials => write!(f, "no credentials configured"),
            Self::Replayed => write!(f, "replayed token"),
        }
    }
}
