//! Unified error types for the offline-fallback controller.
//!
//! Every port returns a small `Copy` error enum so failures can be logged,
//! emitted as events and compared in tests without allocation.  The
//! top-level [`Error`] gathers them for callers that want a single type.
//!
//! None of these errors are fatal: the controller degrades (retains its
//! previous stable state, or keeps an in-memory-only transition) instead of
//! propagating.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The durable key-value store failed.
    Storage(StorageError),
    /// A connectivity probe could not be completed.
    Probe(ProbeError),
    /// The command channel could not be read.
    CommandSource(CommandSourceError),
    /// The pending-work source failed.
    Work(WorkError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Probe(e) => write!(f, "probe: {e}"),
            Self::CommandSource(e) => write!(f, "command channel: {e}"),
            Self::Work(e) => write!(f, "work queue: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Errors from [`StoragePort`](crate::app::ports::StoragePort) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The backing medium rejected the read or write.
    Io,
    /// The stored value could not be decoded.
    Corrupted,
    /// The store has no room left.
    Full,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored value corrupted"),
            Self::Full => write!(f, "storage full"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity probe
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe did not answer before its deadline.
    Timeout,
    /// The probe target could not be resolved or is malformed.
    BadTarget,
    /// The platform refused to run the probe.
    Unavailable,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "probe timed out"),
            Self::BadTarget => write!(f, "probe target invalid"),
            Self::Unavailable => write!(f, "probe unavailable"),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<ProbeError> for Error {
    fn from(e: ProbeError) -> Self {
        Self::Probe(e)
    }
}

// ---------------------------------------------------------------------------
// Command channel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSourceError {
    /// The pending-command slot could not be read or cleared.
    Io,
    /// The channel is not ready (e.g. receiver permissions missing).
    Unavailable,
}

impl fmt::Display for CommandSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "pending slot I/O error"),
            Self::Unavailable => write!(f, "command channel unavailable"),
        }
    }
}

impl std::error::Error for CommandSourceError {}

impl From<CommandSourceError> for Error {
    fn from(e: CommandSourceError) -> Self {
        Self::CommandSource(e)
    }
}

// ---------------------------------------------------------------------------
// Work queue
// ---------------------------------------------------------------------------

/// Errors from [`WorkQueuePort`](crate::app::ports::WorkQueuePort).
///
/// `Rejected` carries a static reason so a failed item can be surfaced as a
/// sync failure message without allocating in the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkError {
    /// Pending items could not be listed.
    Fetch,
    /// A single item was rejected by the remote side.
    Rejected(&'static str),
    /// The transfer itself failed (network dropped mid-batch).
    Transfer,
    /// Synced items could not be acknowledged locally.
    Commit,
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "could not list pending items"),
            Self::Rejected(why) => write!(f, "item rejected: {why}"),
            Self::Transfer => write!(f, "transfer failed"),
            Self::Commit => write!(f, "could not acknowledge synced items"),
        }
    }
}

impl std::error::Error for WorkError {}

impl From<WorkError> for Error {
    fn from(e: WorkError) -> Self {
        Self::Work(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file exists but could not be parsed.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error while reading the config.
    Io,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
