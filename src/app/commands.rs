//! Inbound requests to the application core.
//!
//! These come from the host (UI, operator console, lifecycle hooks) rather
//! than from the out-of-band command channel, and need no authentication.

/// Requests that external adapters can send into the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRequest {
    /// Manual sync; obeys every guard of the automatic path.
    ForceSync,

    /// App came back to the foreground: re-read the pending command slot.
    ResumeForeground,

    /// Run a connectivity probe now and feed the result to the debouncer.
    ProbeNow,
}
