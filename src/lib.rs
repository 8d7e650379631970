//! Offline-fallback controller library.
//!
//! Exposes the domain core (mode state machine, debouncer, command gate,
//! sync engine) together with the host adapters, so integration tests and
//! embedding applications can wire their own ports.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod command;
pub mod config;
pub mod connectivity;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fsm;
pub mod scheduler;
