//! Application core — domain logic behind port traits.
//!
//! Mode arbitration, countdown recovery, command priority and the
//! return-to-online sync live here.  All interaction with storage, the
//! network and the command channel happens through the traits in
//! [`ports`], keeping this layer testable without real I/O.

pub mod commands;
pub mod events;
pub mod ports;
pub mod runtime;
pub mod service;
pub mod subscription;
pub mod sync;
