//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one slice of the controller against the
//! recording mock ports.  Everything runs on the host with no network,
//! disk or clock involved: time is passed in explicitly.

mod command_tests;
mod controller_tests;
mod runtime_tests;
