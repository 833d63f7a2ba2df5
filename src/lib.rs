//! fwport library crate, re-exported for integration tests.
//!
//! The primary interface is the `fwport` binary. This lib.rs exposes the
//! engine modules so that integration tests can drive correlation and
//! replay against real repositories without going through the CLI.

pub mod config;
pub mod correlate;
pub mod eligibility;
pub mod error;
pub mod history;
pub mod migrate;
pub mod model;
pub mod port;
pub mod preflight;
pub mod prompt;
pub mod replay;
pub mod replay_state;
pub mod store;
pub mod telemetry;
