//! Observability setup
//!
//! The SDK emits `tracing` events and `metrics` counters but installs
//! nothing by itself; hosts call [`init_logging`] when they want the SDK to
//! own the global subscriber.

pub mod logging;

pub use logging::{init_logging, LOG_ENV_VAR};
