//! # Beacon Core
//!
//! Concurrency core of the Beacon telemetry SDK - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - The serial task scheduler every SDK operation runs on
//! - The durable store port and an in-memory implementation
//! - The quota-bounded ping store
//! - The ping uploader and its transport port
//! - The client facade wiring them together
//!
//! ## Architecture Principles
//! - Only depends on `beacon-domain`
//! - No database or HTTP code; storage and network sit behind traits
//! - Components are explicitly constructed and injected, never global

pub mod client;
pub mod pings;
pub mod scheduler;
pub mod storage;
pub mod upload;

pub use client::TelemetryClient;
pub use pings::{PingObserver, PingStore};
pub use scheduler::{Scheduler, SchedulerError, SchedulerState};
pub use storage::{MemoryStore, Store};
pub use upload::{PingUploader, Transport, UploadError, UploaderState};
