//! # Beacon Infrastructure
//!
//! Infrastructure implementations of the ports defined in `beacon-core`.
//!
//! This crate contains:
//! - The SQLite-backed durable store (`r2d2` + `rusqlite`)
//! - The `reqwest` ping transport
//! - Configuration loading from the environment and TOML/JSON files
//! - `tracing-subscriber` initialisation
//!
//! ## Architecture
//! - Implements `Store` and `Transport` from `beacon-core`
//! - Contains all I/O; `beacon-core` stays free of it

pub mod bootstrap;
pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;

pub use bootstrap::build_client;
pub use database::{DbManager, SqliteStore};
pub use errors::InfraError;
pub use http::HttpTransport;
pub use observability::init_logging;
