//! # Beacon Domain
//!
//! Domain types shared by every Beacon crate.
//!
//! This crate contains:
//! - The crate-wide error type and `Result` alias
//! - Configuration structures and their validation
//! - Ping records, upload results and related constants
//!
//! ## Architecture
//! - No dependencies on other Beacon crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
