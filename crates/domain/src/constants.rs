//! SDK constants
//!
//! Centralized location for the defaults and wire-level names used by the
//! scheduler, the ping store and the uploader.

/// Version reported in the `X-Telemetry-Agent` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the ping type that is exempt from storage quotas.
pub const DELETION_REQUEST_PING_NAME: &str = "deletion-request";
/// Schema version segment used when building submission paths.
pub const PING_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_SERVER_ENDPOINT: &str = "https://incoming.telemetry.example.org";

// Scheduler
pub const DEFAULT_MAX_PRE_INIT_QUEUE_SIZE: usize = 100;
pub const DEFAULT_TEST_TASK_TIMEOUT_MS: u64 = 1_000;

// Ping storage quotas
pub const DEFAULT_MAX_PENDING_PINGS_COUNT: usize = 250;
pub const DEFAULT_MAX_PENDING_PINGS_SIZE: usize = 10 * 1024 * 1024; // 10 MiB
pub const PINGS_STORE_NAME: &str = "pings";

// Upload policy
pub const DEFAULT_MAX_RECOVERABLE_FAILURES: u32 = 3;
pub const DEFAULT_MAX_WAIT_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_PING_BODY_SIZE: usize = 1024 * 1024; // 1 MiB
pub const DEFAULT_RATE_LIMIT_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_RATE_LIMIT_MAX_PINGS: u32 = 40;
pub const DEFAULT_UPLOAD_TIMEOUT_MS: u64 = 10_000;

// Headers attached to every upload
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_CONTENT_ENCODING: &str = "Content-Encoding";
pub const HEADER_DATE: &str = "Date";
pub const HEADER_TELEMETRY_AGENT: &str = "X-Telemetry-Agent";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
