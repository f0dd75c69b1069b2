//! Domain types and models

pub mod ping;
pub mod upload;

pub use ping::{build_submission_path, JsonObject, PingHeaders, PingRecord, QueuedPing};
pub use upload::{UploadOutcome, UploadResult, UploadResultStatus};
