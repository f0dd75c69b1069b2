//! Upload attempt results and their classification

use serde::{Deserialize, Serialize};

/// Transport-level outcome of a single upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UploadResultStatus {
    /// Something went wrong before a response arrived (offline, timeout).
    RecoverableFailure,
    /// The request can never succeed (malformed URL, oversized body).
    UnrecoverableFailure,
    /// A response was received; `status` carries the HTTP code.
    Success,
}

/// Result of an attempted ping upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub result: UploadResultStatus,
    /// HTTP status, present only when a response was received.
    pub status: Option<u16>,
}

/// What the uploader does with a ping after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 2xx: delete from storage.
    Delivered,
    /// 4xx or unrecoverable: delete from storage, never retry.
    Discarded,
    /// Anything else: re-enqueue and count against the failure budget.
    Retry,
}

impl UploadResult {
    pub const fn success(status: u16) -> Self {
        Self { result: UploadResultStatus::Success, status: Some(status) }
    }

    pub const fn recoverable() -> Self {
        Self { result: UploadResultStatus::RecoverableFailure, status: None }
    }

    pub const fn unrecoverable() -> Self {
        Self { result: UploadResultStatus::UnrecoverableFailure, status: None }
    }

    /// Classify the attempt.
    ///
    /// The HTTP status takes precedence over the transport classification.
    pub fn classify(&self) -> UploadOutcome {
        match self.status {
            Some(code) if (200..300).contains(&code) => UploadOutcome::Delivered,
            Some(code) if (400..500).contains(&code) => UploadOutcome::Discarded,
            _ if self.result == UploadResultStatus::UnrecoverableFailure => {
                UploadOutcome::Discarded
            }
            _ => UploadOutcome::Retry,
        }
    }
}
