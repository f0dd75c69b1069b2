//! Upload error types

use beacon_domain::{BeaconError, UploadResultStatus};
use thiserror::Error;

/// Errors raised while preparing a ping request.
///
/// Transport failures never surface here; the [`Transport`](super::Transport)
/// reports them as an [`UploadResult`](beacon_domain::UploadResult).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("Body for ping {identifier} is {size} bytes, exceeding the {max} bytes limit")]
    BodyOverflow { identifier: String, size: usize, max: usize },

    #[error("Failed to serialize ping body: {0}")]
    Serialization(String),
}

impl UploadError {
    /// Upload result this error amounts to. A request that cannot be built
    /// will never be sendable, so the ping is discarded.
    pub fn result(&self) -> UploadResultStatus {
        match self {
            Self::BodyOverflow { .. } | Self::Serialization(_) => {
                UploadResultStatus::UnrecoverableFailure
            }
        }
    }
}

impl From<serde_json::Error> for UploadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<UploadError> for BeaconError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::BodyOverflow { .. } => Self::InvalidInput(err.to_string()),
            UploadError::Serialization(msg) => Self::Serialization(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_are_unrecoverable() {
        let overflow = UploadError::BodyOverflow { identifier: "a".into(), size: 10, max: 5 };
        assert_eq!(overflow.result(), UploadResultStatus::UnrecoverableFailure);
        assert_eq!(
            UploadError::Serialization("bad".into()).result(),
            UploadResultStatus::UnrecoverableFailure
        );
    }

    #[test]
    fn converts_into_domain_errors() {
        let err: BeaconError = UploadError::Serialization("bad".into()).into();
        assert_eq!(err, BeaconError::Serialization("bad".into()));

        let err: BeaconError =
            UploadError::BodyOverflow { identifier: "a".into(), size: 10, max: 5 }.into();
        assert!(matches!(err, BeaconError::InvalidInput(_)));
    }
}
