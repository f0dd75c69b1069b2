use async_trait::async_trait;
use beacon_domain::{PingHeaders, UploadResult};

/// Network transport used to deliver pings.
///
/// Implementations never fail: every outcome, including network errors, is
/// reported through the returned [`UploadResult`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with the given headers.
    async fn post(&self, url: &str, body: Vec<u8>, headers: &PingHeaders) -> UploadResult;
}
