//! reqwest-backed ping transport

use std::time::Duration;

use async_trait::async_trait;
use beacon_core::upload::Transport;
use beacon_domain::{BeaconError, PingHeaders, UploadConfig, UploadResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::errors::InfraError;

/// [`Transport`] that POSTs pings over HTTP(S).
///
/// Any response, whatever its status, is a `Success` carrying that status;
/// the uploader decides what the status means.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
}

impl HttpTransport {
    /// Start building a new transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport honouring the upload request timeout.
    pub fn from_config(config: &UploadConfig) -> Result<Self, BeaconError> {
        Self::builder().timeout(config.request_timeout()).build()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, body, headers), fields(body_len = body.len()))]
    async fn post(&self, url: &str, body: Vec<u8>, headers: &PingHeaders) -> UploadResult {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(err) => {
                warn!(%url, error = %err, "refusing to upload to an invalid URL");
                return UploadResult::unrecoverable();
            }
        };

        let header_map = match to_header_map(headers) {
            Ok(map) => map,
            Err(err) => {
                warn!(error = %err, "refusing to upload with invalid headers");
                return UploadResult::unrecoverable();
            }
        };

        match self.client.post(url).headers(header_map).body(body).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(status, "collector responded");
                UploadResult::success(status)
            }
            Err(err) => {
                let result = classify_error(&err);
                let mapped = BeaconError::from(InfraError::from(err));
                debug!(error = %mapped, ?result, "upload request failed");
                result
            }
        }
    }
}

fn to_header_map(headers: &PingHeaders) -> Result<HeaderMap, BeaconError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| BeaconError::InvalidInput(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| BeaconError::InvalidInput(format!("header '{name}' value: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Only a request that could not be built is hopeless; timeouts, refused
/// connections and broken bodies may succeed on a later attempt.
fn classify_error(err: &reqwest::Error) -> UploadResult {
    if err.is_builder() {
        UploadResult::unrecoverable()
    } else {
        UploadResult::recoverable()
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    timeout: Duration,
    user_agent: String,
    use_proxy: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: format!("beacon-infra/{}", env!("CARGO_PKG_VERSION")),
            use_proxy: false,
        }
    }
}

impl HttpTransportBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Honour `HTTP_PROXY`-style environment variables. Off by default.
    pub fn use_proxy(mut self, enabled: bool) -> Self {
        self.use_proxy = enabled;
        self
    }

    pub fn build(self) -> Result<HttpTransport, BeaconError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).user_agent(self.user_agent);
        if !self.use_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|err| BeaconError::from(InfraError::from(err)))?;
        Ok(HttpTransport { client })
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use beacon_domain::UploadResultStatus;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::builder().timeout(Duration::from_millis(500)).build().expect("transport")
    }

    #[tokio::test]
    async fn forwards_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit/app/metrics/1/abc"))
            .and(header("x-debug-id", "trace"))
            .and(body_bytes(b"{\"a\":1}".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = PingHeaders::new();
        headers.insert("X-Debug-ID".into(), "trace".into());
        let url = format!("{}/submit/app/metrics/1/abc", server.uri());

        let result = transport().post(&url, b"{\"a\":1}".to_vec(), &headers).await;
        assert_eq!(result, UploadResult::success(200));
    }

    #[tokio::test]
    async fn any_response_is_success_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = transport().post(&server.uri(), Vec::new(), &PingHeaders::new()).await;
        assert_eq!(result.result, UploadResultStatus::Success);
        assert_eq!(result.status, Some(503));
    }

    #[tokio::test]
    async fn connection_refused_is_recoverable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = transport()
            .post(&format!("http://127.0.0.1:{port}/submit"), Vec::new(), &PingHeaders::new())
            .await;
        assert_eq!(result, UploadResult::recoverable());
    }

    #[tokio::test]
    async fn timeout_is_recoverable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let result = transport().post(&server.uri(), Vec::new(), &PingHeaders::new()).await;
        assert_eq!(result, UploadResult::recoverable());
    }

    #[tokio::test]
    async fn invalid_url_is_unrecoverable() {
        let result = transport().post("not a url", Vec::new(), &PingHeaders::new()).await;
        assert_eq!(result, UploadResult::unrecoverable());
    }

    #[tokio::test]
    async fn invalid_header_is_unrecoverable() {
        let mut headers = PingHeaders::new();
        headers.insert("X-Bad".into(), "line\nbreak".into());

        let result = transport().post("http://127.0.0.1:1/", Vec::new(), &headers).await;
        assert_eq!(result, UploadResult::unrecoverable());
    }
}
