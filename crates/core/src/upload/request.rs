//! Upload request building

use std::io::Write;

use beacon_domain::constants::{
    HEADER_CONTENT_ENCODING, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE, HEADER_DATE,
    HEADER_TELEMETRY_AGENT, JSON_CONTENT_TYPE, SDK_VERSION,
};
use beacon_domain::{PingHeaders, QueuedPing, UploadConfig};
use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::warn;

use super::error::UploadError;

/// A ping ready to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingRequest {
    pub identifier: String,
    /// `server_endpoint` followed by the ping path.
    pub url: String,
    pub headers: PingHeaders,
    pub body: Vec<u8>,
}

impl PingRequest {
    /// Serialize `ping` and attach the standard headers.
    ///
    /// Caller-supplied headers come first; the standard ones override them.
    ///
    /// # Errors
    /// - [`UploadError::Serialization`] if the payload cannot be encoded
    /// - [`UploadError::BodyOverflow`] if the body exceeds
    ///   `max_ping_body_size`, before or after compression
    pub fn build(
        ping: &QueuedPing,
        server_endpoint: &str,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        let body = serde_json::to_vec(&ping.record.payload)?;
        check_size(&ping.identifier, body.len(), config.max_ping_body_size)?;

        let mut headers = ping.record.headers.clone().unwrap_or_default();
        headers.insert(HEADER_CONTENT_TYPE.to_string(), JSON_CONTENT_TYPE.to_string());
        headers.insert(HEADER_DATE.to_string(), http_date());
        headers.insert(HEADER_TELEMETRY_AGENT.to_string(), telemetry_agent());
        headers.insert(HEADER_CONTENT_LENGTH.to_string(), body.len().to_string());

        let request = Self {
            identifier: ping.identifier.clone(),
            url: format!("{}{}", server_endpoint.trim_end_matches('/'), ping.record.path),
            headers,
            body,
        };

        if config.compress {
            request.compressed(config.max_ping_body_size)
        } else {
            Ok(request)
        }
    }

    /// Gzip the body. Falls back to the plain body if compression fails.
    fn compressed(mut self, max_body_size: usize) -> Result<Self, UploadError> {
        if self.headers.get(HEADER_CONTENT_ENCODING).map(String::as_str) == Some("gzip") {
            return Ok(self);
        }

        let body = match gzip(&self.body) {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    identifier = %self.identifier,
                    error = %err,
                    "Failed to compress ping body, sending uncompressed"
                );
                return Ok(self);
            }
        };
        check_size(&self.identifier, body.len(), max_body_size)?;

        self.headers.insert(HEADER_CONTENT_ENCODING.to_string(), "gzip".to_string());
        self.headers.insert(HEADER_CONTENT_LENGTH.to_string(), body.len().to_string());
        self.body = body;
        Ok(self)
    }
}

fn check_size(identifier: &str, size: usize, max: usize) -> Result<(), UploadError> {
    if size > max {
        return Err(UploadError::BodyOverflow { identifier: identifier.to_string(), size, max });
    }
    Ok(())
}

fn gzip(body: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body)?;
    encoder.finish()
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn telemetry_agent() -> String {
    format!("Beacon/{SDK_VERSION} (Rust on {})", std::env::consts::OS)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use beacon_domain::{PingRecord, UploadResultStatus};
    use flate2::read::GzDecoder;
    use serde_json::json;

    use super::*;

    fn queued(headers: Option<PingHeaders>) -> QueuedPing {
        let payload = json!({ "ping_info": { "seq": 7 } }).as_object().cloned().unwrap();
        QueuedPing::new("abc", PingRecord::new("/submit/app/metrics/1/abc", payload, headers))
    }

    fn plain() -> UploadConfig {
        UploadConfig { compress: false, ..UploadConfig::default() }
    }

    #[test]
    fn builds_url_and_standard_headers() {
        let mut custom = PingHeaders::new();
        custom.insert("X-Source-Tags".into(), "automation".into());
        custom.insert(HEADER_CONTENT_TYPE.into(), "text/plain".into());

        let request = PingRequest::build(&queued(Some(custom)), "https://collector.example/", &plain())
            .unwrap();

        assert_eq!(request.url, "https://collector.example/submit/app/metrics/1/abc");
        assert_eq!(request.headers["X-Source-Tags"], "automation");
        assert_eq!(request.headers[HEADER_CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(request.headers[HEADER_CONTENT_LENGTH], request.body.len().to_string());
        assert!(request.headers[HEADER_TELEMETRY_AGENT].starts_with("Beacon/"));
        assert!(request.headers[HEADER_DATE].ends_with("GMT"));
        assert!(!request.headers.contains_key(HEADER_CONTENT_ENCODING));
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&request.body).unwrap(),
            json!({ "ping_info": { "seq": 7 } })
        );
    }

    #[test]
    fn gzips_body_when_enabled() {
        let request =
            PingRequest::build(&queued(None), "http://localhost", &UploadConfig::default()).unwrap();
        assert_eq!(request.headers[HEADER_CONTENT_ENCODING], "gzip");
        assert_eq!(request.headers[HEADER_CONTENT_LENGTH], request.body.len().to_string());

        let mut decoded = String::new();
        GzDecoder::new(request.body.as_slice()).read_to_string(&mut decoded).unwrap();
        assert_eq!(decoded, r#"{"ping_info":{"seq":7}}"#);
    }

    #[test]
    fn rejects_oversized_bodies() {
        let config = UploadConfig { max_ping_body_size: 8, ..plain() };
        let err = PingRequest::build(&queued(None), "http://localhost", &config).unwrap_err();
        assert!(matches!(err, UploadError::BodyOverflow { max: 8, .. }));
        assert_eq!(err.result(), UploadResultStatus::UnrecoverableFailure);
    }
}
