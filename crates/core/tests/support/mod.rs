//! Shared test helpers for `beacon-core` integration tests.
//!
//! Lightweight transport and observer mocks so pipeline tests can focus on
//! behaviour instead of boilerplate.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use beacon_core::upload::Transport;
use beacon_core::PingObserver;
use beacon_domain::{JsonObject, PingHeaders, PingRecord, UploadResult};
use serde_json::json;

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: PingHeaders,
}

impl CapturedRequest {
    /// Document identifier, i.e. the last path segment of the URL.
    pub fn document_id(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or_default()
    }
}

/// In-memory transport returning scripted results.
///
/// Scripted results are consumed first; afterwards every request gets the
/// fallback result, which tests can swap to simulate the network coming
/// back.
pub struct MockTransport {
    script: Mutex<VecDeque<UploadResult>>,
    fallback: Mutex<UploadResult>,
    requests: Mutex<Vec<CapturedRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn always(result: UploadResult) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(result),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, results: impl IntoIterator<Item = UploadResult>) {
        self.script.lock().unwrap().extend(results);
    }

    pub fn set_fallback(&self, result: UploadResult) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, url: &str, body: Vec<u8>, headers: &PingHeaders) -> UploadResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(CapturedRequest {
            url: url.to_string(),
            body,
            headers: headers.clone(),
        });
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or(*self.fallback.lock().unwrap())
    }
}

/// Observer recording every notification.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(String, PingRecord)>>,
}

impl RecordingObserver {
    pub fn identifiers(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

impl PingObserver for RecordingObserver {
    fn update(&self, identifier: &str, ping: &PingRecord) {
        self.seen.lock().unwrap().push((identifier.to_string(), ping.clone()));
    }
}

/// A small ping payload tagged with `seq`.
pub fn payload(seq: u64) -> JsonObject {
    json!({ "ping_info": { "seq": seq }, "metrics": { "counter": { "clicks": 3 } } })
        .as_object()
        .cloned()
        .unwrap()
}
