//! End-to-end tests: client → SQLite → HTTP collector
//!
//! **Coverage:**
//! - Happy path: submit → persist → gzip POST → row deleted
//! - Collector outage: pings stay on disk and are delivered by the next
//!   session after `initialize`
//! - Client errors (4xx) discard the ping instead of retrying
//!
//! **Infrastructure:**
//! - Real SQLite database (tempdir)
//! - WireMock HTTP server standing in for the collector
//! - `build_client` wiring the default infrastructure

mod support;

use beacon_core::TelemetryClient;
use beacon_infra::build_client;
use support::{config, decode_body, payload, TestDatabase};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SUBMIT_PATH: &str = r"^/submit/infra-test/metrics/1/[0-9a-f-]{36}$";

async fn collector(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(SUBMIT_PATH))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

async fn settle(client: &TelemetryClient) {
    client.scheduler().test_launch(|| async { Ok(()) }).await.unwrap();
    client.uploader().block_on_ongoing_uploads().await;
}

#[tokio::test]
async fn submitted_pings_are_delivered_and_removed_from_disk() {
    let server = collector(200).await;
    let db = TestDatabase::new();
    let client = build_client(config(&server.uri(), Some(db.path()))).await.unwrap();
    client.initialize();

    assert!(client.submit_ping("metrics", payload(7), None));
    settle(&client).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.headers.get("content-encoding").unwrap().to_str().unwrap(), "gzip");
    assert!(request
        .headers
        .get("x-telemetry-agent")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("Beacon/"));
    assert_eq!(decode_body(&request.body), serde_json::Value::Object(payload(7)));

    assert!(client.ping_store().get_all_pings().await.unwrap().is_empty());
    client.shutdown().await;
}

#[tokio::test]
async fn pings_from_an_outage_are_sent_by_the_next_session() {
    let db = TestDatabase::new();

    let down = collector(503).await;
    let first = build_client(config(&down.uri(), Some(db.path()))).await.unwrap();
    first.initialize();
    for seq in 0..2 {
        assert!(first.submit_ping("metrics", payload(seq), None));
    }
    settle(&first).await;
    first.shutdown().await;
    drop(first);

    let failed = down.received_requests().await.unwrap().len();
    assert!(failed >= 1, "the outage should have been attempted");

    let up = collector(200).await;
    let second = build_client(config(&up.uri(), Some(db.path()))).await.unwrap();
    assert_eq!(second.ping_store().get_all_pings().await.unwrap().len(), 2);

    second.initialize();
    settle(&second).await;

    let delivered: Vec<serde_json::Value> = up
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| decode_body(&r.body)["seq"].clone())
        .collect();
    assert_eq!(delivered, [serde_json::json!(0), serde_json::json!(1)]);
    assert!(second.ping_store().get_all_pings().await.unwrap().is_empty());
    second.shutdown().await;
}

#[tokio::test]
async fn client_errors_discard_the_ping() {
    let server = collector(400).await;
    let db = TestDatabase::new();
    let client = build_client(config(&server.uri(), Some(db.path()))).await.unwrap();
    client.initialize();

    assert!(client.submit_ping("metrics", payload(1), None));
    settle(&client).await;

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(client.ping_store().get_all_pings().await.unwrap().is_empty());
    client.shutdown().await;
}
