//! Ping uploader
//!
//! Pings reach the uploader through [`PingObserver::update`]: the ping store
//! calls it synchronously after every write and when replaying the backlog
//! at startup. The uploader enqueues the ping and, if idle, spawns a drain
//! job that:
//!
//! 1. Pops the oldest queued ping, marking it as in flight
//! 2. Builds and posts the request through the [`Transport`]
//! 3. Deletes the ping on 2xx, 4xx or unrecoverable failures, or re-enqueues
//!    it at the tail on recoverable failures
//!
//! The job ends when the queue is empty, when cancelled, when the rate
//! limiter made it wait too often, or after `max_recoverable_failures`
//! consecutive recoverable failures. Whatever remains queued waits for the
//! next trigger.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use beacon_domain::{
    impl_state_conversions, PingRecord, QueuedPing, Result, UploadConfig, UploadOutcome,
    UploadResult,
};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::rate_limiter::{RateLimiter, RateLimiterState};
use super::request::PingRequest;
use super::Transport;
use crate::pings::{PingObserver, PingStore};

/// Lifecycle state of the upload lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploaderState {
    Idle,
    Uploading,
    Cancelling,
}

impl_state_conversions!(UploaderState {
    Idle => "idle",
    Uploading => "uploading",
    Cancelling => "cancelling",
});

type UploadJob = Shared<BoxFuture<'static, ()>>;

enum UploadTask {
    Upload(QueuedPing),
    Wait(Duration),
    Done,
}

struct UploadLane {
    state: UploaderState,
    queue: VecDeque<QueuedPing>,
    /// Identifiers popped from the queue whose response is not processed yet.
    processing: HashSet<String>,
    recoverable_failures: u32,
    wait_attempts: u32,
    rate_limiter: RateLimiter,
    current_job: Option<UploadJob>,
    /// Cancels the current job only; every trigger creates a fresh one.
    cancellation: CancellationToken,
}

/// Delivers pings recorded in a [`PingStore`] with bounded retry.
pub struct PingUploader {
    this: Weak<Self>,
    pings: Arc<PingStore>,
    transport: Arc<dyn Transport>,
    server_endpoint: String,
    config: UploadConfig,
    lane: Mutex<UploadLane>,
    runtime: Handle,
}

impl PingUploader {
    /// Create an uploader and attach it as an observer of `pings`.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(
        pings: Arc<PingStore>,
        transport: Arc<dyn Transport>,
        server_endpoint: impl Into<String>,
        config: UploadConfig,
    ) -> Arc<Self> {
        Self::with_runtime(pings, transport, server_endpoint, config, Handle::current())
    }

    /// Like [`new`](Self::new), spawning upload jobs on `runtime`.
    pub fn with_runtime(
        pings: Arc<PingStore>,
        transport: Arc<dyn Transport>,
        server_endpoint: impl Into<String>,
        config: UploadConfig,
        runtime: Handle,
    ) -> Arc<Self> {
        let rate_limiter =
            RateLimiter::new(config.rate_limit_interval(), config.rate_limit_max_pings);
        let uploader = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            pings: Arc::clone(&pings),
            transport,
            server_endpoint: server_endpoint.into(),
            config,
            lane: Mutex::new(UploadLane {
                state: UploaderState::Idle,
                queue: VecDeque::new(),
                processing: HashSet::new(),
                recoverable_failures: 0,
                wait_attempts: 0,
                rate_limiter,
                current_job: None,
                cancellation: CancellationToken::new(),
            }),
            runtime,
        });
        pings.attach_observer(&uploader);
        uploader
    }

    pub fn state(&self) -> UploaderState {
        self.lane.lock().state
    }

    /// Identifiers waiting in the queue, oldest first.
    pub fn queued_identifiers(&self) -> Vec<String> {
        self.lane.lock().queue.iter().map(|p| p.identifier.clone()).collect()
    }

    /// Replay the quota-bounded backlog of the ping store into the queue.
    pub async fn scan_pending_pings(&self) -> Result<()> {
        self.pings.scan_pending_pings().await
    }

    /// Start a drain job unless one is already running.
    pub fn trigger_upload(&self) {
        let mut lane = self.lane.lock();
        if lane.state != UploaderState::Idle {
            debug!(state = %lane.state, "Upload already in progress");
            return;
        }
        if lane.queue.is_empty() {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        lane.state = UploaderState::Uploading;
        lane.recoverable_failures = 0;
        lane.wait_attempts = 0;
        lane.cancellation = CancellationToken::new();

        let handle = self.runtime.spawn(this.drain(lane.cancellation.clone()));
        let job = async move {
            if let Err(err) = handle.await {
                error!(error = %err, "Ping upload job aborted");
            }
        }
        .boxed()
        .shared();
        lane.current_job = Some(job);
    }

    /// Ask the running drain job to stop after the in-flight ping, and wait
    /// for it to finish.
    pub async fn cancel_upload(&self) {
        let job = {
            let mut lane = self.lane.lock();
            if lane.state == UploaderState::Idle {
                return;
            }
            lane.state = UploaderState::Cancelling;
            lane.cancellation.cancel();
            lane.current_job.clone()
        };

        if let Some(job) = job {
            job.await;
        }
    }

    /// Cancel in-flight work, then drop every queued ping except deletion
    /// requests, which are uploaded right away.
    ///
    /// Stored pings are left untouched.
    pub async fn clear_pending_pings_queue(&self) {
        self.cancel_upload().await;
        let (dropped, kept) = {
            let mut lane = self.lane.lock();
            let before = lane.queue.len();
            lane.queue.retain(QueuedPing::is_deletion_request);
            (before - lane.queue.len(), lane.queue.len())
        };
        info!(dropped, kept, "Cleared pending pings queue");
        self.trigger_upload();
    }

    /// Wait for the running drain job, if any, without cancelling it.
    pub async fn block_on_ongoing_uploads(&self) {
        let job = self.lane.lock().current_job.clone();
        if let Some(job) = job {
            job.await;
        }
    }

    /// Append `ping` unless it is already queued or in flight.
    fn enqueue(&self, ping: QueuedPing) -> bool {
        let mut lane = self.lane.lock();
        if lane.processing.contains(&ping.identifier)
            || lane.queue.iter().any(|p| p.identifier == ping.identifier)
        {
            debug!(identifier = %ping.identifier, "Ping already queued");
            return false;
        }
        lane.queue.push_back(ping);
        true
    }

    async fn drain(self: Arc<Self>, cancellation: CancellationToken) {
        let mut guard = IdleOnDrop { lane: &self.lane, armed: true };

        loop {
            match self.next_task() {
                UploadTask::Done => break,
                UploadTask::Wait(remaining) => {
                    debug!(
                        remaining_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                        "Ping uploads throttled"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(remaining) => {}
                        () = cancellation.cancelled() => {}
                    }
                }
                UploadTask::Upload(ping) => {
                    let result = self.attempt_upload(&ping).await;
                    if let Err(err) = self.process_response(ping, result).await {
                        error!(error = %err, "Failed to process ping upload response");
                    }
                }
            }
        }

        guard.armed = false;
    }

    /// Decide the next step. Every `Done` returns the lane to `Idle` under
    /// the same lock, so a concurrent trigger never sees a finished job as
    /// running.
    fn next_task(&self) -> UploadTask {
        let mut lane = self.lane.lock();

        if lane.state == UploaderState::Cancelling {
            debug!("Ping upload cancelled");
            lane.state = UploaderState::Idle;
            return UploadTask::Done;
        }

        if lane.recoverable_failures >= self.config.max_recoverable_failures {
            warn!(
                failures = lane.recoverable_failures,
                "Reached maximum recoverable upload failures for the current uploading window"
            );
            lane.state = UploaderState::Idle;
            return UploadTask::Done;
        }

        if lane.queue.is_empty() {
            lane.state = UploaderState::Idle;
            return UploadTask::Done;
        }

        if let RateLimiterState::Throttled { remaining } = lane.rate_limiter.try_acquire() {
            lane.wait_attempts += 1;
            if lane.wait_attempts > self.config.max_wait_attempts {
                info!(
                    attempts = lane.wait_attempts,
                    "Ping uploads throttled for too long, retrying on next trigger"
                );
                lane.state = UploaderState::Idle;
                return UploadTask::Done;
            }
            return UploadTask::Wait(remaining);
        }
        lane.wait_attempts = 0;

        match lane.queue.pop_front() {
            Some(ping) => {
                lane.processing.insert(ping.identifier.clone());
                UploadTask::Upload(ping)
            }
            None => {
                lane.state = UploaderState::Idle;
                UploadTask::Done
            }
        }
    }

    async fn attempt_upload(&self, ping: &QueuedPing) -> UploadResult {
        let request = match PingRequest::build(ping, &self.server_endpoint, &self.config) {
            Ok(request) => request,
            Err(err) => {
                warn!(identifier = %ping.identifier, error = %err, "Failed to build ping request");
                return UploadResult { result: err.result(), status: None };
            }
        };

        metrics::counter!("beacon.upload.attempts").increment(1);
        debug!(identifier = %ping.identifier, url = %request.url, "Uploading ping");
        self.transport.post(&request.url, request.body, &request.headers).await
    }

    async fn process_response(&self, ping: QueuedPing, response: UploadResult) -> Result<()> {
        let identifier = ping.identifier.clone();
        self.lane.lock().processing.remove(&identifier);

        match response.classify() {
            UploadOutcome::Delivered => {
                info!(identifier = %identifier, status = ?response.status, "Ping successfully sent");
                metrics::counter!("beacon.upload.success").increment(1);
                self.lane.lock().recoverable_failures = 0;
                self.pings.delete_ping(&identifier).await
            }
            UploadOutcome::Discarded => {
                warn!(
                    identifier = %identifier,
                    status = ?response.status,
                    "Unrecoverable upload failure, discarding ping"
                );
                metrics::counter!("beacon.upload.unrecoverable").increment(1);
                self.pings.delete_ping(&identifier).await
            }
            UploadOutcome::Retry => {
                warn!(
                    identifier = %identifier,
                    status = ?response.status,
                    "Recoverable upload failure, will retry"
                );
                metrics::counter!("beacon.upload.recoverable").increment(1);
                self.lane.lock().recoverable_failures += 1;
                self.enqueue(ping);
                Ok(())
            }
        }
    }
}

impl PingObserver for PingUploader {
    fn update(&self, identifier: &str, ping: &PingRecord) {
        self.enqueue(QueuedPing::new(identifier, ping.clone()));
        self.trigger_upload();
    }
}

impl std::fmt::Debug for PingUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lane = self.lane.lock();
        f.debug_struct("PingUploader")
            .field("server_endpoint", &self.server_endpoint)
            .field("state", &lane.state)
            .field("queued", &lane.queue.len())
            .field("processing", &lane.processing.len())
            .finish_non_exhaustive()
    }
}

/// Returns the lane to `Idle` if the drain job unwinds.
struct IdleOnDrop<'a> {
    lane: &'a Mutex<UploadLane>,
    armed: bool,
}

impl Drop for IdleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            error!("Ping upload job ended unexpectedly");
            self.lane.lock().state = UploaderState::Idle;
        }
    }
}
