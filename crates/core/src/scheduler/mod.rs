//! Serial task scheduler.
//!
//! Every recording operation and administrative command is packaged as a
//! task and executed on a single lane, strictly one at a time and in
//! submission order. The lane is a single drain job spawned on the Tokio
//! runtime whenever the scheduler goes from `Idle` to `Processing`; it pops
//! commands off a deque until the queue is empty or a `Stop`/`Shutdown`
//! command is reached.
//!
//! Control commands differ in placement:
//! - `Stop` and `Clear` are inserted at the head and take effect as soon as
//!   the in-flight task settles.
//! - `Shutdown` is appended at the tail so everything queued before it runs
//!   first. It overrides a previous `Stop` and an unfinished initialization.
//!
//! While `Uninitialized`, at most `max_pre_init_queue_size` tasks are
//! buffered; extra launches are dropped with a warning.
//!
//! # Example
//!
//! ```no_run
//! use beacon_core::scheduler::Scheduler;
//! use beacon_domain::SchedulerConfig;
//!
//! # async fn example() {
//! let scheduler = Scheduler::new(SchedulerConfig::default());
//! scheduler.launch(|| async {
//!     // record a metric
//!     Ok(())
//! });
//! scheduler.flush_init();
//! scheduler.shutdown().await;
//! # }
//! ```

mod command;
mod error;

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use beacon_domain::{impl_state_conversions, SchedulerConfig};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, error, info, warn};

use self::command::{Action, Command};
pub use self::command::{CommandKind, SchedulerEvent, TaskBody, TaskFuture, TaskId};
pub use self::error::{SchedulerError, SchedulerResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of a [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Buffering a bounded number of tasks until `flush_init`.
    Uninitialized,
    /// Nothing queued, no drain job running.
    Idle,
    /// A drain job is executing queued commands.
    Processing,
    /// Halted by `stop`; queued tasks wait for `resume`.
    Stopped,
    /// Terminal. Launches are dropped.
    Shutdown,
}

impl_state_conversions!(SchedulerState {
    Uninitialized => "uninitialized",
    Idle => "idle",
    Processing => "processing",
    Stopped => "stopped",
    Shutdown => "shutdown",
});

type DrainJob = Shared<BoxFuture<'static, ()>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Placement {
    Head,
    Tail,
}

struct Lane {
    queue: VecDeque<Command>,
    state: SchedulerState,
    /// A Shutdown command is queued but has not run yet.
    shutting_down: bool,
    current_job: Option<DrainJob>,
}

struct SchedulerCore {
    lane: Mutex<Lane>,
    config: SchedulerConfig,
    runtime: Handle,
    events: broadcast::Sender<SchedulerEvent>,
    next_id: AtomicU64,
}

/// Single-lane FIFO scheduler for asynchronous tasks.
///
/// Cloning yields another handle to the same lane.
#[derive(Clone)]
pub struct Scheduler {
    core: Arc<SchedulerCore>,
}

impl Scheduler {
    /// Create a scheduler whose drain job runs on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_runtime(config, Handle::current())
    }

    /// Create a scheduler whose drain job runs on `runtime`.
    pub fn with_runtime(config: SchedulerConfig, runtime: Handle) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            core: Arc::new(SchedulerCore {
                lane: Mutex::new(Lane {
                    queue: VecDeque::new(),
                    state: SchedulerState::Uninitialized,
                    shutting_down: false,
                    current_job: None,
                }),
                config,
                runtime,
                events,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.core.lane.lock().state
    }

    /// Number of commands waiting in the queue.
    pub fn queued(&self) -> usize {
        self.core.lane.lock().queue.len()
    }

    /// Receive a [`SchedulerEvent`] after every executed command.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.core.events.subscribe()
    }

    /// Append a task at the tail of the queue.
    ///
    /// Returns whether the task was accepted. Tasks are refused once the
    /// scheduler is shut down, or while uninitialized with a full pre-init
    /// queue.
    pub fn launch<F, Fut>(&self, body: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.launch_task(boxed(body), false, None)
    }

    /// Like [`launch`](Self::launch), with a tag used when logging the task.
    pub fn launch_tagged<F, Fut>(&self, tag: impl Into<String>, body: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.launch_task(boxed(body), false, Some(tag.into()))
    }

    /// Like [`launch`](Self::launch), but the task survives `clear`.
    pub fn launch_persistent<F, Fut>(&self, body: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.launch_task(boxed(body), true, None)
    }

    fn launch_task(&self, body: TaskBody, persistent: bool, tag: Option<String>) -> bool {
        self.enqueue(Action::Task { body, persistent, tag }, Placement::Tail)
    }

    /// Leave the `Uninitialized` state and start draining buffered tasks.
    ///
    /// Returns `false` (and logs) if the scheduler was already initialized.
    pub fn flush_init(&self) -> bool {
        self.flush_init_internal(None)
    }

    /// Like [`flush_init`](Self::flush_init), running `body` ahead of every
    /// task buffered before initialization.
    pub fn flush_init_with<F, Fut>(&self, body: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.flush_init_internal(Some(boxed(body)))
    }

    fn flush_init_internal(&self, body: Option<TaskBody>) -> bool {
        let mut lane = self.core.lane.lock();
        if lane.state != SchedulerState::Uninitialized {
            warn!(
                state = %lane.state,
                "Attempted to initialize the scheduler, but it is already initialized. Ignoring."
            );
            return false;
        }

        if let Some(body) = body {
            let id = self.next_id();
            lane.queue.push_front(Command {
                id,
                action: Action::Task { body, persistent: false, tag: Some("init".into()) },
            });
        }

        lane.state = SchedulerState::Idle;
        info!(buffered = lane.queue.len(), "Scheduler initialized");
        self.trigger_execution(&mut lane);
        true
    }

    /// Insert a `Stop` command at the head of the queue.
    ///
    /// When reached, the lane halts and leaves the remaining tasks queued
    /// until [`resume`](Self::resume). Stopping an already stopped (or
    /// stopping) scheduler is a no-op, as is stopping while a shutdown is
    /// pending.
    pub fn stop(&self) {
        {
            let lane = self.core.lane.lock();
            if lane.shutting_down {
                debug!("Shutdown pending; ignoring stop");
                return;
            }
            let stop_queued = lane.queue.iter().any(|c| matches!(c.action, Action::Stop));
            if lane.state == SchedulerState::Stopped || stop_queued {
                debug!(state = %lane.state, "Scheduler already stopping; ignoring stop");
                return;
            }
        }
        self.enqueue(Action::Stop, Placement::Head);
    }

    /// Resume a stopped scheduler. No-op in any other state.
    pub fn resume(&self) {
        let mut lane = self.core.lane.lock();
        if lane.state == SchedulerState::Stopped {
            lane.state = SchedulerState::Idle;
            debug!("Scheduler resumed");
            self.trigger_execution(&mut lane);
        }
    }

    /// Insert a `Clear` command at the head of the queue.
    ///
    /// When reached, every queued non-persistent task is discarded. A stopped
    /// scheduler is resumed so the clear gets to run.
    pub fn clear(&self) {
        self.enqueue(Action::Clear, Placement::Head);
        self.resume();
    }

    /// Append a `Shutdown` command at the tail of the queue.
    ///
    /// The returned future resolves once the command has been reached. Every
    /// task queued before this call runs first, even if the scheduler was
    /// stopped or never initialized; afterwards the scheduler is terminal and
    /// drops launches.
    pub fn shutdown(&self) -> impl Future<Output = ()> + Send + 'static {
        let (done, reached) = oneshot::channel();
        let accepted = self.enqueue(Action::Shutdown { done }, Placement::Tail);
        if accepted {
            let mut lane = self.core.lane.lock();
            if matches!(lane.state, SchedulerState::Uninitialized | SchedulerState::Stopped) {
                debug!(state = %lane.state, "Draining queue for shutdown");
                lane.state = SchedulerState::Idle;
                self.trigger_execution(&mut lane);
            }
        }
        async move {
            if accepted {
                // A dropped sender means a prior Shutdown discarded this one.
                let _ = reached.await;
            }
        }
    }

    /// Launch a task and resolve once it has run, or once it was removed by
    /// a `Clear`/`Shutdown`. Resumes a stopped scheduler first.
    ///
    /// # Errors
    /// - [`SchedulerError::NotLaunched`] if the task was refused
    /// - [`SchedulerError::Timeout`] if the task did not settle within the
    ///   configured deadlock guard
    pub fn test_launch<F, Fut>(&self, body: F) -> impl Future<Output = SchedulerResult<()>> + Send
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.resume();
        let (resolver, settled) = oneshot::channel();
        let accepted = self.enqueue(Action::Test { body: boxed(body), resolver }, Placement::Tail);
        let timeout = self.core.config.test_task_timeout();

        async move {
            if !accepted {
                return Err(SchedulerError::NotLaunched);
            }
            match tokio::time::timeout(timeout, settled).await {
                // Err(RecvError) means the task was cleared before running.
                Ok(_) => Ok(()),
                Err(_) => Err(SchedulerError::Timeout {
                    millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                }),
            }
        }
    }

    /// Wait for the in-flight drain job, if any.
    pub async fn test_block_on_queue(&self) {
        let job = self.core.lane.lock().current_job.clone();
        if let Some(job) = job {
            job.await;
        }
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.core.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn enqueue(&self, action: Action, placement: Placement) -> bool {
        let command = Command { id: self.next_id(), action };
        let mut lane = self.core.lane.lock();

        if lane.state == SchedulerState::Shutdown {
            warn!(
                id = %command.id,
                "Attempted to enqueue a new task but the scheduler is shutdown. Ignoring."
            );
            return false;
        }

        if placement == Placement::Tail
            && command.is_capped()
            && lane.state == SchedulerState::Uninitialized
            && lane.queue.len() >= self.core.config.max_pre_init_queue_size
        {
            warn!(
                id = %command.id,
                max = self.core.config.max_pre_init_queue_size,
                "Unable to enqueue task, pre init queue is full."
            );
            metrics::counter!("beacon.scheduler.tasks_dropped").increment(1);
            return false;
        }

        if matches!(command.action, Action::Shutdown { .. }) {
            lane.shutting_down = true;
        }

        match placement {
            Placement::Head => lane.queue.push_front(command),
            Placement::Tail => lane.queue.push_back(command),
        }

        self.trigger_execution(&mut lane);
        true
    }

    /// Spawn a drain job if the scheduler is idle and has work.
    fn trigger_execution(&self, lane: &mut Lane) {
        if lane.state != SchedulerState::Idle || lane.queue.is_empty() {
            return;
        }

        lane.state = SchedulerState::Processing;
        let core = Arc::clone(&self.core);
        let handle = self.core.runtime.spawn(drain(core));
        let job = async move {
            if let Err(err) = handle.await {
                error!(error = %err, "Scheduler drain job aborted");
            }
        }
        .boxed()
        .shared();
        lane.current_job = Some(job);
    }
}

fn boxed<F, Fut>(body: F) -> TaskBody
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || body().boxed())
}

/// Execute queued commands, oldest first, until the queue is empty or a
/// `Stop`/`Shutdown` command is reached.
async fn drain(core: Arc<SchedulerCore>) {
    loop {
        let command = {
            let mut lane = core.lane.lock();
            match lane.queue.pop_front() {
                Some(command) => command,
                None => {
                    if lane.state == SchedulerState::Processing {
                        lane.state = SchedulerState::Idle;
                    }
                    debug!(state = %lane.state, "Done executing tasks");
                    return;
                }
            }
        };

        let id = command.id;
        let kind = command.kind();
        debug!(%id, ?kind, "Executing dispatched command");

        match command.action {
            Action::Stop => {
                {
                    let mut lane = core.lane.lock();
                    if lane.shutting_down {
                        debug!(%id, "Shutdown pending; skipping stop");
                        drop(lane);
                        notify(&core, id, kind);
                        continue;
                    }
                    lane.state = SchedulerState::Stopped;
                }
                info!(%id, "Scheduler stopped");
                notify(&core, id, kind);
                return;
            }
            Action::Shutdown { done } => {
                {
                    let mut lane = core.lane.lock();
                    let discarded = lane.queue.len();
                    lane.queue.clear();
                    lane.state = SchedulerState::Shutdown;
                    lane.shutting_down = false;
                    info!(%id, discarded, "Scheduler shut down");
                }
                let _ = done.send(());
                notify(&core, id, kind);
                return;
            }
            Action::Clear => {
                let discarded = {
                    let mut lane = core.lane.lock();
                    let before = lane.queue.len();
                    lane.queue.retain(Command::survives_clear);
                    before - lane.queue.len()
                };
                info!(%id, discarded, "Scheduler queue cleared");
                notify(&core, id, kind);
            }
            Action::Task { body, tag, .. } => {
                execute_task(id, tag.as_deref(), body).await;
                notify(&core, id, kind);
            }
            Action::Test { body, resolver } => {
                execute_task(id, Some("test"), body).await;
                let _ = resolver.send(());
                notify(&core, id, kind);
            }
        }
    }
}

/// Run a task body, logging errors and panics so the lane survives them.
async fn execute_task(id: TaskId, tag: Option<&str>, body: TaskBody) {
    let tag = tag.unwrap_or("unidentified");
    let outcome = AssertUnwindSafe(async move { body().await }).catch_unwind().await;
    match outcome {
        Ok(Ok(())) => debug!(%id, tag, "Done executing task"),
        Ok(Err(err)) => {
            error!(%id, tag, error = ?err, "Error executing task");
            metrics::counter!("beacon.scheduler.task_errors").increment(1);
        }
        Err(_) => {
            error!(%id, tag, "Task panicked");
            metrics::counter!("beacon.scheduler.task_errors").increment(1);
        }
    }
}

fn notify(core: &SchedulerCore, id: TaskId, kind: CommandKind) {
    // No subscribers is the normal case outside tests.
    let _ = core.events.send(SchedulerEvent { id, kind });
}
