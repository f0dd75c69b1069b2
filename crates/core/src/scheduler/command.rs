//! Commands held by the scheduler queue

use std::fmt;

use futures::future::BoxFuture;
use tokio::sync::oneshot;

/// Future produced by a task body.
pub type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;

/// A deferred unit of work. Invoked once, on the scheduler lane.
pub type TaskBody = Box<dyn FnOnce() -> TaskFuture + Send + 'static>;

/// Identifier assigned to every queued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}", self.0)
    }
}

/// Kind of a queued command, as reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Task,
    PersistentTask,
    TestTask,
    Stop,
    Clear,
    Shutdown,
}

/// Emitted after the drain loop handles a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerEvent {
    pub id: TaskId,
    pub kind: CommandKind,
}

pub(crate) enum Action {
    Task { body: TaskBody, persistent: bool, tag: Option<String> },
    Test { body: TaskBody, resolver: oneshot::Sender<()> },
    Stop,
    Clear,
    Shutdown { done: oneshot::Sender<()> },
}

pub(crate) struct Command {
    pub(crate) id: TaskId,
    pub(crate) action: Action,
}

impl Command {
    pub(crate) fn kind(&self) -> CommandKind {
        match &self.action {
            Action::Task { persistent: false, .. } => CommandKind::Task,
            Action::Task { persistent: true, .. } => CommandKind::PersistentTask,
            Action::Test { .. } => CommandKind::TestTask,
            Action::Stop => CommandKind::Stop,
            Action::Clear => CommandKind::Clear,
            Action::Shutdown { .. } => CommandKind::Shutdown,
        }
    }

    /// Survives a Clear command.
    pub(crate) fn survives_clear(&self) -> bool {
        matches!(self.kind(), CommandKind::PersistentTask | CommandKind::Shutdown)
    }

    /// Counts against the pre-init queue cap.
    pub(crate) fn is_capped(&self) -> bool {
        matches!(
            self.kind(),
            CommandKind::Task | CommandKind::PersistentTask | CommandKind::TestTask
        )
    }
}
