//! Background execution for long-running services.
//!
//! A [`BackgroundTask`] runs its work on a dedicated thread and reports
//! progress through a [`ProgressSink`]. The work cooperates with cancellation
//! by calling [`TaskContext::checkpoint`] between units of work. Every task
//! reaches exactly one terminal state and the sink's
//! [`ProgressSink::on_finished`] callback runs exactly once, after the work
//! has been dropped and before waiters observe the terminal state.

mod errors;
mod staged;

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

pub use self::errors::TaskError;
pub use self::staged::StagedFile;

pub(crate) const TASK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::task");

/// Receives progress notifications from background tasks.
pub trait ProgressSink: Send + Sync {
    /// Called whenever the task reports progress.
    ///
    /// `completed` never decreases between calls for the same task, and once
    /// `total` is known it stays fixed.
    fn on_progress(&self, task: &str, completed: u64, total: Option<u64>);

    /// Called once when the task reaches a terminal state. `error` is `None`
    /// on success.
    fn on_finished(&self, task: &str, error: Option<&TaskError>);
}

/// Progress sink that writes structured tracing events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, task: &str, completed: u64, total: Option<u64>) {
        debug!(target: TASK_TARGET, task, completed, total, "task progress");
    }

    fn on_finished(&self, task: &str, error: Option<&TaskError>) {
        match error {
            None => info!(target: TASK_TARGET, task, "task succeeded"),
            Some(error) if error.is_cancelled() => {
                info!(target: TASK_TARGET, task, "task cancelled");
            }
            Some(error) => warn!(target: TASK_TARGET, task, error = %error, "task failed"),
        }
    }
}

/// Lifecycle of a background task, without its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created; the worker thread has not started the work yet.
    Pending,
    /// The work is executing.
    Running,
    /// The work completed.
    Succeeded,
    /// The work failed, panicked, or was cancelled.
    Failed(TaskError),
}

impl TaskStatus {
    /// Returns true for [`TaskStatus::Succeeded`] and [`TaskStatus::Failed`].
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

enum TaskState<T> {
    Pending,
    Running,
    Succeeded(T),
    Failed(TaskError),
    Collected,
}

impl<T> TaskState<T> {
    fn status(&self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Running => TaskStatus::Running,
            Self::Succeeded(_) | Self::Collected => TaskStatus::Succeeded,
            Self::Failed(error) => TaskStatus::Failed(error.clone()),
        }
    }

    const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::Collected)
    }
}

struct Shared<T> {
    state: Mutex<TaskState<T>>,
    finished: Condvar,
    cancel: AtomicBool,
}

impl<T> Shared<T> {
    const fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Pending),
            finished: Condvar::new(),
            cancel: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TaskState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_running(&self) {
        let mut state = self.lock();
        if matches!(*state, TaskState::Pending) {
            *state = TaskState::Running;
        }
    }

    fn finish(&self, outcome: Result<T, TaskError>) {
        let mut state = self.lock();
        *state = match outcome {
            Ok(value) => TaskState::Succeeded(value),
            Err(error) => TaskState::Failed(error),
        };
        drop(state);
        self.finished.notify_all();
    }
}

/// Progress and cancellation view handed to the running work.
pub struct TaskContext<'a> {
    name: &'a str,
    cancel: &'a AtomicBool,
    sink: &'a dyn ProgressSink,
    completed: Cell<u64>,
    total: Cell<Option<u64>>,
}

impl fmt::Debug for TaskContext<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TaskContext")
            .field("name", &self.name)
            .field("completed", &self.completed.get())
            .field("total", &self.total.get())
            .finish_non_exhaustive()
    }
}

impl<'a> TaskContext<'a> {
    const fn new(name: &'a str, cancel: &'a AtomicBool, sink: &'a dyn ProgressSink) -> Self {
        Self {
            name,
            cancel,
            sink,
            completed: Cell::new(0),
            total: Cell::new(None),
        }
    }

    /// Task name used in progress notifications.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name
    }

    /// Reports progress to the sink.
    ///
    /// The first known `total` is kept for the rest of the task. `completed`
    /// is clamped so the reported value never decreases and never exceeds the
    /// total.
    pub fn report(&self, completed: u64, total: Option<u64>) {
        if self.total.get().is_none() {
            self.total.set(total);
        }
        let fixed_total = self.total.get();
        let bounded = fixed_total.map_or(completed, |limit| completed.min(limit));
        let monotonic = bounded.max(self.completed.get());
        self.completed.set(monotonic);
        self.sink.on_progress(self.name, monotonic, fixed_total);
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Stops the work when cancellation has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Cancelled`] after [`TaskHandle::cancel`] was
    /// called.
    pub fn checkpoint(&self) -> Result<(), TaskError> {
        if self.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Starts background work.
#[derive(Debug)]
pub struct BackgroundTask;

impl BackgroundTask {
    /// Runs `work` on a new thread and returns a handle to it.
    ///
    /// A thread spawn failure yields a handle whose task has already failed
    /// with [`TaskError::Spawn`].
    #[must_use]
    pub fn spawn<T, F>(name: impl Into<String>, work: F, sink: Arc<dyn ProgressSink>) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&TaskContext<'_>) -> Result<T, TaskError> + Send + 'static,
    {
        let task_name = name.into();
        let shared = Arc::new(Shared::new());
        let thread_shared = Arc::clone(&shared);
        let thread_name = task_name.clone();
        let thread_sink = Arc::clone(&sink);

        let spawned = thread::Builder::new()
            .name(format!("edad-task-{task_name}"))
            .spawn(move || run_task(&thread_name, work, &thread_shared, thread_sink.as_ref()));

        let thread = match spawned {
            Ok(joiner) => Some(joiner),
            Err(source) => {
                let error = TaskError::Spawn {
                    message: source.to_string(),
                };
                sink.on_finished(&task_name, Some(&error));
                shared.finish(Err(error));
                None
            }
        };

        TaskHandle {
            name: task_name,
            shared,
            thread,
        }
    }
}

fn run_task<T, F>(name: &str, work: F, shared: &Shared<T>, sink: &dyn ProgressSink)
where
    F: FnOnce(&TaskContext<'_>) -> Result<T, TaskError>,
{
    shared.set_running();
    let outcome = {
        let context = TaskContext::new(name, &shared.cancel, sink);
        // `work` is consumed by the call, so it is dropped by the time the
        // outcome is known, including on unwind.
        panic::catch_unwind(AssertUnwindSafe(|| work(&context)))
            .unwrap_or_else(|payload| Err(TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }))
    };
    sink.on_finished(name, outcome.as_ref().err());
    shared.finish(outcome);
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("non-string panic payload"))
}

/// Handle used to observe, cancel, and collect a background task.
pub struct TaskHandle<T> {
    name: String,
    shared: Arc<Shared<T>>,
    thread: Option<JoinHandle<()>>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TaskHandle")
            .field("name", &self.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<T> TaskHandle<T> {
    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TaskStatus {
        self.shared.lock().status()
    }

    /// Requests cancellation; the work stops at its next checkpoint.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Release);
    }

    /// Blocks until the task is terminal and returns its outcome.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskError`] the task failed with.
    pub fn wait(mut self) -> Result<T, TaskError> {
        let outcome = {
            let mut state = self.shared.lock();
            while !state.is_terminal() {
                state = self
                    .shared
                    .finished
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            match std::mem::replace(&mut *state, TaskState::Collected) {
                TaskState::Succeeded(value) => Ok(value),
                TaskState::Failed(error) => {
                    *state = TaskState::Failed(error.clone());
                    Err(error)
                }
                TaskState::Pending | TaskState::Running | TaskState::Collected => {
                    Err(TaskError::failed("task result already collected"))
                }
            }
        };
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!(target: TASK_TARGET, task = %self.name, "task thread panicked after finishing");
        }
        outcome
    }
}
