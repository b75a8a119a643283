use std::future::Future;

use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::{
    sync::{CancellationToken, WaitForCancellationFuture},
    task::{task_tracker::TaskTrackerWaitFuture, TaskTracker},
};

/// A [`TaskTracker`] paired with a [`CancellationToken`], used to manage the
/// tasks owned by a server: the listener loop, the per-connection task
/// pairs, and spawned handler work.
///
/// When a [`Handle`] is provided, tasks are spawned on that handle.
/// Otherwise they are spawned on the current runtime.
#[derive(Debug, Clone, Default)]
pub(crate) struct TaskSet {
    tasks: TaskTracker,
    token: CancellationToken,
    handle: Option<Handle>,
}

impl From<Handle> for TaskSet {
    fn from(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
            ..Default::default()
        }
    }
}

impl TaskSet {
    /// Get a handle to the runtime that the task set is running on.
    ///
    /// ## Panics
    ///
    /// This will panic if called outside the context of a Tokio runtime
    /// when no handle was provided.
    fn handle(&self) -> Handle {
        self.handle.clone().unwrap_or_else(Handle::current)
    }

    /// A copy of this set, sharing the tracker and token, that spawns on
    /// the given handle.
    pub(crate) fn on_handle(&self, handle: Handle) -> Self {
        Self {
            tasks: self.tasks.clone(),
            token: self.token.clone(),
            handle: Some(handle),
        }
    }

    /// Cancel the token, cancelling all tasks in the set.
    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether [`Self::cancel`] has been called.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Close the tracker, allowing [`Self::wait`] futures to resolve once
    /// running tasks finish.
    pub(crate) fn close(&self) {
        self.tasks.close();
    }

    /// Whether the tracker has been closed.
    pub(crate) fn is_closed(&self) -> bool {
        self.tasks.is_closed()
    }

    /// A future that resolves when the tracker is closed and empty.
    pub(crate) fn wait(&self) -> TaskTrackerWaitFuture<'_> {
        self.tasks.wait()
    }

    /// Cancel all tasks and wait for them to finish.
    pub(crate) async fn shutdown(&self) {
        self.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    /// A future that resolves when the token is fired.
    pub(crate) fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Get a child [`TaskSet`], cancelled when this set is cancelled or
    /// independently.
    pub(crate) fn child(&self) -> Self {
        Self {
            tasks: TaskTracker::new(),
            token: self.token.child_token(),
            handle: self.handle.clone(),
        }
    }

    /// Wrap a future so it resolves to `None` when the set is cancelled.
    fn prep_fut<F>(&self, task: F) -> impl Future<Output = Option<F::Output>> + Send + 'static
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let token = self.token.clone();
        async move {
            tokio::select! {
                _ = token.cancelled() => None,
                result = task => Some(result),
            }
        }
    }

    /// Spawn a cancellable future, adding it to the task set.
    ///
    /// ## Panics
    ///
    /// This will panic if called outside the context of a Tokio runtime
    /// when no handle was provided.
    pub(crate) fn spawn<F>(&self, task: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn_on(self.prep_fut(task), &self.handle())
    }
}
