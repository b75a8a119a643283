use crate::TaskSet;
use tokio_util::{sync::WaitForCancellationFuture, task::task_tracker::TaskTrackerWaitFuture};

/// Shutdown guard for a served [`Server`]. When dropped, cancels every task
/// associated with the running server: the accept loop, the per-connection
/// task pairs, and in-flight handler work.
///
/// The guard wraps a [`TaskTracker`] and a [`CancellationToken`] and
/// exposes methods from those APIs.
///
/// [`Server`]: crate::Server
/// [`TaskTracker`]: tokio_util::task::TaskTracker
/// [`CancellationToken`]: tokio_util::sync::CancellationToken
#[derive(Debug)]
pub struct ServerShutdown {
    pub(crate) task_set: TaskSet,
}

impl From<TaskSet> for ServerShutdown {
    fn from(task_set: TaskSet) -> Self {
        Self { task_set }
    }
}

impl ServerShutdown {
    /// Wait for the tasks spawned by the server to complete. Resolves only
    /// after [`Self::close`] has been called and all tasks have finished.
    pub fn wait(&self) -> TaskTrackerWaitFuture<'_> {
        self.task_set.wait()
    }

    /// Close the internal tracker, allowing [`Self::wait`] futures to
    /// resolve once running tasks complete. Does not cancel anything.
    pub fn close(&self) {
        self.task_set.close();
    }

    /// Whether the internal tracker has been closed.
    pub fn is_closed(&self) -> bool {
        self.task_set.is_closed()
    }

    /// Issue a cancellation signal to every task spawned by the server.
    pub fn cancel(&self) {
        self.task_set.cancel();
    }

    /// Whether the server has been told to shut down.
    pub fn is_cancelled(&self) -> bool {
        self.task_set.is_cancelled()
    }

    /// A future that resolves once [`Self::cancel`] has been called.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.task_set.cancelled()
    }

    /// Shut the server down and wait for all of its tasks to complete.
    pub async fn shutdown(self) {
        self.task_set.cancel();
        self.close();
        self.wait().await;
    }
}

impl Drop for ServerShutdown {
    fn drop(&mut self) {
        self.task_set.cancel();
    }
}
