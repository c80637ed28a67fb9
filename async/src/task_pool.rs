//! Task pool for managing cancellable worker tasks with graceful shutdown.
//!
//! This module provides [`TaskPool`], which encapsulates the common pattern
//! of:
//! - Spawning tasks that can be cancelled via a token
//! - Tracking active tasks
//! - Graceful shutdown with guaranteed task completion
//!
//! A fetcher typically owns one pool for all of its in-flight work, and
//! hands each fetch a [child token](TaskPool::child_token) so a single load
//! can be cancelled without disturbing its siblings.
//!
//! # Pattern
//!
//! The task pool implements a three-phase shutdown:
//! 1. **Signal**: Cancel all tasks via the cancellation token
//! 2. **Close**: Prevent new tasks from spawning
//! 3. **Wait**: Block until all tasks complete

use crate::join_handle::JoinHandle;

/// Manages a group of cancellable tasks with graceful shutdown.
///
/// `TaskPool` combines a [`tokio_util::sync::CancellationToken`] and
/// [`tokio_util::task::TaskTracker`] to provide a consistent shutdown
/// pattern.
///
/// # Shutdown Guarantees
///
/// When [`shutdown()`](TaskPool::shutdown) is called:
/// - All tasks are signaled to cancel via the cancellation token
/// - No new tasks can be spawned
/// - The method blocks until all spawned tasks complete
/// - Tasks can finish their current operation gracefully
pub struct TaskPool {
    cancel_token: tokio_util::sync::CancellationToken,
    task_tracker: tokio_util::task::TaskTracker,
}

impl TaskPool {
    /// Creates a new task pool.
    pub fn new() -> Self {
        Self {
            cancel_token: tokio_util::sync::CancellationToken::new(),
            task_tracker: tokio_util::task::TaskTracker::new(),
        }
    }

    /// Returns a reference to the pool's cancellation token.
    ///
    /// Use this to check cancellation status or pass to tasks that need to
    /// listen for shutdown signals.
    pub fn cancel_token(&self) -> &tokio_util::sync::CancellationToken {
        &self.cancel_token
    }

    /// Creates a child cancellation token for hierarchical cancellation.
    ///
    /// Child tokens can be cancelled independently without affecting the
    /// parent pool. However, when the parent pool is cancelled, all child
    /// tokens are also cancelled.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use easel_async::TaskPool;
    /// let pool = TaskPool::new();
    /// let child = pool.child_token();
    ///
    /// // Cancel just this task without affecting the parent pool
    /// child.cancel();
    /// ```
    pub fn child_token(&self) -> tokio_util::sync::CancellationToken {
        self.cancel_token.child_token()
    }

    /// Spawns a task tracked by this pool.
    ///
    /// The task is tracked until it completes. The returned [`JoinHandle`]
    /// can be used to await the task's result.
    ///
    /// # Panics
    ///
    /// Panics if called after [`shutdown()`](TaskPool::shutdown) has been
    /// called, as the tracker will be closed.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.task_tracker.spawn(task)
    }

    /// Initiates graceful shutdown and waits for all tasks to complete.
    ///
    /// Tasks are expected to check the cancellation token and exit
    /// gracefully. This method blocks until all tasks have finished.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }

    /// Checks if shutdown has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}
