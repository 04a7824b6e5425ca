//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default time to wait for tracked tasks before giving up on them.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the server-wide cancellation token and the long-lived tasks that
/// watch it.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    /// A coordinator with no tracked tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Register a task to be awaited by [`drain`](Self::drain).
    pub fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token and wait up to `timeout` for every tracked task.
    /// Tasks still running afterwards are aborted.
    pub async fn drain(&self, timeout: Duration) {
        self.shutdown();
        let handles = std::mem::take(&mut *self.tasks.lock());
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for tasks to complete"
        );

        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!("shutdown timed out after {timeout:?}, aborting remaining tasks");
            for abort in aborts {
                abort.abort();
            }
        }
    }
}
