//! Task spawning abstraction for the single-threaded event loop.

use std::future::Future;

/// Provider for spawning local tasks in single-threaded context.
///
/// Everything the client shares with its background task lives in
/// `Rc<RefCell<..>>`, so tasks must stay on the current thread.
pub trait TaskProvider: Clone {
    /// Spawn a named task that runs on the current thread.
    ///
    /// Must be called from within a `tokio::task::LocalSet` (or a local
    /// runtime).
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static;
}

/// Tokio-based task provider using `spawn_local`.
#[derive(Clone, Debug, Default)]
pub struct TokioTaskProvider;

impl TaskProvider for TokioTaskProvider {
    fn spawn_task<F>(&self, name: &str, future: F) -> tokio::task::JoinHandle<()>
    where
        F: Future<Output = ()> + 'static,
    {
        let task_name = name.to_string();
        tokio::task::spawn_local(async move {
            tracing::trace!("Task {} starting", task_name);
            future.await;
            tracing::trace!("Task {} completed", task_name);
        })
    }
}
