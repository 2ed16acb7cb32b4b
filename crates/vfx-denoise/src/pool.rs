//! Worker pool for provider switches.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::error;

use crate::{DenoiseError, DenoiseResult};

/// Shared FIFO pool. Loading a provider can take seconds, so it never
/// runs on the host's render thread.
pub struct WorkerPool {
    pool: ThreadPool,
    threads: usize,
}

impl WorkerPool {
    /// Build a pool of `threads` workers named `<name>-<index>`.
    pub fn new(threads: usize, name: &str) -> DenoiseResult<Self> {
        let threads = threads.max(1);
        let prefix = name.to_string();
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .panic_handler(|_| error!("worker job panicked"))
            .build()
            .map_err(|e| DenoiseError::Pool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    /// Queue `job` behind every job spawned before it.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn_fifo(job);
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("threads", &self.threads).finish()
    }
}
