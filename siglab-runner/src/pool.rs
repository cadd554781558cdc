//! Bounded worker pool with submit/collect semantics.
//!
//! Whole pipeline runs execute to completion on a worker with no
//! interleaving; the pool size is an explicit constructor argument, never
//! process-wide state. A job's failure surfaces only when its handle is
//! collected — sibling jobs are not cancelled.

use std::sync::mpsc;

use thiserror::Error;

/// Errors surfaced when collecting a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("worker terminated without delivering a result")]
    WorkerLost,
}

/// Handle to a submitted job. Collecting blocks until the job's result is
/// available; dropping the handle abandons the result without cancelling
/// the job.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the job finishes and take its result. A job that
    /// panicked yields `TaskError::WorkerLost` here, not at submit time.
    pub fn collect(self) -> Result<T, TaskError> {
        self.rx.recv().map_err(|_| TaskError::WorkerLost)
    }
}

/// Bounded worker pool executing whole jobs to completion.
#[derive(Debug)]
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Build a pool with exactly `threads` workers.
    pub fn new(threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            // A panicking job must not take the process down: the panic is
            // absorbed here and the job's result channel closes, which the
            // handle reports as `WorkerLost` at collect time.
            .panic_handler(|_| {})
            .build()?;
        Ok(Self { pool })
    }

    /// Submit a job for execution, returning a handle to its eventual
    /// result. Jobs run in submission order only as workers free up;
    /// callers that need deterministic output order must collect handles
    /// in submission order.
    pub fn submit<T, F>(&self, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            // A send failure means the handle was dropped; the result is
            // simply discarded.
            let _ = tx.send(job());
        });
        TaskHandle { rx }
    }
}
