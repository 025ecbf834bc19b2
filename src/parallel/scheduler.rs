//! Worker pool and timeout budgeting for batch runs

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::TimeoutConfig;
use crate::error::{Result, FastPngError};
use crate::parallel::ResultSink;
use crate::processing::{CompressionLevel, CompressionTask, TaskOutcome};

/// Aggregate wall-clock budget for a batch
///
/// `count * base + count * level * per_level`. Bounds the final wait on the
/// whole batch, never an individual task.
pub fn estimate_timeout(task_count: usize, level: CompressionLevel, config: &TimeoutConfig) -> Duration {
    let count = task_count as u64;
    let level = u64::from(level.get());

    let base = count.saturating_mul(config.base_per_task_secs);
    let scaled = count.saturating_mul(level).saturating_mul(config.per_level_secs);

    Duration::from_secs(base.saturating_add(scaled))
}

/// Growable pool running one blocking task per submission
///
/// Backed by a dedicated runtime whose blocking pool spawns threads lazily,
/// reuses idle ones and is sized to the expected task count, so every
/// submission gets a thread without queuing. There is no admission control.
pub struct WorkerPool {
    runtime: Option<Runtime>,
    handles: Vec<(PathBuf, JoinHandle<TaskOutcome>)>,
    accepting: bool,
}

impl WorkerPool {
    /// Create a pool able to run `capacity` tasks at once
    pub fn new(capacity: usize) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(capacity.max(1))
            .thread_name("fastpng-worker")
            .build()
            .map_err(|e| FastPngError::parallel(format!("Failed to build worker pool: {}", e)))?;

        info!("Initializing worker pool for up to {} concurrent tasks", capacity);

        Ok(Self {
            runtime: Some(runtime),
            handles: Vec::with_capacity(capacity),
            accepting: true,
        })
    }

    /// Submit a blocking job tagged with the image it works on
    pub fn submit<F>(&mut self, path: PathBuf, job: F) -> Result<()>
    where
        F: FnOnce() -> TaskOutcome + Send + 'static,
    {
        if !self.accepting {
            return Err(FastPngError::parallel("Worker pool no longer accepts tasks"));
        }

        let runtime = self.runtime.as_ref()
            .ok_or_else(|| FastPngError::parallel("Worker pool has been shut down"))?;

        debug!("Submitting task for {:?}", path);
        let handle = runtime.spawn_blocking(job);
        self.handles.push((path, handle));

        Ok(())
    }

    /// Submit a compression task reporting to `sink`
    pub fn submit_task(&mut self, task: CompressionTask, sink: Arc<dyn ResultSink>) -> Result<()> {
        let path = task.path().to_path_buf();
        self.submit(path, move || task.run(sink.as_ref()))
    }

    /// Number of tasks submitted so far
    pub fn submitted(&self) -> usize {
        self.handles.len()
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Stop accepting submissions; already submitted tasks keep running
    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Wait for every submitted task, at most `budget`
    ///
    /// Closes the pool first. On timeout the tasks are left running and a
    /// [`FastPngError::Timeout`] reports how many were still outstanding.
    pub async fn await_termination(&mut self, budget: Duration) -> Result<Vec<TaskOutcome>> {
        self.close();
        let submitted = self.handles.len();

        let joined = tokio::time::timeout(
            budget,
            futures::future::join_all(self.handles.iter_mut().map(|(_, handle)| handle)),
        )
        .await;

        match joined {
            Ok(results) => Ok(results
                .into_iter()
                .zip(self.handles.iter())
                .map(|(result, (path, _))| result.unwrap_or_else(|e| Err(join_failure(path, e))))
                .collect()),
            Err(_) => {
                let outstanding = self.handles.iter()
                    .filter(|(_, handle)| !handle.is_finished())
                    .count();
                warn!("{} of {} tasks still running after {}s", outstanding, submitted, budget.as_secs());

                Err(FastPngError::Timeout {
                    timeout_secs: budget.as_secs(),
                    outstanding,
                    submitted,
                })
            }
        }
    }

    /// Release the pool without waiting for running tasks
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        self.accepting = false;
        if let Some(runtime) = self.runtime.take() {
            // Running optimizer processes are not killed
            runtime.shutdown_background();
            debug!("Worker pool shut down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.release();
    }
}

fn join_failure(path: &Path, error: JoinError) -> FastPngError {
    FastPngError::TaskPanicked {
        file: path.to_path_buf(),
        message: error.to_string(),
    }
}
