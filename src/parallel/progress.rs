//! Result sinks and progress tracking for batch runs

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::error::FastPngError;
use crate::processing::SavingsReport;

/// Receiver of per-file messages
///
/// Called concurrently from worker threads, in no particular order.
pub trait ResultSink: Send + Sync {
    /// A task finished and the optimizer exited
    fn optimized(&self, report: &SavingsReport);

    /// A task was abandoned
    fn failed(&self, error: &FastPngError);

    /// All tasks of a batch are about to be submitted
    fn batch_started(&self, _total: usize) {}
}

/// Sink writing every message through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ResultSink for LogSink {
    fn optimized(&self, report: &SavingsReport) {
        info!("{}", report);
    }

    fn failed(&self, error: &FastPngError) {
        error!("{}", error);
    }
}

/// Thread-safe progress tracker that also logs like [`LogSink`]
pub struct ProgressTracker {
    sender: broadcast::Sender<ProgressUpdate>,
    start_time: Mutex<Option<Instant>>,

    total: AtomicU64,
    optimized: AtomicUsize,
    failed: AtomicUsize,
    bytes_saved: AtomicI64,
}

/// Snapshot of a tracked batch
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProgressState {
    pub total_files: u64,
    pub optimized_files: usize,
    pub failed_files: usize,
    pub bytes_saved: i64,
    pub elapsed_time: Duration,
    pub completion_percentage: f64,
}

/// Progress update event
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Started {
        total_files: u64,
    },
    FileOptimized {
        path: PathBuf,
        saved_bytes: i64,
    },
    FileFailed {
        path: Option<PathBuf>,
        error: String,
    },
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);

        Self {
            sender,
            start_time: Mutex::new(None),
            total: AtomicU64::new(0),
            optimized: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            bytes_saved: AtomicI64::new(0),
        }
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.sender.subscribe()
    }

    pub fn optimized_count(&self) -> usize {
        self.optimized.load(Ordering::Relaxed)
    }

    pub fn failed_count(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn bytes_saved(&self) -> i64 {
        self.bytes_saved.load(Ordering::Relaxed)
    }

    /// Current snapshot
    pub fn get_state(&self) -> ProgressState {
        let total_files = self.total.load(Ordering::Relaxed);
        let optimized_files = self.optimized_count();
        let failed_files = self.failed_count();
        let done = (optimized_files + failed_files) as f64;

        let elapsed_time = self
            .start_time
            .lock()
            .ok()
            .and_then(|start| start.map(|s| s.elapsed()))
            .unwrap_or_default();

        ProgressState {
            total_files,
            optimized_files,
            failed_files,
            bytes_saved: self.bytes_saved(),
            elapsed_time,
            completion_percentage: if total_files == 0 {
                100.0
            } else {
                done / total_files as f64 * 100.0
            },
        }
    }
}

impl ResultSink for ProgressTracker {
    fn optimized(&self, report: &SavingsReport) {
        info!("{}", report);

        self.optimized.fetch_add(1, Ordering::Relaxed);
        self.bytes_saved.fetch_add(report.saved_bytes(), Ordering::Relaxed);

        // No subscribers is fine
        let _ = self.sender.send(ProgressUpdate::FileOptimized {
            path: report.path.clone(),
            saved_bytes: report.saved_bytes(),
        });
    }

    fn failed(&self, error: &FastPngError) {
        error!("{}", error);

        self.failed.fetch_add(1, Ordering::Relaxed);

        let _ = self.sender.send(ProgressUpdate::FileFailed {
            path: error.file_path().cloned(),
            error: error.to_string(),
        });
    }

    fn batch_started(&self, total: usize) {
        if let Ok(mut start) = self.start_time.lock() {
            *start = Some(Instant::now());
        }

        self.total.store(total as u64, Ordering::Relaxed);
        self.optimized.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
        self.bytes_saved.store(0, Ordering::Relaxed);

        let _ = self.sender.send(ProgressUpdate::Started { total_files: total as u64 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn report(original: u64, optimized: u64) -> SavingsReport {
        SavingsReport {
            path: PathBuf::from("img/a.png"),
            original_size: original,
            optimized_size: optimized,
            processing_time: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_tracker_counts() {
        let tracker = ProgressTracker::new();
        tracker.batch_started(3);

        tracker.optimized(&report(2048, 1024));
        tracker.optimized(&report(1024, 1024));
        tracker.failed(&FastPngError::SpawnFailed {
            file: PathBuf::from("img/b.png"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        });

        let state = tracker.get_state();
        assert_eq!(state.total_files, 3);
        assert_eq!(state.optimized_files, 2);
        assert_eq!(state.failed_files, 1);
        assert_eq!(state.bytes_saved, 1024);
        assert_eq!(state.completion_percentage, 100.0);
    }

    #[test]
    fn test_tracker_broadcasts_updates() {
        let tracker = ProgressTracker::new();
        let mut rx = tracker.subscribe();

        tracker.batch_started(1);
        tracker.optimized(&report(1024, 768));

        assert!(matches!(rx.try_recv().unwrap(), ProgressUpdate::Started { total_files: 1 }));
        match rx.try_recv().unwrap() {
            ProgressUpdate::FileOptimized { path, saved_bytes } => {
                assert_eq!(path, PathBuf::from("img/a.png"));
                assert_eq!(saved_bytes, 256);
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[test]
    fn test_batch_started_resets_counters() {
        let tracker = ProgressTracker::new();
        tracker.batch_started(1);
        tracker.optimized(&report(10, 5));

        tracker.batch_started(4);
        let state = tracker.get_state();
        assert_eq!(state.optimized_files, 0);
        assert_eq!(state.bytes_saved, 0);
        assert_eq!(state.completion_percentage, 0.0);
    }
}
