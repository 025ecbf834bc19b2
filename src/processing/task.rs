//! The unit of concurrent work: one optimizer run against one image

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{Result, FastPngError};
use crate::parallel::ResultSink;
use crate::processing::{CompressionLevel, ImageCandidate, OptimizerTool};

/// Outcome of a single task; failures never leave the task as panics
pub type TaskOutcome = Result<SavingsReport>;

/// Sizes measured around one optimizer run
#[derive(Debug, Clone, serde::Serialize)]
pub struct SavingsReport {
    pub path: PathBuf,
    pub original_size: u64,
    pub optimized_size: u64,
    pub processing_time: Duration,
}

impl SavingsReport {
    /// Bytes saved; negative if the optimizer grew the file
    pub fn saved_bytes(&self) -> i64 {
        self.original_size as i64 - self.optimized_size as i64
    }

    pub fn saved_kb(&self) -> f64 {
        self.saved_bytes() as f64 / 1024.0
    }

    /// Saved size relative to the original, in percent (0 for empty files)
    pub fn saved_percentage(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.saved_kb() / (self.original_size as f64 / 1024.0) * 100.0
    }
}

impl fmt::Display for SavingsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Optimized {} by {:.2} kb ({:.2}%)",
            self.path.display(),
            self.saved_kb(),
            self.saved_percentage()
        )
    }
}

/// Optimizer run for one image candidate, owned by the worker executing it
#[derive(Debug)]
pub struct CompressionTask {
    candidate: ImageCandidate,
    tool: Arc<OptimizerTool>,
    level: CompressionLevel,
}

impl CompressionTask {
    pub fn new(candidate: ImageCandidate, tool: Arc<OptimizerTool>, level: CompressionLevel) -> Self {
        Self {
            candidate,
            tool,
            level,
        }
    }

    pub fn path(&self) -> &Path {
        self.candidate.path()
    }

    /// Run the optimizer to completion and report to `sink`
    ///
    /// Blocks the calling thread until the child exits.
    pub fn run(self, sink: &dyn ResultSink) -> TaskOutcome {
        let outcome = self.execute();

        match &outcome {
            Ok(report) => sink.optimized(report),
            Err(error) => sink.failed(error),
        }

        outcome
    }

    fn execute(&self) -> TaskOutcome {
        let start_time = Instant::now();
        let path = self.candidate.path();

        let original_size = file_size(path)?;

        let mut child = self.tool
            .optimize_command(self.level, path)
            .spawn()
            .map_err(|source| FastPngError::SpawnFailed {
                file: path.to_path_buf(),
                source,
            })?;

        let status = child.wait().map_err(|source| FastPngError::WaitFailed {
            file: path.to_path_buf(),
            source,
        })?;
        debug!("{} exited with {} for {:?}", self.tool.name(), status, path);

        let optimized_size = file_size(path)?;

        Ok(SavingsReport {
            path: path.to_path_buf(),
            original_size,
            optimized_size,
            processing_time: start_time.elapsed(),
        })
    }
}

fn file_size(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|source| FastPngError::SizeUnavailable {
            file: path.to_path_buf(),
            source,
        })
}
