//! Batch orchestration: preflight, discovery, fan-out and the bounded wait

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::{OptimizeConfig, TimeoutConfig};
use crate::error::{Result, FastPngError};
use crate::processing::{
    scan_directory, CompressionLevel, CompressionTask, ImageCandidate, OptimizerTool,
    PreflightValidator, SavingsReport, TaskOutcome,
};

pub mod progress;
pub mod scheduler;

pub use progress::*;
pub use scheduler::*;

/// Phases of a batch run; `Completed` and `Failed` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum BatchPhase {
    Validating,
    Scanning,
    Executing,
    Awaiting,
    Completed,
    Failed,
}

impl BatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Drives one optimization batch from preflight to completion
pub struct BatchOrchestrator {
    config: OptimizeConfig,
    timeout: TimeoutConfig,
    tool: Arc<OptimizerTool>,
    sink: Arc<dyn ResultSink>,
    phase: BatchPhase,
}

impl BatchOrchestrator {
    /// Create an orchestrator logging results through `tracing`
    pub fn new(config: OptimizeConfig) -> Self {
        Self::with_sink(config, Arc::new(LogSink))
    }

    /// Create an orchestrator reporting per-file results to `sink`
    pub fn with_sink(config: OptimizeConfig, sink: Arc<dyn ResultSink>) -> Self {
        let tool = Arc::new(OptimizerTool::new(config.tool.clone()));

        Self {
            config,
            timeout: TimeoutConfig::default(),
            tool,
            sink,
            phase: BatchPhase::Validating,
        }
    }

    /// Override the timeout formula constants
    pub fn timeout_config(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    /// Run the batch with no external interruption
    pub async fn run(&mut self) -> Result<BatchReport> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the batch; `interrupt` completing aborts the final wait
    pub async fn run_until<F>(&mut self, interrupt: F) -> Result<BatchReport>
    where
        F: Future<Output = ()>,
    {
        if self.phase != BatchPhase::Validating {
            return Err(FastPngError::parallel(format!(
                "Batch already ran (phase {:?})",
                self.phase
            )));
        }

        let result = self.execute(interrupt).await;
        self.phase = match result {
            Ok(_) => BatchPhase::Completed,
            Err(_) => BatchPhase::Failed,
        };
        debug!("Batch finished in phase {:?}", self.phase);

        result
    }

    /// Check the level and list every candidate without spawning anything
    pub fn discover(&self) -> Result<Vec<ImageCandidate>> {
        PreflightValidator::verify_level(self.config.level)?;
        self.scan_all()
    }

    async fn execute<F>(&mut self, interrupt: F) -> Result<BatchReport>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();

        self.enter(BatchPhase::Validating);
        let level = PreflightValidator::new(&self.tool)
            .validate(self.config.level)
            .await?;

        self.enter(BatchPhase::Scanning);
        let candidates = self.scan_all()?;

        self.enter(BatchPhase::Executing);
        let mut pool = self.submit_all(candidates, level)?;

        self.enter(BatchPhase::Awaiting);
        let submitted = pool.submitted();
        let budget = estimate_timeout(submitted, level, &self.timeout);
        info!("Waiting up to {}s for {} task(s)", budget.as_secs(), submitted);

        let waited = {
            let wait = pool.await_termination(budget);
            tokio::pin!(wait);
            tokio::pin!(interrupt);

            tokio::select! {
                biased;
                () = &mut interrupt => Err(FastPngError::interrupted("run was cancelled")),
                outcomes = &mut wait => outcomes,
            }
        };
        pool.shutdown();
        let outcomes = waited?;

        for outcome in &outcomes {
            if let Err(error @ FastPngError::TaskPanicked { .. }) = outcome {
                self.sink.failed(error);
            }
        }

        Ok(BatchReport::from_outcomes(outcomes, level, budget, start_time.elapsed()))
    }

    fn enter(&mut self, phase: BatchPhase) {
        debug!("Batch phase: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Scan every directory before anything is submitted
    fn scan_all(&self) -> Result<Vec<ImageCandidate>> {
        if self.config.directories.is_empty() {
            return Err(FastPngError::config("No directories configured"));
        }

        let mut candidates = Vec::new();
        for directory in &self.config.directories {
            candidates.extend(scan_directory(directory)?);
        }

        info!(
            "Found {} image(s) in {} director{}",
            candidates.len(),
            self.config.directories.len(),
            if self.config.directories.len() == 1 { "y" } else { "ies" }
        );
        Ok(candidates)
    }

    fn submit_all(&self, candidates: Vec<ImageCandidate>, level: CompressionLevel) -> Result<WorkerPool> {
        let mut pool = WorkerPool::new(candidates.len())?;
        self.sink.batch_started(candidates.len());

        for candidate in candidates {
            let task = CompressionTask::new(candidate, Arc::clone(&self.tool), level);
            pool.submit_task(task, Arc::clone(&self.sink))?;
        }

        Ok(pool)
    }
}

/// Summary of a completed batch
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchReport {
    pub level: CompressionLevel,
    pub submitted: usize,
    pub optimized: usize,
    pub failed: usize,
    pub total_input_size: u64,
    pub total_output_size: u64,
    pub timeout_budget: Duration,
    pub processing_time: Duration,
    pub results: Vec<SavingsReport>,
    pub failures: Vec<FailedFile>,
}

/// A task that was abandoned, as reported to the user
#[derive(Debug, Clone, serde::Serialize)]
pub struct FailedFile {
    pub path: Option<PathBuf>,
    pub error: String,
}

impl BatchReport {
    fn from_outcomes(
        outcomes: Vec<TaskOutcome>,
        level: CompressionLevel,
        timeout_budget: Duration,
        processing_time: Duration,
    ) -> Self {
        let submitted = outcomes.len();
        let mut results = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(report) => results.push(report),
                Err(error) => failures.push(FailedFile {
                    path: error.file_path().cloned(),
                    error: error.to_string(),
                }),
            }
        }

        Self {
            level,
            submitted,
            optimized: results.len(),
            failed: failures.len(),
            total_input_size: results.iter().map(|r| r.original_size).sum(),
            total_output_size: results.iter().map(|r| r.optimized_size).sum(),
            timeout_budget,
            processing_time,
            results,
            failures,
        }
    }

    /// Bytes saved across optimized files; negative if they grew overall
    pub fn saved_bytes(&self) -> i64 {
        self.total_input_size as i64 - self.total_output_size as i64
    }

    /// Size reduction percentage across optimized files
    pub fn size_reduction(&self) -> f64 {
        if self.total_input_size == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 / self.total_input_size as f64 * 100.0
    }
}
