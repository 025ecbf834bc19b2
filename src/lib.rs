//! FastPng - Parallel Batch PNG Optimizer
//!
//! Discovers PNG images in a set of directories and runs an external
//! lossless optimizer (`optipng` by default) on every one of them in
//! parallel, reporting how much each file shrank.
//!
//! # Features
//!
//! - **Preflight**: the optimizer and compression level are checked before
//!   any file is touched
//! - **Parallel Processing**: one worker per image, no admission control
//! - **Adaptive Timeout**: the batch wait scales with image count and level
//! - **Failure Isolation**: a file that fails never aborts the batch
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fastpng::{BatchOrchestrator, OptimizeConfig};
//!
//! # async fn run() -> fastpng::Result<()> {
//! let config = OptimizeConfig::new(["assets/icons", "docs/img"]).level(3);
//!
//! let mut orchestrator = BatchOrchestrator::new(config);
//! let report = orchestrator.run().await?;
//!
//! println!("Optimized {} of {} images", report.optimized, report.submitted);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod processing;
pub mod parallel;

// Re-export commonly used types
pub use config::{Config, LoggingConfig, OptimizeConfig, TimeoutConfig};
pub use error::{Result, FastPngError};
pub use parallel::{BatchOrchestrator, BatchPhase, BatchReport, LogSink, ProgressTracker, ResultSink};
pub use processing::{CompressionLevel, ImageCandidate, OptimizerTool, SavingsReport};

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize FastPng logging from `RUST_LOG`
///
/// Should be called once at program start; later calls are no-ops.
pub fn init() -> Result<()> {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish()
    ).is_ok() {
        info!("FastPng v{} initialized", VERSION);
    }

    Ok(())
}

/// Initialize with custom logging configuration
pub fn init_with_config(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| FastPngError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json_format {
        tracing::subscriber::set_global_default(builder.json().finish()).is_ok()
    } else {
        tracing::subscriber::set_global_default(builder.finish()).is_ok()
    };

    if installed {
        info!("FastPng v{} initialized with custom config", VERSION);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_init() {
        // Should not fail on multiple calls
        let _ = init();
        let _ = init();
    }

    #[test]
    fn test_init_rejects_bad_filter() {
        let config = LoggingConfig {
            level: "fastpng=notalevel".to_string(),
            json_format: false,
        };
        assert!(init_with_config(&config).is_err());
    }
}
