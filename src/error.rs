//! Error types and handling for FastPng

use std::path::PathBuf;
use thiserror::Error;

use crate::config::{LEVEL_LOWER_BOUND, LEVEL_UPPER_BOUND};

/// Result type alias for FastPng operations
pub type Result<T> = std::result::Result<T, FastPngError>;

/// Main error type for FastPng operations
#[derive(Debug, Error)]
pub enum FastPngError {
    /// I/O related errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Compression level outside the accepted range
    #[error("Invalid level {level}. Must be >= {} and <= {}", LEVEL_LOWER_BOUND, LEVEL_UPPER_BOUND)]
    InvalidLevel { level: i32 },

    /// The external optimizer could not be probed successfully
    #[error("Could not find {tool} on this system: {message}")]
    ToolUnavailable { tool: String, message: String },

    /// Configured directory is missing
    #[error("Directory {} does not exist", .path.display())]
    DirectoryNotFound { path: PathBuf },

    /// Configured path exists but is not a directory
    #[error("The path {} is not a directory", .path.display())]
    NotADirectory { path: PathBuf },

    /// Directory listing failed part way through
    #[error("Directory listing error: {0}")]
    WalkError(#[from] walkdir::Error),

    /// The optimizer process could not be started for a file
    #[error("Failed to start a process for {}: {source}", .file.display())]
    SpawnFailed {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the optimizer process failed
    #[error("Failed to wait for the process optimizing {} to finish: {source}", .file.display())]
    WaitFailed {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File size could not be read before or after optimization
    #[error("Cannot read size of {}: {source}", .file.display())]
    SizeUnavailable {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker panicked while running a task
    #[error("Worker panicked while optimizing {}: {message}", .file.display())]
    TaskPanicked { file: PathBuf, message: String },

    /// Aggregate wait exceeded the computed budget
    #[error("Batch did not finish within {timeout_secs}s ({outstanding} of {submitted} tasks still running)")]
    Timeout {
        timeout_secs: u64,
        outstanding: usize,
        submitted: usize,
    },

    /// Aggregate wait was interrupted
    #[error("Waiting for process termination was interrupted: {message}")]
    Interrupted { message: String },

    /// Worker pool errors
    #[error("Parallel processing error: {message}")]
    ParallelError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    SerdeError(String),
}

impl FastPngError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new tool availability error
    pub fn tool_unavailable<T: Into<String>, S: Into<String>>(tool: T, message: S) -> Self {
        Self::ToolUnavailable {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new interruption error
    pub fn interrupted<S: Into<String>>(message: S) -> Self {
        Self::Interrupted {
            message: message.into(),
        }
    }

    /// Create a new parallel processing error
    pub fn parallel<S: Into<String>>(message: S) -> Self {
        Self::ParallelError {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (the batch keeps going)
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Scoped to a single file
            Self::SpawnFailed { .. }
            | Self::WaitFailed { .. }
            | Self::SizeUnavailable { .. }
            | Self::TaskPanicked { .. } => true,

            Self::IoError(_)
            | Self::ConfigError { .. }
            | Self::InvalidLevel { .. }
            | Self::ToolUnavailable { .. }
            | Self::DirectoryNotFound { .. }
            | Self::NotADirectory { .. }
            | Self::WalkError(_)
            | Self::Timeout { .. }
            | Self::Interrupted { .. }
            | Self::ParallelError { .. }
            | Self::SerdeError(_) => false,
        }
    }

    /// Check if this error was raised while validating the run configuration
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigError { .. }
                | Self::InvalidLevel { .. }
                | Self::ToolUnavailable { .. }
                | Self::DirectoryNotFound { .. }
                | Self::NotADirectory { .. }
                | Self::WalkError(_)
                | Self::SerdeError(_)
        )
    }

    /// Get the associated file path if available
    pub fn file_path(&self) -> Option<&PathBuf> {
        match self {
            Self::SpawnFailed { file, .. }
            | Self::WaitFailed { file, .. }
            | Self::SizeUnavailable { file, .. }
            | Self::TaskPanicked { file, .. } => Some(file),

            Self::DirectoryNotFound { path } | Self::NotADirectory { path } => Some(path),

            _ => None,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::ToolUnavailable { tool, .. } => {
                format!("{} is not installed or not on PATH. Install it or pass --tool.", tool)
            }
            Self::InvalidLevel { level } => format!(
                "Compression level {} is out of range. Use a value from {} to {}.",
                level, LEVEL_LOWER_BOUND, LEVEL_UPPER_BOUND
            ),
            Self::Timeout { timeout_secs, outstanding, .. } => format!(
                "Optimization took longer than {}s; {} optimizer process(es) may still be running.",
                timeout_secs, outstanding
            ),
            other => other.to_string(),
        }
    }
}

// Convert serde errors to our error type
impl From<toml::de::Error> for FastPngError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerdeError(format!("TOML parsing error: {}", err))
    }
}

impl From<serde_yaml::Error> for FastPngError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::SerdeError(format!("YAML parsing error: {}", err))
    }
}
