//! Configuration management for FastPng

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Result, FastPngError};

/// File suffix of images picked up by the scanner (case-sensitive)
pub const PNG_SUFFIX: &str = ".png";

/// Optimizer executable used when none is configured
pub const DEFAULT_TOOL: &str = "optipng";

/// Optimizer flag preceding the compression level
pub const LEVEL_FLAG: &str = "-o";

/// Lowest compression level accepted by the optimizer
pub const LEVEL_LOWER_BOUND: i32 = 0;

/// Highest compression level accepted by the optimizer
pub const LEVEL_UPPER_BOUND: i32 = 7;

/// Compression level used when none is configured
pub const DEFAULT_LEVEL: i32 = 2;

/// Seconds granted per image regardless of level
pub const DEFAULT_BASE_PER_TASK_SECS: u64 = 10;

/// Extra seconds granted per image and per level step
pub const DEFAULT_PER_LEVEL_SECS: u64 = 5;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// What to optimize and how hard
    pub optimize: OptimizeConfig,

    /// Aggregate timeout tuning
    pub timeout: TimeoutConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Run configuration shared read-only by every task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeConfig {
    /// Directories scanned (non-recursively) for images
    pub directories: Vec<PathBuf>,

    /// Compression level passed to the optimizer
    pub level: i32,

    /// Optimizer program name or path
    pub tool: PathBuf,
}

impl Default for OptimizeConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            level: DEFAULT_LEVEL,
            tool: PathBuf::from(DEFAULT_TOOL),
        }
    }
}

impl OptimizeConfig {
    /// Create a run configuration for the given directories with default level and tool
    pub fn new<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            directories: directories.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the compression level
    pub fn level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    /// Set the optimizer program
    pub fn tool<P: Into<PathBuf>>(mut self, tool: P) -> Self {
        self.tool = tool.into();
        self
    }
}

/// Constants of the aggregate timeout formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Seconds per image
    pub base_per_task_secs: u64,

    /// Seconds per image per level step
    pub per_level_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            base_per_task_secs: DEFAULT_BASE_PER_TASK_SECS,
            per_level_secs: DEFAULT_PER_LEVEL_SECS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// On-disk configuration formats, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("yaml" | "yml") => Ok(Self::Yaml),
            _ => Err(FastPngError::config(format!(
                "Unsupported config file format for {}. Use .toml or .yaml",
                path.display()
            ))),
        }
    }
}

impl Config {
    /// Load configuration from a `.toml` or `.yaml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = FileFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            FastPngError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;

        match format {
            FileFormat::Toml => toml::from_str(&content).map_err(Into::into),
            FileFormat::Yaml => serde_yaml::from_str(&content).map_err(Into::into),
        }
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match FileFormat::from_path(path)? {
            FileFormat::Toml => toml::to_string_pretty(self)
                .map_err(|e| FastPngError::config(format!("Cannot encode TOML: {}", e)))?,
            FileFormat::Yaml => serde_yaml::to_string(self)
                .map_err(|e| FastPngError::config(format!("Cannot encode YAML: {}", e)))?,
        };

        std::fs::write(path, content).map_err(|e| {
            FastPngError::config(format!("Cannot write {}: {}", path.display(), e))
        })
    }

    /// Validate configuration
    ///
    /// Only checks what can be checked without touching the filesystem or
    /// spawning the optimizer; the batch preflight does the rest.
    pub fn validate(&self) -> Result<()> {
        if self.optimize.directories.is_empty() {
            return Err(FastPngError::config(
                "At least one directory must be configured"
            ));
        }

        if self.optimize.tool.as_os_str().is_empty() {
            return Err(FastPngError::config("Optimizer tool must not be empty"));
        }

        if !(LEVEL_LOWER_BOUND..=LEVEL_UPPER_BOUND).contains(&self.optimize.level) {
            return Err(FastPngError::InvalidLevel { level: self.optimize.level });
        }

        if self.logging.level.trim().is_empty() {
            return Err(FastPngError::config("Log level must not be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Config {
        Config {
            optimize: OptimizeConfig::new(["assets/img", "docs/img"]).level(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.optimize.level, 2);
        assert_eq!(config.optimize.tool, PathBuf::from("optipng"));
        assert_eq!(config.timeout.base_per_task_secs, 10);
        assert_eq!(config.timeout.per_level_secs, 5);
        // Directories are required
        assert!(config.validate().is_err());
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = sample();

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.optimize.directories, config.optimize.directories);
        assert_eq!(parsed.optimize.level, 5);

        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed.optimize.directories.len(), 2);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[optimize]\ndirectories = [\"img\"]\n").unwrap();
        assert_eq!(parsed.optimize.level, DEFAULT_LEVEL);
        assert_eq!(parsed.optimize.tool, PathBuf::from(DEFAULT_TOOL));
        assert_eq!(parsed.timeout, TimeoutConfig::default());
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn test_config_file_io() {
        let dir = TempDir::new().unwrap();
        let config = sample();

        let toml_path = dir.path().join("fastpng.toml");
        config.to_file(&toml_path).unwrap();
        let loaded = Config::from_file(&toml_path).unwrap();
        assert!(loaded.validate().is_ok());

        let yaml_path = dir.path().join("fastpng.yaml");
        config.to_file(&yaml_path).unwrap();
        let loaded = Config::from_file(&yaml_path).unwrap();
        assert_eq!(loaded.optimize.level, 5);

        assert!(config.to_file(dir.path().join("fastpng.ini")).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/fastpng.TOML")).unwrap(), FileFormat::Toml);
        assert_eq!(FileFormat::from_path(Path::new("fastpng.yml")).unwrap(), FileFormat::Yaml);
        assert!(FileFormat::from_path(Path::new("fastpng")).is_err());
    }

    #[test]
    fn test_level_bounds_validation() {
        for level in [0, 7] {
            let mut config = sample();
            config.optimize.level = level;
            assert!(config.validate().is_ok());
        }
        for level in [-1, 8] {
            let mut config = sample();
            config.optimize.level = level;
            assert!(matches!(config.validate(), Err(FastPngError::InvalidLevel { .. })));
        }
    }
}
