//! Per-file optimization: discovery, preflight checks and the optimizer task

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{DEFAULT_TOOL, LEVEL_FLAG};

pub mod scan;
pub mod task;
pub mod validation;

pub use scan::*;
pub use task::*;
pub use validation::*;

/// Compression level that passed the bounds check
///
/// Only [`PreflightValidator::verify_level`] hands these out, so holding one
/// means the level is within the optimizer's accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub(crate) fn new_unchecked(level: u8) -> Self {
        Self(level)
    }

    /// Numeric value passed to the optimizer
    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External lossless optimizer invoked once per image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerTool {
    program: PathBuf,
}

impl Default for OptimizerTool {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

impl OptimizerTool {
    /// Wrap a program name (looked up on PATH) or an explicit path
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Display name used in messages
    pub fn name(&self) -> String {
        self.program.display().to_string()
    }

    /// Bare invocation used to check that the optimizer is installed
    pub fn probe_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    /// `<tool> -o <level> <image>`
    pub fn optimize_command(&self, level: CompressionLevel, image: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(LEVEL_FLAG)
            .arg(level.to_string())
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool() {
        let tool = OptimizerTool::default();
        assert_eq!(tool.program(), Path::new("optipng"));
        assert_eq!(tool.name(), "optipng");
    }

    #[test]
    fn test_optimize_command_arguments() {
        let tool = OptimizerTool::new("/usr/local/bin/optipng");
        let command = tool.optimize_command(CompressionLevel::new_unchecked(3), Path::new("img/a.png"));

        assert_eq!(command.get_program(), "/usr/local/bin/optipng");
        let args: Vec<&str> = command.get_args().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(args, ["-o", "3", "img/a.png"]);
    }

    #[test]
    fn test_probe_command_has_no_arguments() {
        let tool = OptimizerTool::new("optipng");
        let command = tool.probe_command();
        assert_eq!(command.as_std().get_args().count(), 0);
    }
}
