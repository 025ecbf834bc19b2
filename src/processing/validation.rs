//! Preflight checks gating a batch run

use tracing::{debug, info};

use crate::config::{LEVEL_LOWER_BOUND, LEVEL_UPPER_BOUND};
use crate::error::{Result, FastPngError};
use crate::processing::{CompressionLevel, OptimizerTool};

/// Validator run once before any directory is scanned
pub struct PreflightValidator<'a> {
    tool: &'a OptimizerTool,
}

impl<'a> PreflightValidator<'a> {
    pub fn new(tool: &'a OptimizerTool) -> Self {
        Self { tool }
    }

    /// Run both checks, tool first
    pub async fn validate(&self, level: i32) -> Result<CompressionLevel> {
        self.verify_tool_installation().await?;
        let level = Self::verify_level(level)?;

        info!("Preflight passed: {} available, level {}", self.tool.name(), level);
        Ok(level)
    }

    /// Invoke the optimizer without arguments; installed means exit code 0
    pub async fn verify_tool_installation(&self) -> Result<()> {
        debug!("Probing optimizer: {}", self.tool.name());

        let status = self.tool.probe_command().status().await
            .map_err(|e| FastPngError::tool_unavailable(
                self.tool.name(),
                format!("failed to verify installation: {}", e),
            ))?;

        if !status.success() {
            return Err(FastPngError::tool_unavailable(
                self.tool.name(),
                format!("probe exited with {}", status),
            ));
        }

        Ok(())
    }

    /// Check that the level lies within the accepted closed range
    pub fn verify_level(level: i32) -> Result<CompressionLevel> {
        if !(LEVEL_LOWER_BOUND..=LEVEL_UPPER_BOUND).contains(&level) {
            return Err(FastPngError::InvalidLevel { level });
        }

        let level = u8::try_from(level).map_err(|_| FastPngError::InvalidLevel { level })?;
        Ok(CompressionLevel::new_unchecked(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert_eq!(PreflightValidator::verify_level(0).unwrap().get(), 0);
        assert_eq!(PreflightValidator::verify_level(2).unwrap().get(), 2);
        assert_eq!(PreflightValidator::verify_level(7).unwrap().get(), 7);

        for level in [-1, 8, i32::MIN, i32::MAX] {
            let err = PreflightValidator::verify_level(level).unwrap_err();
            assert!(matches!(err, FastPngError::InvalidLevel { level: l } if l == level));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_probe_success() {
        let tool = OptimizerTool::new("true");
        let validator = PreflightValidator::new(&tool);
        assert!(validator.verify_tool_installation().await.is_ok());
        assert_eq!(validator.validate(3).await.unwrap().get(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_probe_nonzero_exit() {
        let tool = OptimizerTool::new("false");
        let err = PreflightValidator::new(&tool).validate(2).await.unwrap_err();
        assert!(matches!(err, FastPngError::ToolUnavailable { .. }));
        assert!(err.is_configuration_error());
    }

    #[tokio::test]
    async fn test_tool_probe_missing_binary() {
        let tool = OptimizerTool::new("/nonexistent/bin/optipng-missing");
        let err = PreflightValidator::new(&tool).validate(2).await.unwrap_err();
        assert!(matches!(err, FastPngError::ToolUnavailable { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_checked_before_level() {
        let tool = OptimizerTool::new("false");
        let err = PreflightValidator::new(&tool).validate(99).await.unwrap_err();
        assert!(matches!(err, FastPngError::ToolUnavailable { .. }));

        let tool = OptimizerTool::new("true");
        let err = PreflightValidator::new(&tool).validate(99).await.unwrap_err();
        assert!(matches!(err, FastPngError::InvalidLevel { level: 99 }));
    }
}
