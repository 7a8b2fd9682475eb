//! Validation stage: restricted lint pass followed by the full test
//! suite. Gate for everything downstream.

use std::path::PathBuf;

use async_trait::async_trait;
use gantry_core::error::ValidationError;
use tracing::info;

use crate::config::PipelineConfig;
use crate::exec::run_command;

/// Validation boundary. Returns a short summary on success; failures
/// carry the tool's diagnostic output verbatim.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(&self) -> Result<String, ValidationError>;
}

/// Runs the configured lint and test commands against the workspace.
///
/// The lint command is restricted to a high-severity rule subset
/// (undefined names, syntax errors) so stylistic findings never block
/// a release. No partial credit: a single failing test fails the stage.
pub struct ProcessValidator {
    workspace: PathBuf,
    lint_command: Vec<String>,
    test_command: Vec<String>,
    timeout_secs: u64,
}

impl ProcessValidator {
    pub fn new(
        workspace: PathBuf,
        lint_command: Vec<String>,
        test_command: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            workspace,
            lint_command,
            test_command,
            timeout_secs,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.workspace.clone(),
            config.lint_command.clone(),
            config.test_command.clone(),
            config.validate_timeout_secs,
        )
    }
}

#[async_trait]
impl Validator for ProcessValidator {
    async fn validate(&self) -> Result<String, ValidationError> {
        let lint = run_command(&self.lint_command, &self.workspace, self.timeout_secs)
            .await
            .map_err(|e| ValidationError::Tool(e.to_string()))?;

        if !lint.success() {
            return Err(ValidationError::Lint {
                detail: lint.combined(),
            });
        }
        info!(duration_ms = lint.duration_ms, "lint pass clean");

        let tests = run_command(&self.test_command, &self.workspace, self.timeout_secs)
            .await
            .map_err(|e| ValidationError::Tool(e.to_string()))?;

        if !tests.success() {
            return Err(ValidationError::Tests {
                detail: tests.combined(),
            });
        }
        info!(duration_ms = tests.duration_ms, "test suite passed");

        Ok(format!(
            "lint clean ({} ms); tests passed ({} ms)",
            lint.duration_ms, tests.duration_ms
        ))
    }
}
