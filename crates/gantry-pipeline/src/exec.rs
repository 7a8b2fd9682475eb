//! External command execution with captured output and timeouts.
//!
//! All stage implementations that shell out (lint/test runners, the
//! container engine, git) go through [`run_command`] so diagnostics and
//! time budgets are handled uniformly.

use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (-1 if terminated by signal).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,
}

impl CommandOutput {
    /// Whether the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout and stderr concatenated, for verbatim diagnostics.
    pub fn combined(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Failures of the execution machinery itself. A non-zero exit is not
/// an `ExecError`; it is reported through [`CommandOutput`].
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("failed waiting for '{command}': {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Run `argv` in `cwd` with an optional timeout (0 = unbounded).
pub async fn run_command(
    argv: &[String],
    cwd: &Path,
    timeout_secs: u64,
) -> Result<CommandOutput, ExecError> {
    let start = Instant::now();

    let exe = argv.first().ok_or(ExecError::EmptyCommand)?;
    let display = argv.join(" ");

    let child = Command::new(exe)
        .args(&argv[1..])
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // A timeout drops the wait future; the child must not outlive it.
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: display.clone(),
            source,
        })?;

    let output = if timeout_secs > 0 {
        tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ExecError::Timeout {
            command: display.clone(),
            timeout_secs,
        })?
        .map_err(|source| ExecError::Wait {
            command: display.clone(),
            source,
        })?
    } else {
        child
            .wait_with_output()
            .await
            .map_err(|source| ExecError::Wait {
                command: display.clone(),
                source,
            })?
    };

    Ok(CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_run_command_captures_stdout() {
        let out = run_command(&argv(&["echo", "hello"]), &PathBuf::from("."), 60)
            .await
            .unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_run_command_nonzero_exit_is_not_an_error() {
        let out = run_command(&argv(&["false"]), &PathBuf::from("."), 60)
            .await
            .unwrap();
        assert!(!out.success());
        assert_ne!(out.exit_code, 0);
    }

    #[tokio::test]
    async fn test_run_command_spawn_failure() {
        let err = run_command(
            &argv(&["/nonexistent-binary-that-does-not-exist"]),
            &PathBuf::from("."),
            5,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let err = run_command(&argv(&["sleep", "5"]), &PathBuf::from("."), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("sleep 2; touch {}", marker.display());

        let err = run_command(&argv(&["sh", "-c", &script]), &PathBuf::from("."), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));

        // If the child survived the timeout it would create the marker.
        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        assert!(!marker.exists(), "timed-out child kept running");
    }

    #[tokio::test]
    async fn test_empty_command_rejected() {
        let err = run_command(&[], &PathBuf::from("."), 5).await.unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }

    #[test]
    fn test_combined_output() {
        let out = CommandOutput {
            exit_code: 1,
            stdout: "1 failed".to_string(),
            stderr: "assertion error".to_string(),
            duration_ms: 5,
        };
        let combined = out.combined();
        assert!(combined.contains("1 failed"));
        assert!(combined.contains("assertion error"));
    }
}
