//! Release commit stage: persist the mutated manifest as a new
//! revision, or detect that nothing changed.
//!
//! Re-running the pipeline for an event that produced the same image
//! reference must not create empty revisions, so an unchanged manifest
//! is a successful no-op. A concurrently advanced remote is detected
//! at push time and fails the run (last-writer-detects-conflict); the
//! committer never force-pushes.

use std::path::PathBuf;

use async_trait::async_trait;
use gantry_core::domain::{CommitIdentity, CommitRecord};
use gantry_core::error::CommitError;
use tracing::info;

use crate::config::PipelineConfig;
use crate::exec::{run_command, CommandOutput};

/// Version-control boundary for the release commit.
#[async_trait]
pub trait ReleaseCommitter: Send + Sync {
    async fn commit(&self, message: &str) -> Result<CommitRecord, CommitError>;
}

/// Commits the manifest through the git CLI under a fixed service
/// identity.
pub struct GitCommitter {
    workspace: PathBuf,
    manifest_path: PathBuf,
    remote: String,
    branch: String,
    identity: CommitIdentity,
    timeout_secs: u64,
}

impl GitCommitter {
    pub fn new(
        workspace: PathBuf,
        manifest_path: PathBuf,
        remote: String,
        branch: String,
        identity: CommitIdentity,
    ) -> Self {
        Self {
            workspace,
            manifest_path,
            remote,
            branch,
            identity,
            timeout_secs: 300,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.workspace.clone(),
            config.manifest_path.clone(),
            config.remote.clone(),
            config.trunk_branch.clone(),
            config.commit_identity.clone(),
        )
    }

    async fn git(&self, args: &[String]) -> Result<CommandOutput, CommitError> {
        let mut argv = vec!["git".to_string()];
        argv.extend_from_slice(args);
        run_command(&argv, &self.workspace, self.timeout_secs)
            .await
            .map_err(|e| CommitError::Git(e.to_string()))
    }
}

/// Whether git push stderr indicates a rejected (non-fast-forward)
/// update rather than some other failure.
fn is_push_rejection(stderr: &str) -> bool {
    stderr.contains("[rejected]")
        || stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("stale info")
}

#[async_trait]
impl ReleaseCommitter for GitCommitter {
    async fn commit(&self, message: &str) -> Result<CommitRecord, CommitError> {
        let manifest = self.manifest_path.display().to_string();

        // An untracked manifest has no committed counterpart and always
        // counts as changed.
        let tracked = self
            .git(&[
                "ls-files".to_string(),
                "--error-unmatch".to_string(),
                "--".to_string(),
                manifest.clone(),
            ])
            .await?;

        if tracked.success() {
            // Diff against HEAD, not the index: a staged-but-uncommitted
            // edit still differs from the committed content.
            let diff = self
                .git(&[
                    "diff".to_string(),
                    "--quiet".to_string(),
                    "HEAD".to_string(),
                    "--".to_string(),
                    manifest.clone(),
                ])
                .await?;

            match diff.exit_code {
                0 => {
                    info!(manifest = %manifest, "manifest matches committed content; skipping commit");
                    return Ok(CommitRecord {
                        author: self.identity.clone(),
                        message: message.to_string(),
                        changed: false,
                    });
                }
                1 => {}
                _ => return Err(CommitError::Git(diff.combined())),
            }
        }

        let add = self.git(&["add".to_string(), manifest.clone()]).await?;
        if !add.success() {
            return Err(CommitError::Git(add.combined()));
        }

        let commit = self
            .git(&[
                "-c".to_string(),
                format!("user.name={}", self.identity.name),
                "-c".to_string(),
                format!("user.email={}", self.identity.email),
                "commit".to_string(),
                "-m".to_string(),
                message.to_string(),
            ])
            .await?;
        if !commit.success() {
            return Err(CommitError::Git(commit.combined()));
        }

        let push = self
            .git(&[
                "push".to_string(),
                self.remote.clone(),
                format!("HEAD:{}", self.branch),
            ])
            .await?;
        if !push.success() {
            let detail = push.combined();
            if is_push_rejection(&detail) {
                return Err(CommitError::PushRejected(detail));
            }
            return Err(CommitError::Git(detail));
        }

        info!(
            branch = %self.branch,
            author = %self.identity.name,
            "release commit pushed"
        );

        Ok(CommitRecord {
            author: self.identity.clone(),
            message: message.to_string(),
            changed: true,
        })
    }
}
