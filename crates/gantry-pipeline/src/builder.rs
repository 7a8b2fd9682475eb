//! Image build stage: produce a content-addressed container image
//! tagged with the commit-derived reference.

use std::path::PathBuf;

use async_trait::async_trait;
use gantry_core::domain::ImageArtifact;
use gantry_core::error::BuildError;
use tracing::info;

use crate::config::PipelineConfig;
use crate::exec::{run_command, ExecError};

/// Build-engine boundary. The core does not embed the engine; it calls
/// out with the source tree and build recipe and receives success or a
/// verbatim diagnostic.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build(&self, artifact: &ImageArtifact) -> Result<(), BuildError>;
}

/// Builds via the container engine CLI (`docker build`).
pub struct DockerBuilder {
    engine: String,
    workspace: PathBuf,
    build_recipe: PathBuf,
    timeout_secs: u64,
}

impl DockerBuilder {
    pub fn new(workspace: PathBuf, build_recipe: PathBuf, timeout_secs: u64) -> Self {
        Self {
            engine: "docker".to_string(),
            workspace,
            build_recipe,
            timeout_secs,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.workspace.clone(),
            config.build_recipe.clone(),
            config.build_timeout_secs,
        )
    }

    /// Use a different engine binary (e.g. `podman`).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }
}

#[async_trait]
impl ImageBuilder for DockerBuilder {
    async fn build(&self, artifact: &ImageArtifact) -> Result<(), BuildError> {
        let reference = artifact.digest_reference();
        let argv = vec![
            self.engine.clone(),
            "build".to_string(),
            "-f".to_string(),
            self.build_recipe.display().to_string(),
            "-t".to_string(),
            reference.clone(),
            ".".to_string(),
        ];

        let output = run_command(&argv, &self.workspace, self.timeout_secs)
            .await
            .map_err(|e| match e {
                ExecError::Spawn { .. } => BuildError::Spawn(e.to_string()),
                other => BuildError::Engine(other.to_string()),
            })?;

        if !output.success() {
            return Err(BuildError::Engine(output.combined()));
        }

        info!(
            reference = %reference,
            duration_ms = output.duration_ms,
            "image built"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_engine_is_spawn_error() {
        let builder = DockerBuilder::new(PathBuf::from("."), PathBuf::from("Dockerfile"), 5)
            .with_engine("/nonexistent-container-engine");
        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");

        let err = builder.build(&artifact).await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_engine_failure_is_verbatim() {
        // `sh` stands in for the engine; it ignores the build args and
        // fails with a recognizable diagnostic.
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("engine");
        std::fs::write(&fake, "#!/bin/sh\necho 'no such file: Dockerfile' >&2\nexit 1\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let builder = DockerBuilder::new(PathBuf::from("."), PathBuf::from("Dockerfile"), 30)
            .with_engine(fake.display().to_string());
        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");

        let err = builder.build(&artifact).await.unwrap_err();
        match err {
            BuildError::Engine(detail) => assert!(detail.contains("no such file")),
            other => panic!("expected engine error, got {other}"),
        }
    }
}
