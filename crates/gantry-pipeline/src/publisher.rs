//! Publish stage: authenticate to the registry and push the image
//! under both tags.
//!
//! The digest tag goes first, then the moving tag. Both pushes must
//! succeed: a downstream rollout reading the moving tag must never
//! observe a stale image, so a half-published state is an error.

use std::path::PathBuf;

use async_trait::async_trait;
use gantry_core::domain::ImageArtifact;
use gantry_core::error::PublishError;
use tracing::{info, warn};

use crate::config::{PipelineConfig, RegistryCredentials, REGISTRY_TOKEN_VAR, REGISTRY_USER_VAR};
use crate::exec::run_command;

/// Registry boundary.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, artifact: &ImageArtifact) -> Result<(), PublishError>;
}

/// Publishes via the container engine CLI (`docker login` / `push`).
pub struct DockerPublisher {
    engine: String,
    workspace: PathBuf,
    credentials: Option<RegistryCredentials>,
    timeout_secs: u64,
}

impl DockerPublisher {
    pub fn new(
        workspace: PathBuf,
        credentials: Option<RegistryCredentials>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            engine: "docker".to_string(),
            workspace,
            credentials,
            timeout_secs,
        }
    }

    /// Credentials come from the environment; missing credentials
    /// surface as an auth error at publish time, not construction time,
    /// so pull-request runs (which never publish) do not require them.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.workspace.clone(),
            RegistryCredentials::from_env(),
            config.publish_timeout_secs,
        )
    }

    /// Use a different engine binary (e.g. `podman`).
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    async fn engine_command(&self, argv: Vec<String>) -> Result<crate::exec::CommandOutput, String> {
        run_command(&argv, &self.workspace, self.timeout_secs)
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Publisher for DockerPublisher {
    async fn publish(&self, artifact: &ImageArtifact) -> Result<(), PublishError> {
        // Guard before anything reaches the network boundary. The
        // artifact constructor normalizes, so tripping this means a
        // hand-built artifact bypassed it.
        if !artifact.is_normalized() {
            return Err(PublishError::UnnormalizedIdentity(artifact.repository()));
        }

        let credentials = self.credentials.as_ref().ok_or_else(|| {
            PublishError::Auth(format!(
                "no registry credentials in environment ({REGISTRY_USER_VAR} / {REGISTRY_TOKEN_VAR})"
            ))
        })?;

        let login = self
            .engine_command(vec![
                self.engine.clone(),
                "login".to_string(),
                artifact.registry.clone(),
                "--username".to_string(),
                credentials.username.clone(),
                "--password".to_string(),
                credentials.token.clone(),
            ])
            .await
            .map_err(PublishError::Transfer)?;

        if !login.success() {
            return Err(PublishError::Auth(login.combined()));
        }
        info!(registry = %artifact.registry, "registry login ok");

        let digest_ref = artifact.digest_reference();
        let moving_ref = artifact.moving_reference();

        let push = self
            .engine_command(vec![
                self.engine.clone(),
                "push".to_string(),
                digest_ref.clone(),
            ])
            .await
            .map_err(PublishError::Transfer)?;
        if !push.success() {
            warn!(reference = %digest_ref, "digest push failed");
            return Err(PublishError::Transfer(push.combined()));
        }

        // Repointing the moving tag is a local engine operation, not a
        // transfer.
        let tag = self
            .engine_command(vec![
                self.engine.clone(),
                "tag".to_string(),
                digest_ref.clone(),
                moving_ref.clone(),
            ])
            .await
            .map_err(PublishError::Engine)?;
        if !tag.success() {
            return Err(PublishError::Engine(tag.combined()));
        }

        let push = self
            .engine_command(vec![
                self.engine.clone(),
                "push".to_string(),
                moving_ref.clone(),
            ])
            .await
            .map_err(PublishError::Transfer)?;
        if !push.success() {
            warn!(reference = %moving_ref, "moving tag push failed");
            return Err(PublishError::Transfer(push.combined()));
        }

        info!(
            digest_tag = %digest_ref,
            moving_tag = %moving_ref,
            "image published under both tags"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Option<RegistryCredentials> {
        Some(RegistryCredentials::new("robot", "token"))
    }

    /// Shell script standing in for the container engine.
    fn fake_engine(dir: &tempfile::TempDir, script_body: &str) -> String {
        let path = dir.path().join("engine");
        std::fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_unnormalized_identity_never_reaches_engine() {
        // Bypass the normalizing constructor on purpose.
        let artifact = ImageArtifact {
            registry: "ghcr.io".to_string(),
            registry_identity: "MyOrg".to_string(),
            image_name: "svc".to_string(),
            digest_tag: "abc123".to_string(),
            moving_tag: "latest".to_string(),
        };

        // A nonexistent engine would turn any engine call into a
        // transfer error; the guard must fire first.
        let publisher = DockerPublisher::new(PathBuf::from("."), creds(), 5)
            .with_engine("/nonexistent-container-engine");

        let err = publisher.publish(&artifact).await.unwrap_err();
        assert!(matches!(err, PublishError::UnnormalizedIdentity(_)));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_error() {
        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");
        let publisher = DockerPublisher::new(PathBuf::from("."), None, 5);

        let err = publisher.publish(&artifact).await.unwrap_err();
        match err {
            PublishError::Auth(detail) => assert!(detail.contains(REGISTRY_USER_VAR)),
            other => panic!("expected auth error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_login_rejection_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            &dir,
            "if [ \"$1\" = login ]; then echo 'unauthorized: bad credentials' >&2; exit 1; fi\nexit 0",
        );

        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");
        let publisher = DockerPublisher::new(PathBuf::from("."), creds(), 30).with_engine(engine);

        let err = publisher.publish(&artifact).await.unwrap_err();
        match err {
            PublishError::Auth(detail) => assert!(detail.contains("unauthorized")),
            other => panic!("expected auth error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_push_failure_is_transfer_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            &dir,
            "if [ \"$1\" = push ]; then echo 'connection reset by peer' >&2; exit 1; fi\nexit 0",
        );

        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");
        let publisher = DockerPublisher::new(PathBuf::from("."), creds(), 30).with_engine(engine);

        let err = publisher.publish(&artifact).await.unwrap_err();
        match err {
            PublishError::Transfer(detail) => assert!(detail.contains("connection reset")),
            other => panic!("expected transfer error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_tag_failure_is_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            &dir,
            "if [ \"$1\" = tag ]; then echo 'no such image' >&2; exit 1; fi\nexit 0",
        );

        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");
        let publisher = DockerPublisher::new(PathBuf::from("."), creds(), 30).with_engine(engine);

        let err = publisher.publish(&artifact).await.unwrap_err();
        match err {
            PublishError::Engine(detail) => assert!(detail.contains("no such image")),
            other => panic!("expected engine error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_both_tags_pushed_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("calls.log");
        let engine = fake_engine(
            &dir,
            &format!("echo \"$@\" >> {}\nexit 0", log.display()),
        );

        let artifact = ImageArtifact::new("ghcr.io", "org", "svc", "abc123", "latest");
        let publisher = DockerPublisher::new(PathBuf::from("."), creds(), 30).with_engine(engine);

        publisher.publish(&artifact).await.unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert!(calls.contains("push ghcr.io/org/svc:abc123"));
        assert!(calls.contains("push ghcr.io/org/svc:latest"));
        // Digest tag is pushed before the moving tag is repointed.
        let digest_pos = calls.find("push ghcr.io/org/svc:abc123").unwrap();
        let moving_pos = calls.find("push ghcr.io/org/svc:latest").unwrap();
        assert!(digest_pos < moving_pos);
    }
}
