//! Pipeline configuration.
//!
//! Loaded once from a JSON file (`gantry.json` by convention) and
//! immutable for the lifetime of a run. Registry credentials are
//! deliberately not part of the file so it stays committable; they are
//! read from the environment at publish time.

use std::path::{Path, PathBuf};

use gantry_core::domain::{CommitIdentity, ImageArtifact};
use gantry_core::error::{GantryError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Environment variable holding the registry username.
pub const REGISTRY_USER_VAR: &str = "GANTRY_REGISTRY_USER";

/// Environment variable holding the registry token/password.
pub const REGISTRY_TOKEN_VAR: &str = "GANTRY_REGISTRY_TOKEN";

/// Configuration of one release pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Workspace root containing the source tree, build recipe, and
    /// deployment manifest.
    pub workspace: PathBuf,

    /// Branch the release flow is scoped to. Events for any other
    /// branch produce a fully skipped run.
    pub trunk_branch: String,

    /// Registry host, e.g. `ghcr.io`.
    pub registry: String,

    /// Repository owner segment. Lower-cased on load.
    pub registry_identity: String,

    /// Image name segment. Lower-cased on load.
    pub image_name: String,

    /// Mutable tag repointed on every successful publish.
    pub moving_tag: String,

    /// Build recipe path, relative to the workspace.
    pub build_recipe: PathBuf,

    /// Deployment manifest path, relative to the workspace.
    pub manifest_path: PathBuf,

    /// Restricted static-check command. Only high-severity rules
    /// (undefined names, syntax errors) so stylistic findings never
    /// block a release.
    pub lint_command: Vec<String>,

    /// Full test suite command.
    pub test_command: Vec<String>,

    pub validate_timeout_secs: u64,

    pub build_timeout_secs: u64,

    pub publish_timeout_secs: u64,

    /// Remote the release commit is pushed to.
    pub remote: String,

    /// Service identity for release commits.
    pub commit_identity: CommitIdentity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            trunk_branch: "main".to_string(),
            registry: "ghcr.io".to_string(),
            registry_identity: "stevedores-org".to_string(),
            image_name: "weather-service".to_string(),
            moving_tag: "latest".to_string(),
            build_recipe: PathBuf::from("Dockerfile"),
            manifest_path: PathBuf::from("k8s/deployment.yaml"),
            lint_command: vec![
                "flake8".to_string(),
                ".".to_string(),
                "--count".to_string(),
                "--select=E9,F63,F7,F82".to_string(),
                "--show-source".to_string(),
            ],
            test_command: vec!["pytest".to_string(), "-q".to_string()],
            validate_timeout_secs: 600,
            build_timeout_secs: 1200,
            publish_timeout_secs: 600,
            remote: "origin".to_string(),
            commit_identity: CommitIdentity::new(
                "gantry-release[bot]",
                "release@stevedores.org",
            ),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file and normalize it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.normalized()
    }

    /// Lower-case the registry path segments and validate the result.
    /// Registries reject upper-case path segments, so normalization
    /// happens here, long before the publish boundary.
    pub fn normalized(mut self) -> Result<Self> {
        self.registry_identity = self.registry_identity.to_lowercase();
        self.image_name = self.image_name.to_lowercase();

        if self.registry_identity.is_empty() {
            return Err(GantryError::Config("registry_identity is empty".to_string()));
        }
        if self.image_name.is_empty() {
            return Err(GantryError::Config("image_name is empty".to_string()));
        }
        if self.trunk_branch.is_empty() {
            return Err(GantryError::Config("trunk_branch is empty".to_string()));
        }
        Ok(self)
    }

    /// Deterministic digest over the canonical JSON serialisation,
    /// recorded on each run so results can be linked back to the exact
    /// configuration they executed under.
    pub fn config_digest(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    /// Build the image artifact coordinates for a commit.
    pub fn artifact_for(&self, commit_sha: &str) -> ImageArtifact {
        ImageArtifact::new(
            self.registry.clone(),
            &self.registry_identity,
            &self.image_name,
            commit_sha,
            self.moving_tag.clone(),
        )
    }

    /// Absolute path of the deployment manifest.
    pub fn manifest_abspath(&self) -> PathBuf {
        self.workspace.join(&self.manifest_path)
    }
}

/// Registry credentials, read from the environment at publish time.
#[derive(Debug, Clone)]
pub struct RegistryCredentials {
    pub username: String,
    pub token: String,
}

impl RegistryCredentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Read `GANTRY_REGISTRY_USER` / `GANTRY_REGISTRY_TOKEN`.
    /// Returns `None` when either is unset.
    pub fn from_env() -> Option<Self> {
        let username = std::env::var(REGISTRY_USER_VAR).ok()?;
        let token = std::env::var(REGISTRY_TOKEN_VAR).ok()?;
        Some(Self { username, token })
    }
}
