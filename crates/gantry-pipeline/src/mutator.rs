//! Manifest mutation stage: repoint the deployment descriptor at the
//! newly published digest reference.

use std::path::PathBuf;

use async_trait::async_trait;
use gantry_core::error::MutationError;
use gantry_core::manifest::rewrite_image_reference;
use tracing::info;

use crate::config::PipelineConfig;

/// Manifest boundary. Returns the number of rewritten image lines.
#[async_trait]
pub trait ManifestMutator: Send + Sync {
    async fn mutate(&self, new_reference: &str) -> Result<usize, MutationError>;
}

/// Rewrites the manifest file in the workspace. The file is read fresh
/// on every run, so staleness against a concurrent writer is caught at
/// commit time rather than masked here.
pub struct FileManifestMutator {
    manifest_path: PathBuf,
}

impl FileManifestMutator {
    pub fn new(manifest_path: PathBuf) -> Self {
        Self { manifest_path }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.manifest_abspath())
    }
}

#[async_trait]
impl ManifestMutator for FileManifestMutator {
    async fn mutate(&self, new_reference: &str) -> Result<usize, MutationError> {
        let count = rewrite_image_reference(&self.manifest_path, new_reference)?;
        info!(
            manifest = %self.manifest_path.display(),
            rewritten = count,
            reference = %new_reference,
            "manifest image reference updated"
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mutate_rewrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.yaml");
        std::fs::write(&path, "spec:\n  image: svc:old\n").unwrap();

        let mutator = FileManifestMutator::new(path.clone());
        let count = mutator.mutate("svc:abc123").await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "spec:\n  image: svc:abc123\n"
        );
    }

    #[tokio::test]
    async fn test_mutate_without_image_line_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.yaml");
        std::fs::write(&path, "kind: Service\n").unwrap();

        let mutator = FileManifestMutator::new(path);
        let err = mutator.mutate("svc:abc123").await.unwrap_err();
        assert!(matches!(err, MutationError::NoImageLine { .. }));
    }
}
