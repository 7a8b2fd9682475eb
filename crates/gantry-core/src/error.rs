//! Error taxonomy for the Gantry release pipeline.
//!
//! Each pipeline stage has its own error enum so callers can match on
//! the failure class (credential rot vs. transfer fault, malformed
//! manifest vs. rejected push). [`GantryError`] aggregates them for
//! code that crosses stage boundaries.

/// Errors from the validation stage (restricted lint + test suite).
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("lint check failed:\n{detail}")]
    Lint { detail: String },

    #[error("test suite failed:\n{detail}")]
    Tests { detail: String },

    /// The lint or test tool itself could not run (spawn failure, timeout).
    #[error("validation tool error: {0}")]
    Tool(String),
}

/// Errors from the image build stage.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// The build engine reported a failure; diagnostic text is verbatim.
    #[error("image build failed:\n{0}")]
    Engine(String),

    #[error("failed to invoke build engine: {0}")]
    Spawn(String),
}

/// Errors from the publish stage.
///
/// `Auth` implies credential rotation is needed; `Transfer` may be
/// transient and is safe to retry by re-running the trigger event.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("registry authentication failed: {0}")]
    Auth(String),

    #[error("image push failed: {0}")]
    Transfer(String),

    /// The local moving-tag repoint failed. No network transfer was
    /// involved, so this is not retryable as a transfer fault.
    #[error("local engine error: {0}")]
    Engine(String),

    /// A mixed-case registry identity reached the publish boundary.
    /// Registries reject upper-case path segments, so this is a
    /// programming error caught before any network call.
    #[error("registry identity is not lower-case: {0}")]
    UnnormalizedIdentity(String),
}

/// Errors from the manifest mutation stage.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// No `image:` line matched. A manifest with no image reference is
    /// malformed and must not be silently accepted.
    #[error("no image line found in manifest: {path}")]
    NoImageLine { path: String },

    #[error("manifest io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the release commit stage.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The remote advanced concurrently. Re-triggering the pipeline is
    /// the retry mechanism; the committer never force-pushes.
    #[error("push rejected by remote: {0}")]
    PushRejected(String),

    #[error("git error: {0}")]
    Git(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregate error for operations that cross stage boundaries.
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("mutation error: {0}")]
    Mutation(#[from] MutationError),

    #[error("commit error: {0}")]
    Commit(#[from] CommitError),

    #[error("git error: {0}")]
    Git(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Gantry domain operations.
pub type Result<T> = std::result::Result<T, GantryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_error_variants_are_distinct() {
        let auth = PublishError::Auth("401 unauthorized".to_string());
        assert!(auth.to_string().contains("authentication"));
        assert!(auth.to_string().contains("401 unauthorized"));

        let transfer = PublishError::Transfer("connection reset".to_string());
        assert!(transfer.to_string().contains("push failed"));

        let engine = PublishError::Engine("no such image".to_string());
        assert!(engine.to_string().contains("local engine"));
    }

    #[test]
    fn test_validation_error_carries_verbatim_detail() {
        let err = ValidationError::Tests {
            detail: "FAILED tests/test_weather.py::test_unknown_city".to_string(),
        };
        assert!(err.to_string().contains("test_unknown_city"));
    }

    #[test]
    fn test_mutation_error_names_manifest_path() {
        let err = MutationError::NoImageLine {
            path: "k8s/deployment.yaml".to_string(),
        };
        assert!(err.to_string().contains("k8s/deployment.yaml"));
    }

    #[test]
    fn test_gantry_error_wraps_stage_errors() {
        let err: GantryError = CommitError::PushRejected("non-fast-forward".to_string()).into();
        assert!(err.to_string().contains("push rejected"));
    }
}
