//! Gantry Pipeline
//!
//! Stage implementations and the orchestrator for the Gantry release
//! pipeline:
//! - Validates the working tree (restricted lint + full test suite)
//! - Builds and publishes the container image under digest and moving tags
//! - Rewrites the deployment manifest and commits it back to git

pub mod builder;
pub mod committer;
pub mod config;
pub mod exec;
pub mod mutator;
pub mod orchestrator;
pub mod publisher;
pub mod validator;

// Re-export key types
pub use builder::{DockerBuilder, ImageBuilder};
pub use committer::{GitCommitter, ReleaseCommitter};
pub use config::{PipelineConfig, RegistryCredentials};
pub use exec::{run_command, CommandOutput, ExecError};
pub use mutator::{FileManifestMutator, ManifestMutator};
pub use orchestrator::{Orchestrator, STAGES};
pub use publisher::{DockerPublisher, Publisher};
pub use validator::{ProcessValidator, Validator};
