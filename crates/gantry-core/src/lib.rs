//! Gantry Core
//!
//! Domain types for the Gantry release pipeline: trigger events,
//! pipeline runs and stage results, image artifacts, the typed
//! deployment-manifest model, and the error taxonomy shared by the
//! stage implementations in `gantry-pipeline`.

pub mod domain;
pub mod error;
pub mod git;
pub mod manifest;
pub mod telemetry;

pub use domain::{
    CommitIdentity, CommitRecord, EventKind, ImageArtifact, PipelineRun, RunOutcome, StageResult,
    StageStatus, TriggerEvent,
};

pub use error::{
    BuildError, CommitError, GantryError, MutationError, PublishError, Result, ValidationError,
};

pub use git::{capture_head_sha, is_git_repo};

pub use manifest::{rewrite_image_reference, ManifestDocument, ManifestLine};

pub use telemetry::init_tracing;

/// Gantry version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
