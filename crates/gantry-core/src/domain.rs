//! Core domain types for pipeline runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of trigger event that starts a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A direct push to a branch; eligible for the full release flow.
    Push,

    /// A pull request; only validation runs.
    PullRequest,
}

/// The input that starts a pipeline run. Created by the external event
/// source; read-only through the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: EventKind,

    /// Immutable identifier of the source revision.
    pub commit_sha: String,

    /// Identity initiating the event.
    pub actor: String,

    /// Branch the event targets.
    pub branch: String,
}

impl TriggerEvent {
    pub fn new(
        kind: EventKind,
        commit_sha: impl Into<String>,
        actor: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            commit_sha: commit_sha.into(),
            actor: actor.into(),
            branch: branch.into(),
        }
    }
}

/// Status of a single pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Ok,
    Error,
    Skipped,
}

/// Outcome of one pipeline stage. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageResult {
    pub stage_name: String,

    pub status: StageStatus,

    /// Diagnostic text, surfaced verbatim from the failing tool.
    pub detail: String,

    /// Wall-clock duration in milliseconds (0 for skipped stages).
    pub duration_ms: u64,
}

impl StageResult {
    pub fn ok(stage_name: impl Into<String>, detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Ok,
            detail: detail.into(),
            duration_ms,
        }
    }

    pub fn error(
        stage_name: impl Into<String>,
        detail: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Error,
            detail: detail.into(),
            duration_ms,
        }
    }

    pub fn skipped(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            status: StageStatus::Skipped,
            detail: String::new(),
            duration_ms: 0,
        }
    }

    /// Whether this stage executed and succeeded.
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Ok
    }
}

/// Final outcome of a pipeline run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Pending,
    Succeeded,
    Failed,

    /// The event targeted a branch the pipeline is not configured for;
    /// no stage executed.
    Skipped,
}

/// One execution of the orchestrator for a given [`TriggerEvent`].
///
/// `stage_results` is append-only and its order equals execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,

    pub event: TriggerEvent,

    pub stage_results: Vec<StageResult>,

    pub outcome: RunOutcome,

    pub started_at: DateTime<Utc>,

    /// None while the run is still executing.
    pub finished_at: Option<DateTime<Utc>>,

    /// Digest of the pipeline configuration this run executed under.
    pub config_digest: String,
}

impl PipelineRun {
    /// Create a pending run for a trigger event.
    pub fn new(event: TriggerEvent, config_digest: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            event,
            stage_results: Vec::new(),
            outcome: RunOutcome::Pending,
            started_at: Utc::now(),
            finished_at: None,
            config_digest: config_digest.into(),
        }
    }

    /// Append a stage result in execution order.
    pub fn record(&mut self, result: StageResult) {
        self.stage_results.push(result);
    }

    /// Finalize the run with its outcome.
    pub fn finalize(&mut self, outcome: RunOutcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    /// Number of stages that executed and passed.
    pub fn passed_count(&self) -> usize {
        self.stage_results.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that executed and failed.
    pub fn failed_count(&self) -> usize {
        self.stage_results
            .iter()
            .filter(|s| s.status == StageStatus::Error)
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Succeeded
    }
}

/// The built container image and its registry coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageArtifact {
    /// Registry host, e.g. `ghcr.io`.
    pub registry: String,

    /// Repository owner segment, lower-cased. Registries are
    /// case-sensitive and reject upper-case path segments; an
    /// unnormalized identity would silently address a different,
    /// non-existent repository.
    pub registry_identity: String,

    /// Image name segment, lower-cased.
    pub image_name: String,

    /// Immutable tag derived from the source commit SHA.
    pub digest_tag: String,

    /// Mutable tag repointed on every successful publish.
    pub moving_tag: String,
}

impl ImageArtifact {
    /// Build an artifact for a commit. The owner and image name are
    /// normalized to lower case here, before anything reaches the
    /// registry boundary.
    pub fn new(
        registry: impl Into<String>,
        registry_identity: &str,
        image_name: &str,
        commit_sha: &str,
        moving_tag: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            registry_identity: registry_identity.to_lowercase(),
            image_name: image_name.to_lowercase(),
            digest_tag: commit_sha.to_string(),
            moving_tag: moving_tag.into(),
        }
    }

    /// `<registry>/<identity>/<image>` without a tag.
    pub fn repository(&self) -> String {
        format!(
            "{}/{}/{}",
            self.registry, self.registry_identity, self.image_name
        )
    }

    /// Full reference under the immutable commit-derived tag.
    pub fn digest_reference(&self) -> String {
        format!("{}:{}", self.repository(), self.digest_tag)
    }

    /// Full reference under the moving tag.
    pub fn moving_reference(&self) -> String {
        format!("{}:{}", self.repository(), self.moving_tag)
    }

    /// Whether every path segment is already lower-case.
    pub fn is_normalized(&self) -> bool {
        let path = format!("{}/{}", self.registry_identity, self.image_name);
        !path.chars().any(|c| c.is_ascii_uppercase())
    }
}

/// Fixed service identity used for release commits. Set once at
/// pipeline start, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitIdentity {
    pub name: String,
    pub email: String,
}

impl CommitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The version-control revision produced by the release committer.
///
/// `changed == false` means the manifest already matched the target
/// content: no commit was created and the stage is a successful no-op.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitRecord {
    pub author: CommitIdentity,
    pub message: String,
    pub changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_passed() {
        assert!(StageResult::ok("validate", "", 10).passed());
        assert!(!StageResult::error("build", "boom", 10).passed());
        assert!(!StageResult::skipped("publish").passed());
    }

    #[test]
    fn test_pipeline_run_counts() {
        let event = TriggerEvent::new(EventKind::Push, "abc123", "ci", "main");
        let mut run = PipelineRun::new(event, "digest");

        run.record(StageResult::ok("validate", "", 100));
        run.record(StageResult::error("build", "engine error", 200));
        run.record(StageResult::skipped("publish"));

        assert_eq!(run.passed_count(), 1);
        assert_eq!(run.failed_count(), 1);
        assert_eq!(run.stage_results.len(), 3);
    }

    #[test]
    fn test_pipeline_run_finalize() {
        let event = TriggerEvent::new(EventKind::PullRequest, "abc123", "dev", "main");
        let mut run = PipelineRun::new(event, "digest");
        assert_eq!(run.outcome, RunOutcome::Pending);
        assert!(run.finished_at.is_none());

        run.finalize(RunOutcome::Succeeded);
        assert!(run.is_success());
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_image_artifact_references() {
        let artifact = ImageArtifact::new("ghcr.io", "org", "weather-service", "abc123", "latest");
        assert_eq!(
            artifact.digest_reference(),
            "ghcr.io/org/weather-service:abc123"
        );
        assert_eq!(
            artifact.moving_reference(),
            "ghcr.io/org/weather-service:latest"
        );
    }

    #[test]
    fn test_image_artifact_normalizes_identity() {
        let artifact =
            ImageArtifact::new("ghcr.io", "MyOrg", "Weather-Service", "abc123", "latest");
        assert_eq!(artifact.registry_identity, "myorg");
        assert_eq!(artifact.image_name, "weather-service");
        assert!(artifact.is_normalized());
    }

    #[test]
    fn test_event_kind_serde_snake_case() {
        let json = serde_json::to_string(&EventKind::PullRequest).unwrap();
        assert_eq!(json, "\"pull_request\"");
        let kind: EventKind = serde_json::from_str("\"push\"").unwrap();
        assert_eq!(kind, EventKind::Push);
    }
}
