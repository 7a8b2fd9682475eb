//! Pipeline orchestration: strict fail-fast sequencing of
//! validate -> build -> publish -> mutate-manifest -> commit.
//!
//! The orchestrator performs no external I/O of its own; every side
//! effect lives behind a stage trait. Its job is gating (event kind,
//! trunk branch), ordering, and recording an auditable stage trace.

use std::sync::Arc;
use std::time::Instant;

use gantry_core::domain::{EventKind, PipelineRun, RunOutcome, StageResult, TriggerEvent};
use tracing::{error, info};

use crate::builder::{DockerBuilder, ImageBuilder};
use crate::committer::{GitCommitter, ReleaseCommitter};
use crate::config::PipelineConfig;
use crate::mutator::{FileManifestMutator, ManifestMutator};
use crate::publisher::{DockerPublisher, Publisher};
use crate::validator::{ProcessValidator, Validator};

pub const STAGE_VALIDATE: &str = "validate";
pub const STAGE_BUILD: &str = "build";
pub const STAGE_PUBLISH: &str = "publish";
pub const STAGE_MUTATE: &str = "mutate_manifest";
pub const STAGE_COMMIT: &str = "commit";

/// All stages in execution order.
pub const STAGES: [&str; 5] = [
    STAGE_VALIDATE,
    STAGE_BUILD,
    STAGE_PUBLISH,
    STAGE_MUTATE,
    STAGE_COMMIT,
];

/// Stages gated on `EventKind::Push`.
const DEPLOY_STAGES: [&str; 4] = [STAGE_BUILD, STAGE_PUBLISH, STAGE_MUTATE, STAGE_COMMIT];

/// Sequences the pipeline stages for one trigger event at a time.
/// Concurrent runs are independent; conflict between them is detected
/// by the committer's push step.
pub struct Orchestrator {
    config: PipelineConfig,
    validator: Arc<dyn Validator>,
    builder: Arc<dyn ImageBuilder>,
    publisher: Arc<dyn Publisher>,
    mutator: Arc<dyn ManifestMutator>,
    committer: Arc<dyn ReleaseCommitter>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        validator: Arc<dyn Validator>,
        builder: Arc<dyn ImageBuilder>,
        publisher: Arc<dyn Publisher>,
        mutator: Arc<dyn ManifestMutator>,
        committer: Arc<dyn ReleaseCommitter>,
    ) -> Self {
        Self {
            config,
            validator,
            builder,
            publisher,
            mutator,
            committer,
        }
    }

    /// Wire up the process-backed stage implementations.
    pub fn from_config(config: PipelineConfig) -> Self {
        let validator = Arc::new(ProcessValidator::from_config(&config));
        let builder = Arc::new(DockerBuilder::from_config(&config));
        let publisher = Arc::new(DockerPublisher::from_config(&config));
        let mutator = Arc::new(FileManifestMutator::from_config(&config));
        let committer = Arc::new(GitCommitter::from_config(&config));
        Self::new(config, validator, builder, publisher, mutator, committer)
    }

    /// Execute the pipeline for one trigger event.
    ///
    /// Gating rules:
    /// - Events for a branch other than the configured trunk skip the
    ///   entire run.
    /// - The validator always executes first.
    /// - Build/publish/mutate/commit execute only for push events with
    ///   a passing validator; the first error marks the remaining
    ///   stages skipped and fails the run.
    pub async fn run(&self, event: TriggerEvent) -> PipelineRun {
        let mut run = PipelineRun::new(event.clone(), self.config.config_digest());

        info!(
            run_id = %run.run_id,
            kind = ?event.kind,
            commit_sha = %event.commit_sha,
            actor = %event.actor,
            branch = %event.branch,
            "starting pipeline run"
        );

        if event.branch != self.config.trunk_branch {
            for stage in STAGES {
                run.record(StageResult::skipped(stage));
            }
            run.finalize(RunOutcome::Skipped);
            info!(
                run_id = %run.run_id,
                branch = %event.branch,
                trunk = %self.config.trunk_branch,
                "event branch is not the trunk; run skipped"
            );
            return run;
        }

        let start = Instant::now();
        match self.validator.validate().await {
            Ok(summary) => {
                run.record(StageResult::ok(
                    STAGE_VALIDATE,
                    summary,
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => {
                return self.fail(
                    run,
                    StageResult::error(
                        STAGE_VALIDATE,
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                    ),
                    &DEPLOY_STAGES,
                );
            }
        }

        if event.kind != EventKind::Push {
            for stage in DEPLOY_STAGES {
                run.record(StageResult::skipped(stage));
            }
            run.finalize(RunOutcome::Succeeded);
            info!(run_id = %run.run_id, "validation-only run succeeded");
            return run;
        }

        let artifact = self.config.artifact_for(&event.commit_sha);
        let new_reference = artifact.digest_reference();

        let start = Instant::now();
        match self.builder.build(&artifact).await {
            Ok(()) => {
                run.record(StageResult::ok(
                    STAGE_BUILD,
                    format!("built {new_reference}"),
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => {
                return self.fail(
                    run,
                    StageResult::error(
                        STAGE_BUILD,
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                    ),
                    &[STAGE_PUBLISH, STAGE_MUTATE, STAGE_COMMIT],
                );
            }
        }

        let start = Instant::now();
        match self.publisher.publish(&artifact).await {
            Ok(()) => {
                run.record(StageResult::ok(
                    STAGE_PUBLISH,
                    format!(
                        "pushed {} and {}",
                        artifact.digest_reference(),
                        artifact.moving_reference()
                    ),
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => {
                return self.fail(
                    run,
                    StageResult::error(
                        STAGE_PUBLISH,
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                    ),
                    &[STAGE_MUTATE, STAGE_COMMIT],
                );
            }
        }

        let start = Instant::now();
        match self.mutator.mutate(&new_reference).await {
            Ok(count) => {
                run.record(StageResult::ok(
                    STAGE_MUTATE,
                    format!("rewrote {count} image line(s) to {new_reference}"),
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => {
                return self.fail(
                    run,
                    StageResult::error(
                        STAGE_MUTATE,
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                    ),
                    &[STAGE_COMMIT],
                );
            }
        }

        let message = format!("Update deployment image to {new_reference}");
        let start = Instant::now();
        match self.committer.commit(&message).await {
            Ok(record) => {
                let detail = if record.changed {
                    "release commit pushed".to_string()
                } else {
                    "manifest already up to date; no commit created".to_string()
                };
                run.record(StageResult::ok(
                    STAGE_COMMIT,
                    detail,
                    start.elapsed().as_millis() as u64,
                ));
            }
            Err(e) => {
                return self.fail(
                    run,
                    StageResult::error(
                        STAGE_COMMIT,
                        e.to_string(),
                        start.elapsed().as_millis() as u64,
                    ),
                    &[],
                );
            }
        }

        run.finalize(RunOutcome::Succeeded);
        info!(
            run_id = %run.run_id,
            stages = run.stage_results.len(),
            "pipeline run succeeded"
        );
        run
    }

    /// Record a failing stage, mark the remaining stages skipped, and
    /// finalize the run as failed.
    fn fail(
        &self,
        mut run: PipelineRun,
        failed: StageResult,
        remaining: &[&str],
    ) -> PipelineRun {
        error!(
            run_id = %run.run_id,
            stage = %failed.stage_name,
            detail = %failed.detail,
            "stage failed; aborting run"
        );
        run.record(failed);
        for stage in remaining {
            run.record(StageResult::skipped(*stage));
        }
        run.finalize(RunOutcome::Failed);
        run
    }
}
