//! Gantry - trunk-push container release pipeline CLI
//!
//! ## Commands
//!
//! - `run`: execute the full pipeline for a trigger event
//! - `validate`: run the validation stage alone
//! - `mutate`: rewrite the manifest image reference (manual repair)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use gantry_core::domain::{EventKind, PipelineRun, RunOutcome, StageStatus, TriggerEvent};
use gantry_pipeline::{Orchestrator, PipelineConfig, ProcessValidator, Validator};

#[derive(Parser)]
#[command(name = "gantry")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trunk-push container release pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Trigger event kind, as delivered by the hosting platform.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
    Push,
    PullRequest,
}

impl From<EventArg> for EventKind {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => EventKind::Push,
            EventArg::PullRequest => EventKind::PullRequest,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the release pipeline for a trigger event
    Run {
        /// Event kind
        #[arg(long, value_enum, default_value_t = EventArg::Push)]
        event: EventArg,

        /// Source commit SHA (auto-detected from the workspace if omitted)
        #[arg(long)]
        sha: Option<String>,

        /// Branch the event targets
        #[arg(long, default_value = "main")]
        branch: String,

        /// Identity initiating the event
        #[arg(long, default_value = "manual")]
        actor: String,

        /// Pipeline configuration file
        #[arg(long, default_value = "gantry.json")]
        config: PathBuf,
    },

    /// Run the validation stage alone
    Validate {
        /// Pipeline configuration file
        #[arg(long, default_value = "gantry.json")]
        config: PathBuf,
    },

    /// Rewrite the image reference in a deployment manifest
    Mutate {
        /// Manifest file to rewrite
        #[arg(long)]
        manifest: PathBuf,

        /// New image reference
        #[arg(long)]
        image: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gantry_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            event,
            sha,
            branch,
            actor,
            config,
        } => cmd_run(event, sha, &branch, &actor, &config).await,
        Commands::Validate { config } => cmd_validate(&config).await,
        Commands::Mutate { manifest, image } => cmd_mutate(&manifest, &image),
    }
}

/// Load the pipeline configuration, falling back to defaults when the
/// file does not exist.
fn load_config(path: &Path) -> Result<PipelineConfig> {
    if path.exists() {
        PipelineConfig::load(path)
            .with_context(|| format!("failed to load pipeline config: {}", path.display()))
    } else {
        info!(config = %path.display(), "config file not found; using defaults");
        PipelineConfig::default()
            .normalized()
            .context("default pipeline config is invalid")
    }
}

/// Resolve the source commit for a run: an explicit `--sha` wins,
/// otherwise the workspace checkout's HEAD.
fn resolve_sha(sha: Option<String>, workspace: &Path) -> Result<String> {
    match sha {
        Some(sha) => Ok(sha),
        None => {
            if !gantry_core::is_git_repo(workspace) {
                anyhow::bail!(
                    "no --sha given and {} is not a git checkout",
                    workspace.display()
                );
            }
            gantry_core::capture_head_sha(workspace)
                .context("failed to resolve HEAD of the workspace")
        }
    }
}

/// Execute the release pipeline for a trigger event
async fn cmd_run(
    event: EventArg,
    sha: Option<String>,
    branch: &str,
    actor: &str,
    config_path: &Path,
) -> Result<()> {
    let config = load_config(config_path)?;
    let commit_sha = resolve_sha(sha, &config.workspace)?;

    let trigger = TriggerEvent::new(EventKind::from(event), commit_sha, actor, branch);

    println!("Running release pipeline for {:?}", config.workspace);
    println!(
        "Event: {:?} @ {} (branch {}, actor {})",
        trigger.kind, trigger.commit_sha, trigger.branch, trigger.actor
    );
    println!();

    let orchestrator = Orchestrator::from_config(config);
    let run = orchestrator.run(trigger).await;

    print_run(&run);

    match run.outcome {
        RunOutcome::Succeeded => Ok(()),
        RunOutcome::Skipped => {
            println!("\nEvent branch is outside this pipeline's trunk; nothing to do.");
            Ok(())
        }
        _ => anyhow::bail!("pipeline run failed"),
    }
}

fn print_run(run: &PipelineRun) {
    println!("Run ID: {}", run.run_id);
    println!(
        "Status: {}",
        match run.outcome {
            RunOutcome::Succeeded => "✓ SUCCEEDED",
            RunOutcome::Failed => "✗ FAILED",
            RunOutcome::Skipped => "- SKIPPED",
            RunOutcome::Pending => "… PENDING",
        }
    );
    println!();

    for stage in &run.stage_results {
        let glyph = match stage.status {
            StageStatus::Ok => "✓",
            StageStatus::Error => "✗",
            StageStatus::Skipped => "-",
        };
        println!(
            "  {} {} ({}ms)",
            glyph, stage.stage_name, stage.duration_ms
        );
        if stage.status == StageStatus::Error {
            for line in stage.detail.lines() {
                println!("      {line}");
            }
        }
    }

    println!();
    println!(
        "Summary: {}/{} stages passed",
        run.passed_count(),
        run.stage_results.len()
    );
}

/// Run the validation stage alone
async fn cmd_validate(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let validator = ProcessValidator::from_config(&config);

    match validator.validate().await {
        Ok(summary) => {
            println!("✓ {summary}");
            Ok(())
        }
        Err(e) => anyhow::bail!("validation failed: {e}"),
    }
}

/// Rewrite the image reference in a deployment manifest
fn cmd_mutate(manifest: &Path, image: &str) -> Result<()> {
    let count = gantry_core::rewrite_image_reference(manifest, image)
        .with_context(|| format!("failed to rewrite manifest: {}", manifest.display()))?;

    println!(
        "Rewrote {} image line(s) in {} to {}",
        count,
        manifest.display(),
        image
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_arg_maps_to_kind() {
        assert_eq!(EventKind::from(EventArg::Push), EventKind::Push);
        assert_eq!(
            EventKind::from(EventArg::PullRequest),
            EventKind::PullRequest
        );
    }

    #[test]
    fn test_resolve_sha_prefers_explicit_value() {
        let dir = tempfile::tempdir().unwrap();
        let sha = resolve_sha(Some("abc123".to_string()), dir.path()).unwrap();
        assert_eq!(sha, "abc123");
    }

    #[test]
    fn test_resolve_sha_rejects_non_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_sha(None, dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a git checkout"));
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("gantry.json")).unwrap();
        assert_eq!(config.trunk_branch, "main");
    }

    #[test]
    fn test_load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gantry.json");
        std::fs::write(&path, r#"{"trunk_branch": "release"}"#).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.trunk_branch, "release");
    }

    #[test]
    fn test_cmd_mutate_rewrites_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.yaml");
        std::fs::write(&path, "image: svc:old\n").unwrap();

        cmd_mutate(&path, "svc:new").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "image: svc:new\n"
        );
    }

    #[test]
    fn test_cmd_mutate_rejects_manifest_without_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.yaml");
        std::fs::write(&path, "kind: Service\n").unwrap();

        assert!(cmd_mutate(&path, "svc:new").is_err());
    }
}
