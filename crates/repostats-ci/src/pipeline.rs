//! Fetch -> Archive -> Publish orchestration.

use chrono::{DateTime, Utc};
use repostats_core::{
    obs, Archive, ArchiveBuilder, GitHubTrafficClient, PackagingError, ReportKind, RunConfig,
    StatsFetcher, TrafficSource,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::{info, Instrument};

use crate::error::PipelineError;
use crate::publish::{PublishReceipt, Publisher};
use crate::stage::{RunState, StateMachine};

/// Per-invocation switches that are not part of the run configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after archiving.
    pub skip_publish: bool,

    /// Copy the archive here before publishing.
    pub output_dir: Option<PathBuf>,

    /// Create the scratch directory below this path instead of the system temp dir.
    pub scratch_root: Option<PathBuf>,
}

/// Size of one fetched report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub kind: ReportKind,
    pub bytes: u64,
}

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// CI run identifier.
    pub run_id: String,

    /// Repository whose traffic was fetched (`owner/name`).
    pub repository: String,

    /// Archive file name.
    pub archive_name: String,

    /// SHA-256 of the archive (hex).
    pub archive_digest: String,

    /// Archive size in bytes.
    pub archive_size_bytes: u64,

    /// One entry per fetched report.
    pub reports: Vec<ReportSummary>,

    /// Local copy of the archive, when an output directory was given.
    pub kept_archive: Option<PathBuf>,

    /// Publish result; `None` when publishing was skipped.
    pub published: Option<PublishReceipt>,

    /// Final state (always `done` for a returned outcome).
    pub state: RunState,

    /// Every state the run went through.
    pub states: Vec<RunState>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

/// Run orchestrator.
pub struct TrafficPipeline;

impl TrafficPipeline {
    /// Run against the GitHub REST API described by `config.api`.
    pub async fn run_github(
        config: &RunConfig,
        options: &RunOptions,
    ) -> Result<RunOutcome, PipelineError> {
        config.validate()?;
        let client = GitHubTrafficClient::new(
            &config.api,
            &config.identity.repository,
            config.token.clone(),
        )?;
        Self::run(config, &client, options).await
    }

    /// Execute one run with reports taken from `source`.
    ///
    /// Stages run strictly in order and the first failure ends the run. The
    /// scratch directory is removed on every exit path.
    pub async fn run(
        config: &RunConfig,
        source: &dyn TrafficSource,
        options: &RunOptions,
    ) -> Result<RunOutcome, PipelineError> {
        let span = obs::run_span(
            &config.identity.run_id,
            &config.identity.repository.to_string(),
        );
        async move {
            let start = Instant::now();
            let mut machine = StateMachine::new();

            let result = Self::drive(&mut machine, config, source, options, start).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => obs::emit_run_finished(&config.identity.run_id, duration_ms, true),
                Err(err) => {
                    machine.fail();
                    obs::emit_stage_failed(err.stage(), err);
                    obs::emit_run_finished(&config.identity.run_id, duration_ms, false);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        machine: &mut StateMachine,
        config: &RunConfig,
        source: &dyn TrafficSource,
        options: &RunOptions,
        start: Instant,
    ) -> Result<RunOutcome, PipelineError> {
        let started_at = Utc::now();
        config.validate()?;
        let builder = ArchiveBuilder::new(&config.identity)?;
        let scratch = scratch_dir(options.scratch_root.as_deref())?;
        obs::emit_run_started(&config.identity.run_id, builder.name());

        enter(machine, RunState::Fetching)?;
        let reports = StatsFetcher::new(source)
            .parallel(config.api.parallel)
            .fetch_all(&scratch.path().join("reports"))
            .await?;

        enter(machine, RunState::Archiving)?;
        let inputs: Vec<PathBuf> = reports.iter().map(|r| r.path.clone()).collect();
        let archive = builder.build(&inputs, &scratch.path().join("archive"))?;
        let kept_archive = match &options.output_dir {
            Some(dir) => Some(keep_copy(&archive, dir).await?),
            None => None,
        };

        let published = if options.skip_publish {
            info!(archive = %archive.name, "Publishing skipped");
            None
        } else {
            enter(machine, RunState::Publishing)?;
            let publisher = Publisher::new(&config.target, &config.token);
            Some(publisher.publish(&archive, scratch.path()).await?)
        };

        enter(machine, RunState::Done)?;
        Ok(RunOutcome {
            run_id: config.identity.run_id.clone(),
            repository: config.identity.repository.to_string(),
            archive_name: archive.name,
            archive_digest: archive.digest,
            archive_size_bytes: archive.size_bytes,
            reports: reports
                .iter()
                .map(|r| ReportSummary {
                    kind: r.kind,
                    bytes: r.bytes,
                })
                .collect(),
            kept_archive,
            published,
            state: machine.state(),
            states: machine.history().to_vec(),
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

fn enter(machine: &mut StateMachine, next: RunState) -> Result<(), PipelineError> {
    machine.transition(next)?;
    obs::emit_stage_entered(next.name());
    Ok(())
}

fn scratch_dir(root: Option<&Path>) -> Result<TempDir, PipelineError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("repostats-");
    match root {
        Some(root) => {
            std::fs::create_dir_all(root).map_err(PipelineError::Scratch)?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    }
    .map_err(PipelineError::Scratch)
}

/// Copy the archive into `dir`, refusing to overwrite.
async fn keep_copy(archive: &Archive, dir: &Path) -> Result<PathBuf, PackagingError> {
    tokio::fs::create_dir_all(dir).await?;
    let dest = dir.join(&archive.name);
    if tokio::fs::try_exists(&dest).await? {
        return Err(PackagingError::AlreadyExists(dest.display().to_string()));
    }
    tokio::fs::copy(&archive.path, &dest).await?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repostats_core::fakes::{FakeResponse, StaticTrafficSource};
    use repostats_core::{ApiToken, PublishTarget, RepoSlug, RunIdentity};

    fn config(target_url: &str) -> RunConfig {
        let slug: RepoSlug = "acme/widget".parse().unwrap();
        let identity = RunIdentity::new(slug, "main", "42").unwrap();
        RunConfig::new(identity, ApiToken::new("t").unwrap())
            .with_target(PublishTarget::new(target_url))
    }

    #[tokio::test]
    async fn test_skip_publish_keeps_archive() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            skip_publish: true,
            output_dir: Some(dir.path().join("out")),
            scratch_root: Some(dir.path().join("scratch")),
        };

        let outcome = TrafficPipeline::run(
            &config("/nonexistent/remote.git"),
            &StaticTrafficSource::all_empty_json(),
            &options,
        )
        .await
        .unwrap();

        assert_eq!(outcome.archive_name, "widget.main.42.zip");
        assert_eq!(outcome.state, RunState::Done);
        assert!(outcome.published.is_none());
        assert_eq!(
            outcome.states,
            vec![
                RunState::Idle,
                RunState::Fetching,
                RunState::Archiving,
                RunState::Done
            ]
        );
        assert!(dir.path().join("out").join("widget.main.42.zip").exists());
        assert_eq!(outcome.reports.len(), 4);
        assert!(outcome.reports.iter().all(|r| r.bytes == 2));

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["reports"][0]["kind"], "views");
        assert!(json["published"].is_null());
    }

    #[tokio::test]
    async fn test_scratch_removed_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scratch_root = dir.path().join("scratch");
        let options = RunOptions {
            skip_publish: true,
            output_dir: Some(dir.path().join("out")),
            scratch_root: Some(scratch_root.clone()),
        };
        let source =
            StaticTrafficSource::all_empty_json().with(ReportKind::Views, FakeResponse::Status(401));

        let err = TrafficPipeline::run(&config("/nonexistent/remote.git"), &source, &options)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "fetching");
        assert_eq!(std::fs::read_dir(&scratch_root).unwrap().count(), 0);
        assert!(!dir.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_fetching() {
        let source = StaticTrafficSource::all_empty_json();
        let mut config = config("/nonexistent/remote.git");
        config.target.directory = "../escape".to_string();

        let err = TrafficPipeline::run(&config, &source, &RunOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "setup");
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_output_dir_collision_is_packaging_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("widget.main.42.zip"), b"old").unwrap();
        let options = RunOptions {
            skip_publish: true,
            output_dir: Some(out.clone()),
            scratch_root: Some(dir.path().join("scratch")),
        };

        let err = TrafficPipeline::run(
            &config("/nonexistent/remote.git"),
            &StaticTrafficSource::all_empty_json(),
            &options,
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage(), "archiving");
        assert_eq!(std::fs::read(out.join("widget.main.42.zip")).unwrap(), b"old");
    }
}
