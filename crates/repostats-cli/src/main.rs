//! repostats - archive GitHub traffic statistics from CI
//!
//! ## Commands
//!
//! - `run`: fetch the four traffic reports, zip them and push the archive
//! - `fetch`: only fetch the reports into a directory
//! - `package`: build the archive from report files already on disk
//! - `archive-name`: print the archive name for the current run

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use repostats_ci::{RunOptions, RunOutcome, TrafficPipeline};
use repostats_core::{
    archive_name, ApiConfig, ApiToken, ArchiveBuilder, CommitIdentity, GitHubTrafficClient,
    Granularity, PublishTarget, RepoSlug, ReportKind, RunConfig, RunIdentity, StatsFetcher,
    DEFAULT_API_URL, DEFAULT_GIT_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_TARGET_BRANCH,
    DEFAULT_TARGET_DIR,
};

#[derive(Parser)]
#[command(name = "repostats")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Archive GitHub traffic statistics into a git branch", long_about = None)]
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

#[derive(Subcommand)]
enum Commands {
    /// Fetch, archive and publish traffic statistics
    Run {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        api: ApiArgs,

        #[command(flatten)]
        target: TargetArgs,

        /// Stop after the archive is built
        #[arg(long)]
        skip_publish: bool,

        /// Also copy the archive into this directory
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Create the scratch directory below this path
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Print the run outcome as JSON on stdout
        #[arg(long)]
        summary_json: bool,
    },

    /// Fetch the four traffic reports into a directory
    Fetch {
        /// Repository to query (owner/name)
        #[arg(long, env = "GITHUB_REPOSITORY")]
        repository: String,

        #[command(flatten)]
        api: ApiArgs,

        /// Directory to write the report files into
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Build the run archive from report files on disk
    Package {
        #[command(flatten)]
        run: RunArgs,

        /// Directory holding views.json, clones.json, referrers.json and paths.json
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the archive into
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the archive name for a run
    ArchiveName {
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Which repository, ref and CI run this invocation belongs to.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Repository whose traffic is archived (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Branch or tag the run was triggered for
    #[arg(long = "ref", env = "GITHUB_REF_NAME")]
    git_ref: String,

    /// CI run identifier
    #[arg(long, env = "GITHUB_RUN_ID")]
    run_id: String,
}

#[derive(Args, Debug, Clone)]
struct ApiArgs {
    /// Token with read access to repository traffic
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Views/clones granularity (day or week)
    #[arg(long, env = "REPOSTATS_PER")]
    per: Option<Granularity>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "REPOSTATS_HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    /// Fetch the four reports concurrently
    #[arg(long)]
    parallel: bool,
}

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Repository receiving the archives (default: the measured repository on github.com)
    #[arg(long, env = "REPOSTATS_TARGET_URL")]
    target_url: Option<String>,

    /// Branch receiving the archives
    #[arg(long, env = "REPOSTATS_TARGET_BRANCH", default_value = DEFAULT_TARGET_BRANCH)]
    target_branch: String,

    /// Directory inside the branch
    #[arg(long, env = "REPOSTATS_TARGET_DIR", default_value = DEFAULT_TARGET_DIR)]
    target_dir: String,

    /// Timeout for each git command in seconds
    #[arg(long, env = "REPOSTATS_GIT_TIMEOUT_SECS", default_value_t = DEFAULT_GIT_TIMEOUT_SECS)]
    git_timeout_secs: u64,

    /// Commit author name (default: author of the branch's latest commit)
    #[arg(long, env = "REPOSTATS_COMMIT_NAME")]
    commit_name: Option<String>,

    /// Commit author email (default: author of the branch's latest commit)
    #[arg(long, env = "REPOSTATS_COMMIT_EMAIL")]
    commit_email: Option<String>,

    /// Commit message (default: "Add traffic statistics <archive>")
    #[arg(long, env = "REPOSTATS_COMMIT_MESSAGE")]
    commit_message: Option<String>,
}

impl RunArgs {
    fn identity(&self) -> Result<RunIdentity> {
        let slug = parse_repository(&self.repository)?;
        RunIdentity::new(slug, &self.git_ref, &self.run_id).context("Invalid run identity")
    }
}

impl ApiArgs {
    fn token(&self) -> Result<ApiToken> {
        let raw = self
            .token
            .as_deref()
            .context("GITHUB_TOKEN is not set (pass --token or export GITHUB_TOKEN)")?;
        ApiToken::new(raw).context("Invalid GITHUB_TOKEN")
    }

    fn config(&self) -> ApiConfig {
        ApiConfig::new(&self.api_url)
            .with_per(self.per)
            .with_timeout_secs(self.http_timeout_secs)
            .with_parallel(self.parallel)
    }
}

impl TargetArgs {
    fn commit_identity(&self) -> Result<Option<CommitIdentity>> {
        match (&self.commit_name, &self.commit_email) {
            (Some(name), Some(email)) => Ok(Some(CommitIdentity {
                name: name.clone(),
                email: email.clone(),
            })),
            (None, None) => Ok(None),
            _ => bail!("REPOSTATS_COMMIT_NAME and REPOSTATS_COMMIT_EMAIL must be set together"),
        }
    }

    fn target(&self, repository: &RepoSlug) -> Result<PublishTarget> {
        let base = match &self.target_url {
            Some(url) => PublishTarget::new(url),
            None => PublishTarget::for_repository(repository),
        };
        Ok(base
            .with_branch(&self.target_branch)
            .with_directory(&self.target_dir)
            .with_git_timeout_secs(self.git_timeout_secs)
            .with_identity(self.commit_identity()?)
            .with_commit_message(self.commit_message.clone()))
    }
}

fn parse_repository(raw: &str) -> Result<RepoSlug> {
    raw.parse::<RepoSlug>()
        .with_context(|| format!("Invalid repository {raw:?}"))
}

fn build_run_config(run: &RunArgs, api: &ApiArgs, target: &TargetArgs) -> Result<RunConfig> {
    let identity = run.identity()?;
    let target = target.target(&identity.repository)?;
    let config = RunConfig::new(identity, api.token()?)
        .with_api(api.config())
        .with_target(target);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    repostats_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run {
            run,
            api,
            target,
            skip_publish,
            output_dir,
            scratch_dir,
            summary_json,
        } => {
            let config = build_run_config(&run, &api, &target)?;
            let options = RunOptions {
                skip_publish,
                output_dir,
                scratch_root: scratch_dir,
            };
            cmd_run(&config, &options, summary_json).await
        }
        Commands::Fetch {
            repository,
            api,
            out,
        } => cmd_fetch(&repository, &api, &out).await,
        Commands::Package { run, input, out } => cmd_package(&run, &input, &out),
        Commands::ArchiveName { run } => {
            println!("{}", cmd_archive_name(&run)?);
            Ok(())
        }
    }
}

/// Full Fetch -> Archive -> Publish run.
async fn cmd_run(config: &RunConfig, options: &RunOptions, summary_json: bool) -> Result<()> {
    let outcome = TrafficPipeline::run_github(config, options)
        .await
        .with_context(|| format!("Run {} failed", config.identity.run_id))?;

    if summary_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!("Archive:  {}", outcome.archive_name);
    println!("Digest:   {}", outcome.archive_digest);
    println!("Size:     {} bytes", outcome.archive_size_bytes);
    for report in &outcome.reports {
        println!("  {:<10} {} bytes", report.kind.name(), report.bytes);
    }
    if let Some(path) = &outcome.kept_archive {
        println!("Copied to {}", path.display());
    }
    match &outcome.published {
        Some(receipt) => println!(
            "Published {} to {} ({})",
            receipt.path_in_repo,
            receipt.branch,
            &receipt.commit_sha[..receipt.commit_sha.len().min(12)]
        ),
        None => println!("Publishing skipped"),
    }
    println!("Finished in {} ms", outcome.duration_ms);
}

/// Fetch the reports without archiving them.
async fn cmd_fetch(repository: &str, api: &ApiArgs, out: &Path) -> Result<()> {
    let slug = parse_repository(repository)?;
    let client = GitHubTrafficClient::new(&api.config(), &slug, api.token()?)
        .context("Failed to build HTTP client")?;
    let reports = StatsFetcher::new(&client)
        .parallel(api.parallel)
        .fetch_all(out)
        .await
        .with_context(|| format!("Failed to fetch traffic for {slug}"))?;

    for report in &reports {
        println!("{} ({} bytes)", report.path.display(), report.bytes);
    }
    Ok(())
}

/// Zip report files that are already on disk.
fn cmd_package(run: &RunArgs, input: &Path, out: &Path) -> Result<()> {
    let identity = run.identity()?;
    let builder = ArchiveBuilder::new(&identity).context("Invalid archive name")?;
    let inputs: Vec<PathBuf> = ReportKind::ALL
        .iter()
        .map(|kind| input.join(kind.file_name()))
        .collect();

    info!(input = %input.display(), archive = %builder.name(), "Packaging reports");
    let archive = builder
        .build(&inputs, out)
        .with_context(|| format!("Failed to package reports from {}", input.display()))?;

    println!("{}", archive.path.display());
    println!("sha256:{}", archive.digest);
    Ok(())
}

fn cmd_archive_name(run: &RunArgs) -> Result<String> {
    let identity = run.identity()?;
    archive_name(&identity).context("Invalid archive name")
}
