//! repostats core library
//!
//! Configuration, traffic report fetching and archive packaging for the
//! Fetch -> Archive -> Publish pipeline. Publishing lives in `repostats-ci`.

pub mod archive;
pub mod config;
pub mod error;
pub mod fakes;
pub mod fetch;
pub mod obs;
pub mod report;
pub mod telemetry;

pub use archive::{archive_name, normalize_ref, Archive, ArchiveBuilder};
pub use config::{
    ApiConfig, ApiToken, CommitIdentity, PublishTarget, RepoSlug, RunConfig, RunIdentity,
    DEFAULT_API_URL, DEFAULT_GIT_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_TARGET_BRANCH,
    DEFAULT_TARGET_DIR,
};
pub use error::{ConfigError, FetchError, PackagingError};
pub use fetch::{GitHubTrafficClient, StatsFetcher, TrafficSource, ACCEPT_HEADER, API_VERSION};
pub use obs::{
    emit_archive_built, emit_publish_committed, emit_report_fetched, emit_run_finished,
    emit_run_started, emit_stage_entered, emit_stage_failed, run_span,
};
pub use report::{FetchedReport, Granularity, ReportKind};
pub use telemetry::init_tracing;

/// repostats version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
