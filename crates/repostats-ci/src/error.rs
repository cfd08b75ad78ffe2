//! Error types for publishing and run orchestration.

use repostats_core::{ConfigError, FetchError, PackagingError};
use thiserror::Error;

use crate::stage::RunState;

/// Errors raised while committing the archive to the publish target.
#[derive(Error, Debug)]
pub enum PublishError {
    /// A git command exited non-zero.
    #[error("git {op} failed (exit code {exit_code}): {message}")]
    Git {
        op: &'static str,
        exit_code: i32,
        message: String,
    },

    /// git could not be started.
    #[error("could not run git {op}: {message}")]
    Spawn { op: &'static str, message: String },

    /// A git command exceeded its timeout.
    #[error("git {op} timed out after {secs} seconds")]
    Timeout { op: &'static str, secs: u64 },

    /// The remote refused the push, typically because another run pushed first.
    #[error("push to {branch} rejected: {message}")]
    PushRejected { branch: String, message: String },

    /// No identity override and the branch has no commit to borrow one from.
    #[error("no commit identity: branch {0} has no commits and no identity was configured")]
    NoCommitIdentity(String),

    /// The destination already holds an archive with this name.
    #[error("archive already published: {0}")]
    ArchiveExists(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A run failure, tagged with the stage it happened in.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),

    /// The scratch directory could not be created.
    #[error("scratch directory error: {0}")]
    Scratch(std::io::Error),

    #[error("invalid state transition {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

impl PipelineError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config(_) | PipelineError::Scratch(_) => "setup",
            PipelineError::Fetch(_) => "fetching",
            PipelineError::Packaging(_) => "archiving",
            PipelineError::Publish(_) => "publishing",
            PipelineError::InvalidTransition { from, .. } => from.name(),
        }
    }
}
