//! repostats CI - run orchestration and publishing
//!
//! Provides the run orchestrator that:
//! - Fetches the four traffic reports into a scratch directory
//! - Packages them into the run archive
//! - Commits and pushes the archive to the publish target

pub mod error;
pub mod git;
pub mod pipeline;
pub mod publish;
pub mod runner;
pub mod stage;

// Re-export key types
pub use error::{PipelineError, PublishError};
pub use git::{authenticated_url, GitRepo};
pub use pipeline::{ReportSummary, RunOptions, RunOutcome, TrafficPipeline};
pub use publish::{default_commit_message, PublishReceipt, Publisher};
pub use runner::{CommandOutput, CommandRunner, CommandSpec};
pub use stage::{RunState, StateMachine};
