//! Commit the run archive into the publish target.

use repostats_core::{obs, ApiToken, Archive, CommitIdentity, PublishTarget};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::PublishError;
use crate::git::{authenticated_url, GitRepo};

/// What a successful publish produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Commit that added the archive.
    pub commit_sha: String,

    /// Branch the commit was pushed to.
    pub branch: String,

    /// Archive path relative to the repository root.
    pub path_in_repo: String,

    /// Identity the commit was made with.
    pub identity: CommitIdentity,
}

/// Default commit message for an archive.
pub fn default_commit_message(archive_name: &str) -> String {
    format!("Add traffic statistics {archive_name}")
}

/// Clones the target, moves the archive in, commits and pushes.
pub struct Publisher<'a> {
    target: &'a PublishTarget,
    token: &'a ApiToken,
}

impl<'a> Publisher<'a> {
    pub fn new(target: &'a PublishTarget, token: &'a ApiToken) -> Self {
        Publisher { target, token }
    }

    /// Publish `archive`, using `scratch` for the checkout.
    ///
    /// The archive file is moved out of its current location. Nothing is
    /// retried; the first failing git step ends the publish.
    pub async fn publish(
        &self,
        archive: &Archive,
        scratch: &Path,
    ) -> Result<PublishReceipt, PublishError> {
        let target = self.target;
        let remote_url = authenticated_url(&target.url, self.token);
        let checkout = scratch.join("publish");

        info!(branch = %target.branch, "Cloning publish target");
        let repo = GitRepo::clone_branch(
            &remote_url,
            &target.branch,
            &checkout,
            target.git_timeout_secs,
            self.token,
        )
        .await?;

        let identity = match &target.identity {
            Some(identity) => identity.clone(),
            None => repo
                .latest_author()
                .await?
                .ok_or_else(|| PublishError::NoCommitIdentity(target.branch.clone()))?,
        };
        repo.configure_identity(&identity).await?;

        let path_in_repo = format!("{}/{}", target.directory, archive.name);
        let dest = checkout.join(&target.directory).join(&archive.name);
        if tokio::fs::try_exists(&dest).await? {
            return Err(PublishError::ArchiveExists(path_in_repo));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        move_file(&archive.path, &dest).await?;
        debug!(dest = %dest.display(), "Archive moved into checkout");

        let message = target
            .commit_message
            .clone()
            .unwrap_or_else(|| default_commit_message(&archive.name));
        repo.add(&path_in_repo).await?;
        repo.commit(&message).await?;
        let commit_sha = repo.head_sha().await?;

        repo.set_remote_url("origin", &remote_url).await?;
        repo.push("origin", &target.branch).await?;

        obs::emit_publish_committed(&target.branch, &path_in_repo, &commit_sha);
        Ok(PublishReceipt {
            commit_sha,
            branch: target.branch.clone(),
            path_in_repo,
            identity,
        })
    }
}

/// Rename, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), PublishError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
