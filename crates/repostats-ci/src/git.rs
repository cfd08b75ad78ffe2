//! Thin async wrapper over the `git` CLI for the publish target checkout.

use repostats_core::{ApiToken, CommitIdentity};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::PublishError;
use crate::runner::{CommandRunner, CommandSpec};

/// User name GitHub accepts alongside an installation or PAT token.
const TOKEN_USER: &str = "x-access-token";

/// Embed the token into an https remote URL.
///
/// Non-https URLs (local paths, `file://`, ssh) are returned unchanged, as are
/// URLs that already carry credentials.
pub fn authenticated_url(url: &str, token: &ApiToken) -> String {
    match url.strip_prefix("https://") {
        Some(rest) if !rest.split('/').next().unwrap_or("").contains('@') => {
            format!("https://{TOKEN_USER}:{}@{rest}", token.expose())
        }
        _ => url.to_string(),
    }
}

/// A working copy of the publish target.
#[derive(Debug)]
pub struct GitRepo {
    dir: PathBuf,
    timeout_secs: u64,
    token: ApiToken,
}

impl GitRepo {
    /// Clone a single branch of `url` into `dest`.
    pub async fn clone_branch(
        url: &str,
        branch: &str,
        dest: &Path,
        timeout_secs: u64,
        token: &ApiToken,
    ) -> Result<Self, PublishError> {
        let dest_str = dest.to_string_lossy().to_string();
        let args = [
            "clone",
            "--quiet",
            "--single-branch",
            "--branch",
            branch,
            "--",
            url,
            dest_str.as_str(),
        ];
        run_git(None, "clone", &args, timeout_secs, token).await?;

        Ok(GitRepo {
            dir: dest.to_path_buf(),
            timeout_secs,
            token: token.clone(),
        })
    }

    /// Open an existing working copy.
    pub fn open(dir: &Path, timeout_secs: u64, token: &ApiToken) -> Self {
        GitRepo {
            dir: dir.to_path_buf(),
            timeout_secs,
            token: token.clone(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    async fn git(&self, op: &'static str, args: &[&str]) -> Result<String, PublishError> {
        run_git(Some(&self.dir), op, args, self.timeout_secs, &self.token).await
    }

    /// Author name and email of the latest commit on the checked-out branch.
    pub async fn latest_author(&self) -> Result<Option<CommitIdentity>, PublishError> {
        let out = match self.git("log", &["log", "-1", "--format=%an%x00%ae"]).await {
            Ok(out) => out,
            Err(PublishError::Git { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let line = out.trim_end_matches(['\r', '\n']);
        Ok(line.split_once('\0').and_then(|(name, email)| {
            (!name.is_empty() && !email.is_empty()).then(|| CommitIdentity {
                name: name.to_string(),
                email: email.to_string(),
            })
        }))
    }

    /// Set `user.name` and `user.email` in the repository config.
    pub async fn configure_identity(&self, identity: &CommitIdentity) -> Result<(), PublishError> {
        self.git("config", &["config", "user.name", identity.name.as_str()])
            .await?;
        self.git("config", &["config", "user.email", identity.email.as_str()])
            .await?;
        Ok(())
    }

    /// Stage a path relative to the repository root.
    pub async fn add(&self, path: &str) -> Result<(), PublishError> {
        self.git("add", &["add", "--", path]).await.map(|_| ())
    }

    pub async fn commit(&self, message: &str) -> Result<(), PublishError> {
        self.git("commit", &["commit", "--quiet", "-m", message])
            .await
            .map(|_| ())
    }

    pub async fn head_sha(&self) -> Result<String, PublishError> {
        Ok(self
            .git("rev-parse", &["rev-parse", "HEAD"])
            .await?
            .trim()
            .to_string())
    }

    pub async fn set_remote_url(&self, remote: &str, url: &str) -> Result<(), PublishError> {
        self.git("remote", &["remote", "set-url", remote, url])
            .await
            .map(|_| ())
    }

    /// Push `HEAD` to `branch` on `remote`.
    ///
    /// Rejections from the remote (concurrent pushes) become
    /// [`PublishError::PushRejected`].
    pub async fn push(&self, remote: &str, branch: &str) -> Result<(), PublishError> {
        let refspec = format!("HEAD:refs/heads/{branch}");
        match self.git("push", &["push", "--quiet", remote, refspec.as_str()]).await {
            Err(PublishError::Git { message, .. }) if is_rejection(&message) => {
                Err(PublishError::PushRejected {
                    branch: branch.to_string(),
                    message,
                })
            }
            other => other.map(|_| ()),
        }
    }
}

fn is_rejection(stderr: &str) -> bool {
    ["[rejected]", "non-fast-forward", "fetch first", "[remote rejected]"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

async fn run_git(
    cwd: Option<&Path>,
    op: &'static str,
    args: &[&str],
    timeout_secs: u64,
    token: &ApiToken,
) -> Result<String, PublishError> {
    let mut command = vec!["git".to_string()];
    command.extend(args.iter().map(|a| a.to_string()));

    let mut spec = CommandSpec::new(op, command, timeout_secs)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C");
    if let Some(dir) = cwd {
        spec = spec.current_dir(dir);
    }

    debug!(op, "Running git");
    let output = CommandRunner::execute(&spec).await?;
    if !output.passed() {
        return Err(PublishError::Git {
            op,
            exit_code: output.exit_code,
            message: token.redact(output.stderr.trim()),
        });
    }
    Ok(output.stdout)
}
