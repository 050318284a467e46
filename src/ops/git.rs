#![allow(async_fn_in_trait)]

use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::instrument;

// -----------------------------------------------------------------------------
// GitOps trait

/// Version-control primitives the publish pipeline relies on
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Stage everything in `request.dir`, commit it and push `HEAD` to
    /// `request.branch` on `request.remote_url`.
    ///
    /// The directory is initialized as a repository when it is not one yet.
    /// Returns the new commit, or `None` when there was nothing to commit.
    async fn commit_and_push(&self, request: &PushRequest) -> Result<Option<CommitId>>;

    /// Clone `url` into `dir` with `branch` checked out.
    async fn clone_branch(
        &self,
        url: &str,
        dir: &Path,
        branch: &str,
        authorization: &str,
    ) -> Result<()>;

    /// Create a local branch at `HEAD`.
    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    async fn checkout(&self, dir: &Path, branch: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitId(pub String);

impl Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub dir: PathBuf,
    pub remote_url: String,
    /// Value for the `Authorization` header sent to the remote.
    pub authorization: String,
    pub branch: String,
    pub message: String,
    pub author: CommitAuthor,
}

impl std::fmt::Debug for PushRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRequest")
            .field("dir", &self.dir)
            .field("remote_url", &self.remote_url)
            .field("branch", &self.branch)
            .field("message", &self.message)
            .field("author", &self.author)
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI
pub struct RealGit;

impl RealGit {
    fn command(dir: &Path) -> Command {
        let mut command = Command::new("git");
        command.current_dir(dir);
        command
    }

    /// Pass the authorization header through git's environment config so it
    /// never shows up in the process arguments.
    fn with_authorization(command: &mut Command, authorization: &str) {
        command
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_CONFIG_COUNT", "1")
            .env("GIT_CONFIG_KEY_0", "http.extraHeader")
            .env("GIT_CONFIG_VALUE_0", format!("Authorization: {}", authorization));
    }

    /// Run git to completion. Dropping the returned future (on cancellation)
    /// kills git together with any transport helpers it spawned.
    async fn run(mut command: Command) -> Result<String> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().context("Failed to execute git command")?;
        let mut group = ProcessGroupGuard {
            pgid: child.id(),
        };
        let output = child
            .wait_with_output()
            .await
            .context("Failed to execute git command")?;
        group.disarm();

        if !output.status.success() {
            bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }

    async fn git(dir: &Path, args: &[&str]) -> Result<String> {
        let mut command = Self::command(dir);
        command.args(args);
        Self::run(command).await
    }

    async fn has_head(dir: &Path) -> bool {
        Self::git(dir, &["rev-parse", "--verify", "--quiet", "HEAD"])
            .await
            .is_ok()
    }
}

/// Kills a process group when dropped while still armed.
struct ProcessGroupGuard {
    pgid: Option<u32>,
}

impl ProcessGroupGuard {
    fn disarm(&mut self) {
        self.pgid = None;
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.and_then(|id| i32::try_from(id).ok()) {
            // SAFETY: killpg has no memory-safety preconditions.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}

impl GitOps for RealGit {
    #[instrument(skip_all, fields(dir = %request.dir.display(), branch = %request.branch))]
    async fn commit_and_push(&self, request: &PushRequest) -> Result<Option<CommitId>> {
        let dir = request.dir.as_path();

        if !dir.join(".git").exists() {
            Self::git(dir, &["init", "--quiet"]).await?;
            Self::git(
                dir,
                &["symbolic-ref", "HEAD", &format!("refs/heads/{}", request.branch)],
            )
            .await?;
        }

        Self::git(dir, &["add", "--all"]).await?;
        let status = Self::git(dir, &["status", "--porcelain"]).await?;

        let commit = if status.is_empty() {
            None
        } else {
            let name = format!("user.name={}", request.author.name);
            let email = format!("user.email={}", request.author.email);
            Self::git(
                dir,
                &[
                    "-c",
                    &name,
                    "-c",
                    &email,
                    "commit",
                    "--quiet",
                    "-m",
                    &request.message,
                ],
            )
            .await?;
            Some(CommitId(Self::git(dir, &["rev-parse", "HEAD"]).await?))
        };

        // An empty, never-committed repository has nothing to push.
        if !Self::has_head(dir).await {
            return Ok(None);
        }

        let refspec = format!("HEAD:refs/heads/{}", request.branch);
        let mut push = Self::command(dir);
        push.args(["push", "--quiet", &request.remote_url, &refspec]);
        Self::with_authorization(&mut push, &request.authorization);
        Self::run(push).await?;

        Ok(commit)
    }

    #[instrument(skip_all, fields(dir = %dir.display(), branch = %branch))]
    async fn clone_branch(
        &self,
        url: &str,
        dir: &Path,
        branch: &str,
        authorization: &str,
    ) -> Result<()> {
        let parent = dir
            .parent()
            .context("Clone target has no parent directory")?;
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create clone target parent")?;

        let mut command = Self::command(parent);
        command
            .args(["clone", "--quiet", "--branch", branch, url])
            .arg(dir);
        Self::with_authorization(&mut command, authorization);
        Self::run(command).await?;

        Ok(())
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn create_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        Self::git(dir, &["branch", branch]).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch = %branch))]
    async fn checkout(&self, dir: &Path, branch: &str) -> Result<()> {
        Self::git(dir, &["checkout", "--quiet", branch]).await?;
        Ok(())
    }
}
