use std::path::PathBuf;

use serde::Serialize;
use tracing::instrument;

use crate::App;
use crate::error::Result;
use crate::ops::git::GitOps;
use crate::workspace::resolve_safe_child_path;

#[derive(Debug, Clone)]
pub struct CheckoutOptions {
    pub repo_url: String,
    /// Branch to clone; the new branch starts from it.
    pub base_branch: String,
    pub branch: String,
    /// Clone target relative to the workspace. Defaults to the repository slug.
    pub target_path: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub remote_url: String,
    pub target_path: PathBuf,
    pub branch: String,
}

impl<G: GitOps> App<G> {
    /// Clone an existing repository and switch to a new branch off its base branch.
    #[instrument(skip_all, fields(repo_url = %options.repo_url, branch = %options.branch))]
    pub async fn cmd_checkout(
        &self,
        options: &CheckoutOptions,
        stdout: &mut impl std::io::Write,
    ) -> Result<CheckoutResult> {
        let connection = self.connect(&options.repo_url, options.token.as_deref())?;
        let relative = options
            .target_path
            .as_deref()
            .unwrap_or(connection.identity.repo.as_str());
        let target_path = resolve_safe_child_path(&self.workspace, Some(relative))?;

        let record = self
            .step(
                "repository lookup",
                connection.client.lookup(&connection.identity),
            )
            .await?;

        self.git_step(
            "clone",
            self.git.clone_branch(
                &record.remote_url,
                &target_path,
                &options.base_branch,
                connection.auth.authorization_header_value(),
            ),
        )
        .await?;
        writeln!(
            stdout,
            "Cloned {} ({}) into {}",
            connection.identity,
            options.base_branch,
            target_path.display()
        )?;

        self.git_step(
            "branch creation",
            self.git.create_branch(&target_path, &options.branch),
        )
        .await?;
        self.git_step("checkout", self.git.checkout(&target_path, &options.branch))
            .await?;
        writeln!(stdout, "Switched to new branch {}", options.branch)?;

        Ok(CheckoutResult {
            remote_url: record.remote_url,
            target_path,
            branch: options.branch.clone(),
        })
    }
}
