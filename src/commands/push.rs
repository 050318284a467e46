use serde::Serialize;
use tracing::instrument;

use crate::App;
use crate::error::Result;
use crate::ops::git::GitOps;
use crate::ops::git::PushRequest;
use crate::workspace::resolve_safe_child_path;

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub repo_url: String,
    pub branch: String,
    /// Directory to push, relative to the workspace.
    pub source_path: Option<String>,
    pub token: Option<String>,
    pub commit_message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResult {
    pub remote_url: String,
    pub commit_hash: Option<String>,
}

impl<G: GitOps> App<G> {
    /// Commit workspace content and push it to a branch of an existing repository.
    #[instrument(skip_all, fields(repo_url = %options.repo_url, branch = %options.branch))]
    pub async fn cmd_push(
        &self,
        options: &PushOptions,
        stdout: &mut impl std::io::Write,
    ) -> Result<PushResult> {
        let connection = self.connect(&options.repo_url, options.token.as_deref())?;
        let source_dir = resolve_safe_child_path(&self.workspace, options.source_path.as_deref())?;

        let record = self
            .step(
                "repository lookup",
                connection.client.lookup(&connection.identity),
            )
            .await?;

        let request = PushRequest {
            dir: source_dir,
            remote_url: record.remote_url.clone(),
            authorization: connection.auth.authorization_header_value().to_string(),
            branch: options.branch.clone(),
            message: self.commit_message(options.commit_message.as_deref()),
            author: self.commit_author(
                options.author_name.as_deref(),
                options.author_email.as_deref(),
            ),
        };
        let commit = self
            .git_step("commit and push", self.git.commit_and_push(&request))
            .await?;
        match &commit {
            Some(commit) => writeln!(stdout, "Pushed commit {} to {}", commit, options.branch)?,
            None => writeln!(stdout, "No changes to commit")?,
        }

        Ok(PushResult {
            remote_url: record.remote_url,
            commit_hash: commit.map(|c| c.0),
        })
    }
}
