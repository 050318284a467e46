use serde::Serialize;
use tracing::instrument;

use crate::App;
use crate::app::PullRequestInput;
use crate::error::Result;
use crate::ops::git::GitOps;

#[derive(Debug, Clone)]
pub struct PullRequestOptions {
    pub repo_url: String,
    pub token: Option<String>,
    pub input: PullRequestInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestOutput {
    pub remote_url: String,
    pub pull_request_url: String,
}

impl<G: GitOps> App<G> {
    /// Open a pull request between two branches of an existing repository.
    ///
    /// The server's default reviewers for the branch pair are always added;
    /// requested reviewers are appended after them.
    #[instrument(skip_all, fields(repo_url = %options.repo_url))]
    pub async fn cmd_pull_request(
        &self,
        options: &PullRequestOptions,
        stdout: &mut impl std::io::Write,
    ) -> Result<PullRequestOutput> {
        let connection = self.connect(&options.repo_url, options.token.as_deref())?;

        let record = self
            .step(
                "repository lookup",
                connection.client.lookup(&connection.identity),
            )
            .await?;
        let pr = self
            .open_pull_request(&connection, &record, &options.input)
            .await?;
        writeln!(
            stdout,
            "Created pull request {} -> {}: {}",
            options.input.source_branch, options.input.target_branch, pr.pull_request_url
        )?;

        Ok(PullRequestOutput {
            remote_url: pr.remote_url,
            pull_request_url: pr.pull_request_url,
        })
    }
}
