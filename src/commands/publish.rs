use serde::Serialize;
use tracing::instrument;

use crate::App;
use crate::app::PullRequestInput;
use crate::error::Result;
use crate::ops::bitbucket::CreateRepositoryOptions;
use crate::ops::bitbucket::RepoVisibility;
use crate::ops::bitbucket::RepositoryOutcome;
use crate::ops::git::GitOps;
use crate::ops::git::PushRequest;
use crate::workspace::resolve_safe_child_path;

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub repo_url: String,
    pub description: Option<String>,
    pub visibility: RepoVisibility,
    pub default_branch: String,
    /// Directory to publish, relative to the workspace.
    pub source_path: Option<String>,
    pub enable_lfs: bool,
    pub token: Option<String>,
    pub commit_message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    /// Open a pull request once the content is pushed.
    pub pull_request: Option<PullRequestInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub remote_url: String,
    pub repo_contents_url: String,
    pub repository_id: String,
    #[serde(serialize_with = "serialize_outcome")]
    pub repository: RepositoryOutcome,
    pub commit_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
}

fn serialize_outcome<S: serde::Serializer>(
    outcome: &RepositoryOutcome,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(outcome)
}

impl<G: GitOps> App<G> {
    /// Publish workspace content to a new (or existing) repository.
    ///
    /// 1. Create the repository; a name conflict reuses the existing one.
    /// 2. Optionally enable LFS on it.
    /// 3. Commit the source directory and push it to the default branch.
    /// 4. Optionally push the same content to the pull request's source
    ///    branch and open a pull request from it.
    ///
    /// Nothing is rolled back when a later step fails.
    #[instrument(skip_all, fields(repo_url = %options.repo_url))]
    pub async fn cmd_publish(
        &self,
        options: &PublishOptions,
        stdout: &mut impl std::io::Write,
    ) -> Result<PublishResult> {
        let connection = self.connect(&options.repo_url, options.token.as_deref())?;
        let source_dir = resolve_safe_child_path(&self.workspace, options.source_path.as_deref())?;

        let create_options = CreateRepositoryOptions {
            description: options.description.clone(),
            default_branch: options.default_branch.clone(),
            visibility: options.visibility,
        };
        let ensured = self
            .step(
                "repository creation",
                connection
                    .client
                    .ensure(&connection.identity, &create_options),
            )
            .await?;
        let record = ensured.record;
        match ensured.outcome {
            RepositoryOutcome::Created => {
                writeln!(stdout, "Created repository {}", connection.identity)?
            }
            RepositoryOutcome::Reused => writeln!(
                stdout,
                "Repository {} already exists, reusing it",
                connection.identity
            )?,
        }

        if options.enable_lfs {
            self.step(
                "LFS enablement",
                connection
                    .client
                    .enable_large_file_storage(&connection.identity),
            )
            .await?;
            writeln!(stdout, "Enabled LFS for {}", connection.identity)?;
        }

        let request = PushRequest {
            dir: source_dir,
            remote_url: record.remote_url.clone(),
            authorization: connection.auth.authorization_header_value().to_string(),
            branch: options.default_branch.clone(),
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
            Some(commit) => writeln!(
                stdout,
                "Pushed commit {} to {}",
                commit, options.default_branch
            )?,
            None => writeln!(stdout, "No changes to commit")?,
        }

        let pull_request_url = match &options.pull_request {
            Some(input) => {
                // The source branch starts out at the published content.
                if input.source_branch != options.default_branch {
                    let request = PushRequest {
                        branch: input.source_branch.clone(),
                        ..request
                    };
                    self.git_step("source branch push", self.git.commit_and_push(&request))
                        .await?;
                    writeln!(stdout, "Pushed {}", input.source_branch)?;
                }
                let pr = self.open_pull_request(&connection, &record, input).await?;
                writeln!(stdout, "Created pull request {}", pr.pull_request_url)?;
                Some(pr.pull_request_url)
            }
            None => None,
        };

        Ok(PublishResult {
            remote_url: record.remote_url,
            repo_contents_url: record.repo_contents_url,
            repository_id: record.repository_id,
            repository: ensured.outcome,
            commit_hash: commit.map(|c| c.0),
            pull_request_url,
        })
    }
}
