use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use tracing::instrument;

use crate::auth;
use crate::auth::AuthContext;
use crate::cancel::Cancellation;
use crate::config::Config;
use crate::error::Error;
use crate::error::Result;
use crate::locator;
use crate::locator::RepositoryIdentity;
use crate::ops::bitbucket::BitbucketClient;
use crate::ops::bitbucket::PullRequestResult;
use crate::ops::bitbucket::PullRequestSpec;
use crate::ops::bitbucket::RepositoryRecord;
use crate::ops::git::CommitAuthor;
use crate::ops::git::GitOps;
use crate::reviewers::merge_reviewers;

/// Branch used when the caller names none.
pub const DEFAULT_BRANCH: &str = "master";

pub struct App<G: GitOps> {
    pub config: Config,
    pub git: G,
    /// Directory that relative source and target paths are resolved against.
    pub workspace: PathBuf,
    pub cancel: Cancellation,
}

/// A located, authenticated repository and a client to reach it.
pub(crate) struct Connection {
    pub identity: RepositoryIdentity,
    pub auth: AuthContext,
    pub client: BitbucketClient,
}

/// Pull request parameters shared by the publish and pull request commands.
#[derive(Debug, Clone)]
pub struct PullRequestInput {
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    /// Usernames to add next to the server's default reviewers.
    pub reviewers: Vec<String>,
}

impl<G: GitOps> App<G> {
    pub fn new(config: Config, git: G, workspace: PathBuf) -> Self {
        Self {
            config,
            git,
            workspace,
            cancel: Cancellation::none(),
        }
    }

    pub fn with_cancellation(mut self, cancel: Cancellation) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Shared helper methods for App
impl<G: GitOps> App<G> {
    /// Locate the repository and resolve credentials. Makes no network calls.
    pub(crate) fn connect(&self, repo_url: &str, token: Option<&str>) -> Result<Connection> {
        let identity = locator::parse_repo_url(repo_url, &self.config)?;
        let integration =
            self.config
                .integration(&identity.host)
                .ok_or_else(|| Error::NoIntegration {
                    host: identity.host.clone(),
                })?;
        let auth = auth::resolve(integration, token)?;
        let timeout = self.config.request_timeout_secs.map(Duration::from_secs);
        let client = BitbucketClient::new(integration, &auth, timeout)?;

        Ok(Connection {
            identity,
            auth,
            client,
        })
    }

    /// Run a network step under the invocation's cancellation.
    pub(crate) async fn step<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        self.cancel.run(step, fut).await
    }

    /// Run a git step under the invocation's cancellation.
    pub(crate) async fn git_step<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T> {
        self.cancel
            .run(step, async move { fut.await.map_err(Error::Git) })
            .await
    }

    pub(crate) fn commit_author(&self, name: Option<&str>, email: Option<&str>) -> CommitAuthor {
        let defaults = &self.config.defaults;
        CommitAuthor {
            name: non_empty(name).unwrap_or(defaults.author_name.as_str()).to_string(),
            email: non_empty(email).unwrap_or(defaults.author_email.as_str()).to_string(),
        }
    }

    pub(crate) fn commit_message(&self, message: Option<&str>) -> String {
        non_empty(message)
            .unwrap_or(self.config.defaults.commit_message.as_str())
            .to_string()
    }

    /// Resolve reviewers and open a pull request against a looked-up repository.
    #[instrument(skip_all, fields(repo = %connection.identity))]
    pub(crate) async fn open_pull_request(
        &self,
        connection: &Connection,
        record: &RepositoryRecord,
        input: &PullRequestInput,
    ) -> Result<PullRequestResult> {
        let required = self
            .step(
                "default reviewer lookup",
                connection.client.fetch_required_reviewers(
                    &connection.identity,
                    &record.repository_id,
                    &input.source_branch,
                    &record.repository_id,
                    &input.target_branch,
                ),
            )
            .await?;

        let spec = PullRequestSpec {
            title: input.title.clone(),
            description: input.description.clone(),
            source_branch: input.source_branch.clone(),
            target_branch: input.target_branch.clone(),
            reviewers: merge_reviewers(&input.reviewers, required),
        };

        self.step(
            "pull request creation",
            connection
                .client
                .create_pull_request(&connection.identity, &spec),
        )
        .await
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
