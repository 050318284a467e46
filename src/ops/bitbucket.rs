use std::time::Duration;

use log::warn;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;
use url::Url;

use super::bitbucket_http::BitbucketHttpClient;
use crate::auth::AuthContext;
use crate::config::IntegrationConfig;
use crate::error::Error;
use crate::error::Result;
use crate::locator::RepositoryIdentity;
use crate::reviewers::Reviewer;

// -----------------------------------------------------------------------------
// Types

/// Client for the Bitbucket Server repository, LFS, default reviewer and pull
/// request endpoints.
pub struct BitbucketClient {
    http: BitbucketHttpClient,
    api_base_url: String,
    rest_base_url: String,
}

/// Where a repository lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    /// HTTP clone URL.
    pub remote_url: String,
    /// Browsable URL of the repository.
    pub repo_contents_url: String,
    /// Numeric repository id, rendered as a string.
    pub repository_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RepoVisibility {
    #[default]
    Private,
    Public,
}

#[derive(Debug, Clone)]
pub struct CreateRepositoryOptions {
    pub description: Option<String>,
    pub default_branch: String,
    pub visibility: RepoVisibility,
}

/// Whether a repository was created by this invocation or already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOutcome {
    Created,
    Reused,
}

impl std::fmt::Display for RepositoryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Reused => f.write_str("reused"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredRepository {
    pub record: RepositoryRecord,
    pub outcome: RepositoryOutcome,
}

/// Everything needed to open a pull request, besides the repository.
#[derive(Debug, Clone)]
pub struct PullRequestSpec {
    pub title: String,
    pub description: String,
    pub source_branch: String,
    pub target_branch: String,
    pub reviewers: Vec<Reviewer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestResult {
    /// HTTP clone URL of the source repository.
    pub remote_url: String,
    pub pull_request_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRepository<'a> {
    name: &'a str,
    description: &'a str,
    default_branch: &'a str,
    public: bool,
}

#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    id: u64,
    #[serde(default)]
    links: RepositoryLinks,
}

#[derive(Debug, Default, Deserialize)]
struct RepositoryLinks {
    #[serde(default)]
    clone: Vec<NamedLink>,
    #[serde(rename = "self", default)]
    self_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct NamedLink {
    name: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePullRequest<'a> {
    title: &'a str,
    description: &'a str,
    reviewers: Vec<PullRequestReviewer<'a>>,
    from_ref: RefPayload<'a>,
    to_ref: RefPayload<'a>,
}

#[derive(Debug, Serialize)]
struct PullRequestReviewer<'a> {
    user: UserPayload<'a>,
}

#[derive(Debug, Serialize)]
struct UserPayload<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct RefPayload<'a> {
    id: String,
    repository: RefRepository<'a>,
}

#[derive(Debug, Serialize)]
struct RefRepository<'a> {
    slug: &'a str,
    project: ProjectKey<'a>,
}

#[derive(Debug, Serialize)]
struct ProjectKey<'a> {
    key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestResponse {
    #[serde(default)]
    from_ref: Option<RefResponse>,
    #[serde(default)]
    links: Option<PullRequestLinks>,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    #[serde(default)]
    repository: Option<RefRepositoryResponse>,
}

#[derive(Debug, Deserialize)]
struct RefRepositoryResponse {
    #[serde(default)]
    links: RepositoryLinks,
}

#[derive(Debug, Deserialize)]
struct PullRequestLinks {
    #[serde(rename = "self", default)]
    self_links: Vec<Link>,
}

/// Fully qualified ref name for a branch.
pub fn branch_ref(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

/// Append `segments` to `base`, percent-encoding each one as a single path segment.
fn endpoint(base: &str, segments: &[&str]) -> Result<String> {
    let invalid_base = |reason: String| Error::Config(format!("invalid base URL {}: {}", base, reason));
    let mut url = Url::parse(base).map_err(|e| invalid_base(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid_base("cannot hold a path".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.to_string())
}

/// Find the `href` of the link with the given name.
fn find_link<'a>(links: &'a [NamedLink], name: &str) -> Option<&'a str> {
    links
        .iter()
        .find(|link| link.name == name)
        .map(|link| link.href.as_str())
}

// -----------------------------------------------------------------------------
// BitbucketClient impl

impl BitbucketClient {
    pub fn new(
        integration: &IntegrationConfig,
        auth: &AuthContext,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        Ok(Self {
            http: BitbucketHttpClient::new(auth, timeout)?,
            api_base_url: integration.api_base_url(),
            rest_base_url: integration.rest_base_url(),
        })
    }

    fn repo_url(&self, identity: &RepositoryIdentity, extra: &[&str]) -> Result<String> {
        let mut segments: Vec<&str> = vec!["projects", &identity.project, "repos", &identity.repo];
        segments.extend_from_slice(extra);
        endpoint(&self.api_base_url, &segments)
    }

    /// Get an existing repository.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn lookup(&self, identity: &RepositoryIdentity) -> Result<RepositoryRecord> {
        let response = self
            .http
            .get(&self.repo_url(identity, &[])?, &[])
            .await
            .map_err(|failure| Error::RepositoryLookupFailed {
                repo: identity.to_string(),
                failure,
            })?;

        if response.status != StatusCode::OK {
            return Err(Error::RepositoryLookupFailed {
                repo: identity.to_string(),
                failure: response.into_failure(),
            });
        }

        parse_repository(identity, &response.body)
    }

    /// Create a repository, reusing an existing one with the same name.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn create(
        &self,
        identity: &RepositoryIdentity,
        options: &CreateRepositoryOptions,
    ) -> Result<RepositoryRecord> {
        Ok(self.ensure(identity, options).await?.record)
    }

    /// Like [`Self::create`], but also reports whether the repository was reused.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn ensure(
        &self,
        identity: &RepositoryIdentity,
        options: &CreateRepositoryOptions,
    ) -> Result<EnsuredRepository> {
        let url = endpoint(
            &self.api_base_url,
            &["projects", &identity.project, "repos"],
        )?;
        let body = CreateRepository {
            name: &identity.repo,
            description: options.description.as_deref().unwrap_or(""),
            default_branch: &options.default_branch,
            public: options.visibility == RepoVisibility::Public,
        };

        let response = self.http.post(&url, &body).await.map_err(|failure| {
            Error::RepositoryCreateFailed {
                repo: identity.to_string(),
                failure,
            }
        })?;

        match response.status {
            StatusCode::CREATED => Ok(EnsuredRepository {
                record: parse_repository(identity, &response.body)?,
                outcome: RepositoryOutcome::Created,
            }),
            StatusCode::CONFLICT => {
                warn!(
                    "Repository {} already exists, reusing it: {}",
                    identity, response.body
                );
                Ok(EnsuredRepository {
                    record: self.lookup(identity).await?,
                    outcome: RepositoryOutcome::Reused,
                })
            }
            _ => Err(Error::RepositoryCreateFailed {
                repo: identity.to_string(),
                failure: response.into_failure(),
            }),
        }
    }

    /// Turn on Git LFS for a repository.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn enable_large_file_storage(&self, identity: &RepositoryIdentity) -> Result<()> {
        let url = endpoint(
            &self.rest_base_url,
            &[
                "git-lfs",
                "admin",
                "projects",
                &identity.project,
                "repos",
                &identity.repo,
                "enabled",
            ],
        )?;

        let response = self
            .http
            .put(&url)
            .await
            .map_err(|failure| Error::LfsEnableFailed {
                repo: identity.to_string(),
                failure,
            })?;

        if !response.status.is_success() {
            return Err(Error::LfsEnableFailed {
                repo: identity.to_string(),
                failure: response.into_failure(),
            });
        }

        Ok(())
    }

    /// Get the reviewers the server mandates for merging `source_ref` into `target_ref`.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn fetch_required_reviewers(
        &self,
        identity: &RepositoryIdentity,
        source_repo_id: &str,
        source_ref: &str,
        target_repo_id: &str,
        target_ref: &str,
    ) -> Result<Vec<Reviewer>> {
        let url = endpoint(
            &self.rest_base_url,
            &[
                "default-reviewers",
                "1.0",
                "projects",
                &identity.project,
                "repos",
                &identity.repo,
                "reviewers",
            ],
        )?;
        let source_ref = branch_ref(source_ref);
        let target_ref = branch_ref(target_ref);
        let query = [
            ("sourceRepoId", source_repo_id),
            ("sourceRefId", source_ref.as_str()),
            ("targetRepoId", target_repo_id),
            ("targetRefId", target_ref.as_str()),
        ];

        let response = self.http.get(&url, &query).await.map_err(|failure| {
            Error::ReviewerLookupFailed {
                repo: identity.to_string(),
                failure,
            }
        })?;

        if response.status != StatusCode::OK {
            return Err(Error::ReviewerLookupFailed {
                repo: identity.to_string(),
                failure: response.into_failure(),
            });
        }

        let malformed = |reason: String| Error::ReviewerResponseMalformed {
            repo: identity.to_string(),
            reason,
            body: response.body.clone(),
        };
        let reviewers: Vec<Reviewer> =
            serde_json::from_str(&response.body).map_err(|e| malformed(e.to_string()))?;
        if reviewers.iter().any(|r| r.username.trim().is_empty()) {
            return Err(malformed("reviewer with an empty name".to_string()));
        }

        Ok(reviewers)
    }

    /// Open a pull request within a single repository.
    #[instrument(skip_all, fields(repo = %identity))]
    pub async fn create_pull_request(
        &self,
        identity: &RepositoryIdentity,
        spec: &PullRequestSpec,
    ) -> Result<PullRequestResult> {
        let url = self.repo_url(identity, &["pull-requests"])?;
        let ref_payload = |branch: &str| RefPayload {
            id: branch_ref(branch),
            repository: RefRepository {
                slug: &identity.repo,
                project: ProjectKey {
                    key: &identity.project,
                },
            },
        };
        let body = CreatePullRequest {
            title: &spec.title,
            description: &spec.description,
            reviewers: spec
                .reviewers
                .iter()
                .map(|r| PullRequestReviewer {
                    user: UserPayload { name: &r.username },
                })
                .collect(),
            from_ref: ref_payload(&spec.source_branch),
            to_ref: ref_payload(&spec.target_branch),
        };

        let response = self.http.post(&url, &body).await.map_err(|failure| {
            Error::PullRequestCreateFailed {
                repo: identity.to_string(),
                failure,
            }
        })?;

        if response.status != StatusCode::CREATED {
            return Err(Error::PullRequestCreateFailed {
                repo: identity.to_string(),
                failure: response.into_failure(),
            });
        }

        let malformed = |missing: &'static str| Error::PullRequestResponseMalformed {
            repo: identity.to_string(),
            missing,
            body: response.body.clone(),
        };
        let pr: PullRequestResponse =
            serde_json::from_str(&response.body).map_err(|_| malformed("a JSON body"))?;

        let remote_url = pr
            .from_ref
            .and_then(|r| r.repository)
            .and_then(|repo| find_link(&repo.links.clone, "http").map(str::to_string))
            .ok_or_else(|| malformed("fromRef.repository.links.clone[http]"))?;
        let pull_request_url = pr
            .links
            .and_then(|links| links.self_links.into_iter().next())
            .map(|link| link.href)
            .ok_or_else(|| malformed("links.self"))?;

        Ok(PullRequestResult {
            remote_url,
            pull_request_url,
        })
    }
}

fn parse_repository(identity: &RepositoryIdentity, body: &str) -> Result<RepositoryRecord> {
    let repository: RepositoryResponse =
        serde_json::from_str(body).map_err(|e| Error::UnexpectedResponse {
            operation: "reading repository details",
            reason: e.to_string(),
            body: body.to_string(),
        })?;

    let remote_url = find_link(&repository.links.clone, "http").ok_or_else(|| {
        Error::LinkNotFound {
            repo: identity.to_string(),
            name: "http",
        }
    })?;
    let repo_contents_url = repository
        .links
        .self_links
        .first()
        .map(|link| link.href.as_str())
        .ok_or_else(|| Error::LinkNotFound {
            repo: identity.to_string(),
            name: "self",
        })?;

    Ok(RepositoryRecord {
        remote_url: remote_url.to_string(),
        repo_contents_url: repo_contents_url.to_string(),
        repository_id: repository.id.to_string(),
    })
}
