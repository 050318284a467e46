use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::config::Config;
use crate::error::Error;
use crate::error::Result;

/// Matches the browse path of a repository, e.g. `/projects/TEAM/repos/svc/browse`.
static BROWSE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/projects/([^/]+)/repos/([^/]+)").unwrap());

/// The `{host, project, repo}` triple addressing a repository on a Bitbucket Server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryIdentity {
    /// Host name, including the port when one was given.
    pub host: String,
    /// Project key.
    pub project: String,
    /// Repository slug.
    pub repo: String,
}

impl Display for RepositoryIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.project, self.repo)
    }
}

/// Parse a repository location into an identity.
///
/// Two shapes are accepted:
///
/// - `host?project=KEY&repo=slug`
/// - `https://host/projects/KEY/repos/slug`, optionally followed by more path
///
/// The host must have an integration configured.
pub fn parse_repo_url(location: &str, config: &Config) -> Result<RepositoryIdentity> {
    let invalid = |reason: &str| Error::InvalidLocation {
        location: location.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(invalid("location is empty"));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };
    let url = Url::parse(&with_scheme).map_err(|e| invalid(&e.to_string()))?;

    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(invalid("missing host")),
    };

    let query_value = |key: &str| {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    };

    let (project, repo) = match query_value("project") {
        Some(project) => (project, query_value("repo")),
        None => match BROWSE_PATH_RE.captures(url.path()) {
            Some(captures) => (
                captures[1].to_string(),
                Some(captures[2].to_string()),
            ),
            None => (String::new(), query_value("repo")),
        },
    };

    if project.trim().is_empty() {
        return Err(invalid("missing project"));
    }
    let repo = match repo {
        Some(repo) if !repo.trim().is_empty() => repo,
        _ => return Err(invalid("missing repo")),
    };

    for (what, value) in [("project", &project), ("repo", &repo)] {
        if !is_path_safe(value) {
            return Err(invalid(&format!("{} '{}' is not a valid key or slug", what, value)));
        }
    }

    if config.integration(&host).is_none() {
        return Err(Error::NoIntegration { host });
    }

    Ok(RepositoryIdentity {
        host,
        project,
        repo,
    })
}

/// Project keys and slugs become single URL path segments, so they may not
/// carry separators, escapes or dot segments.
fn is_path_safe(value: &str) -> bool {
    !value.contains(['/', '\\', '?', '#', '%']) && !value.contains("..") && value != "."
}
