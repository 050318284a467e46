//! Error types for the publish and pull request pipeline.

use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid repository location '{location}': {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("No Bitbucket Server integration configured for host '{host}'")]
    NoIntegration { host: String },

    #[error(
        "No credentials for Bitbucket Server host '{host}': configure a token or a username and password"
    )]
    MissingCredentials { host: String },

    #[error("Unable to get repository {repo}: {failure}")]
    RepositoryLookupFailed { repo: String, failure: HttpFailure },

    #[error("Unable to create repository {repo}: {failure}")]
    RepositoryCreateFailed { repo: String, failure: HttpFailure },

    #[error("Failed to enable LFS for repository {repo}: {failure}")]
    LfsEnableFailed { repo: String, failure: HttpFailure },

    #[error("Failed to retrieve default reviewers for {repo}: {failure}")]
    ReviewerLookupFailed { repo: String, failure: HttpFailure },

    #[error("Malformed default reviewers response for {repo}: {reason}: {body}")]
    ReviewerResponseMalformed {
        repo: String,
        reason: String,
        body: String,
    },

    #[error("Failed to create pull request in {repo}: {failure}")]
    PullRequestCreateFailed { repo: String, failure: HttpFailure },

    #[error("Pull request in {repo} created but the response is missing {missing}: {body}")]
    PullRequestResponseMalformed {
        repo: String,
        missing: &'static str,
        body: String,
    },

    #[error("Repository {repo} has no '{name}' link")]
    LinkNotFound { repo: String, name: &'static str },

    #[error("Unexpected response while {operation}: {reason}: {body}")]
    UnexpectedResponse {
        operation: &'static str,
        reason: String,
        body: String,
    },

    #[error("Path '{}' is outside of the workspace '{}'", .path.display(), .workspace.display())]
    UnsafePath { workspace: PathBuf, path: PathBuf },

    #[error("Cancelled during {step}: {reason}")]
    Cancelled {
        step: &'static str,
        reason: CancelReason,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Git(anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why an in-flight step was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    DeadlineExceeded,
    Requested,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Requested => f.write_str("cancellation requested"),
        }
    }
}

/// Diagnostic context for a failed HTTP exchange.
#[derive(Debug)]
pub enum HttpFailure {
    /// The server answered with an unexpected status.
    Status { status: StatusCode, body: String },
    /// The request never produced a response.
    Transport(String),
}

impl HttpFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for HttpFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => {
                let reason = status.canonical_reason().unwrap_or("Unknown");
                write!(f, "{} {}, {}", status.as_u16(), reason, body)
            }
            Self::Transport(message) => write!(f, "request failed: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_failure_display_includes_status_text_and_body() {
        let failure = HttpFailure::Status {
            status: StatusCode::NOT_FOUND,
            body: r#"{"errors":[{"message":"Repository svc does not exist."}]}"#.to_string(),
        };
        assert_eq!(
            failure.to_string(),
            r#"404 Not Found, {"errors":[{"message":"Repository svc does not exist."}]}"#
        );
        assert_eq!(failure.status(), Some(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_transport_failure_has_no_status() {
        let failure = HttpFailure::Transport("connection refused".to_string());
        assert_eq!(failure.to_string(), "request failed: connection refused");
        assert_eq!(failure.status(), None);
    }

    #[test]
    fn test_cancelled_display() {
        let err = Error::Cancelled {
            step: "repository lookup",
            reason: CancelReason::DeadlineExceeded,
        };
        assert_eq!(
            err.to_string(),
            "Cancelled during repository lookup: deadline exceeded"
        );
    }

    #[test]
    fn test_git_errors_are_propagated_verbatim() {
        let err = Error::Git(anyhow::anyhow!("git command failed: fatal: not a git repository"));
        assert_eq!(
            err.to_string(),
            "git command failed: fatal: not a git repository"
        );
    }
}
