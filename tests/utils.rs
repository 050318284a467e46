#![allow(dead_code)]

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;

use bbpub::ops::git::CommitId;
use bbpub::ops::git::GitOps;
use bbpub::ops::git::PushRequest;
use serde_json::Value;
use serde_json::json;
use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Creates a bare repository to act as the remote.
///
/// The directory should already exist.
pub async fn create_bare_repo(dir: &Path) -> anyhow::Result<()> {
    let status = Command::new("git")
        .args(["init", "--bare", "--quiet"])
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    anyhow::ensure!(status.success(), "git init --bare failed");

    Ok(())
}

/// Runs a git command and returns its trimmed stdout.
pub async fn git_output(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await?;
    anyhow::ensure!(output.status.success(), "git {:?} failed", args);

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Repository JSON as Bitbucket Server returns it, with the HTTP clone link
/// pointing at `clone_href`.
pub fn repository_json(base: &str, project: &str, repo: &str, id: u64, clone_href: &str) -> Value {
    json!({
        "id": id,
        "slug": repo,
        "name": repo,
        "project": {"key": project},
        "links": {
            "clone": [{"href": clone_href, "name": "http"}],
            "self": [{"href": format!("{}/projects/{}/repos/{}/browse", base, project, repo)}]
        }
    })
}

/// Pull request JSON as Bitbucket Server returns it.
pub fn pull_request_json(base: &str, project: &str, repo: &str, id: u64, clone_href: &str) -> Value {
    json!({
        "id": id,
        "fromRef": {"repository": repository_json(base, project, repo, 1, clone_href)},
        "links": {
            "self": [{"href": format!("{}/projects/{}/repos/{}/pull-requests/{}", base, project, repo, id)}]
        }
    })
}

/// A [`GitOps`] that records each call instead of running git.
#[derive(Default)]
pub struct RecordingGit {
    calls: Mutex<Vec<String>>,
}

impl RecordingGit {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl GitOps for RecordingGit {
    async fn commit_and_push(&self, request: &PushRequest) -> anyhow::Result<Option<CommitId>> {
        self.record(format!(
            "commit_and_push {} -> {} ({}) \"{}\" by {} <{}>",
            request.dir.display(),
            request.branch,
            request.authorization,
            request.message,
            request.author.name,
            request.author.email,
        ));
        Ok(Some(CommitId("0123456789abcdef0123456789abcdef01234567".to_string())))
    }

    async fn clone_branch(
        &self,
        _url: &str,
        dir: &Path,
        branch: &str,
        _authorization: &str,
    ) -> anyhow::Result<()> {
        self.record(format!("clone_branch {} {}", branch, dir.display()));
        Ok(())
    }

    async fn create_branch(&self, _dir: &Path, branch: &str) -> anyhow::Result<()> {
        self.record(format!("create_branch {}", branch));
        Ok(())
    }

    async fn checkout(&self, _dir: &Path, branch: &str) -> anyhow::Result<()> {
        self.record(format!("checkout {}", branch));
        Ok(())
    }
}

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_test_writer()
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(std::path::PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}
