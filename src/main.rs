use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use bbpub::App;
use bbpub::Config;
use bbpub::DEFAULT_BRANCH;
use bbpub::PullRequestInput;
use bbpub::cancel::Cancellation;
use bbpub::commands::checkout::CheckoutOptions;
use bbpub::commands::publish::PublishOptions;
use bbpub::commands::pull_request::PullRequestOptions;
use bbpub::commands::push::PushOptions;
use bbpub::commands::write_outputs;
use bbpub::ops::bitbucket::RepoVisibility;
use bbpub::ops::git::RealGit;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "bbpub")]
#[command(about = "Publish generated content to Bitbucket Server and open pull requests", long_about = None)]
pub struct Cli {
    /// Config file (defaults to $BBPUB_CONFIG, then ./bbpub.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Give up after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Print outputs as a JSON object
    #[arg(long, global = true)]
    pub json: bool,
    /// Directory that source and target paths are relative to
    #[arg(long, global = true, default_value = ".")]
    pub workspace: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct RepoArgs {
    /// Repository location, e.g. host?project=KEY&repo=slug
    #[arg(long)]
    pub repo_url: String,
    /// Token used instead of the configured credentials
    #[arg(long, env = "BBPUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args)]
pub struct CommitArgs {
    /// Directory to commit, relative to the workspace
    #[arg(long)]
    pub source_path: Option<String>,
    #[arg(long)]
    pub commit_message: Option<String>,
    #[arg(long)]
    pub author_name: Option<String>,
    #[arg(long)]
    pub author_email: Option<String>,
}

#[derive(Args)]
pub struct PullRequestArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub source_branch: String,
    #[arg(long, default_value = DEFAULT_BRANCH)]
    pub target_branch: String,
    /// Reviewer username (repeatable)
    #[arg(long = "reviewer")]
    pub reviewers: Vec<String>,
}

impl From<PullRequestArgs> for PullRequestInput {
    fn from(args: PullRequestArgs) -> Self {
        Self {
            title: args.title,
            description: args.description,
            source_branch: args.source_branch,
            target_branch: args.target_branch,
            reviewers: args.reviewers,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a repository and push the workspace content to it
    Publish {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        commit: CommitArgs,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = RepoVisibility::Private)]
        visibility: RepoVisibility,
        #[arg(long, default_value = DEFAULT_BRANCH)]
        default_branch: String,
        /// Enable Git LFS on the repository
        #[arg(long)]
        enable_lfs: bool,
        /// Open a pull request with this title after pushing
        #[arg(long, requires = "pr_source_branch")]
        pr_title: Option<String>,
        #[arg(long, default_value = "")]
        pr_description: String,
        #[arg(long)]
        pr_source_branch: Option<String>,
        /// Defaults to the default branch
        #[arg(long)]
        pr_target_branch: Option<String>,
        /// Reviewer username (repeatable)
        #[arg(long = "pr-reviewer")]
        pr_reviewers: Vec<String>,
    },
    /// Commit the workspace content and push it to a branch of an existing repository
    Push {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        commit: CommitArgs,
        #[arg(long)]
        branch: String,
    },
    /// Clone an existing repository and switch to a new branch
    Checkout {
        #[command(flatten)]
        repo: RepoArgs,
        #[arg(long, default_value = DEFAULT_BRANCH)]
        base_branch: String,
        #[arg(long)]
        branch: String,
        /// Clone target relative to the workspace (defaults to the repository slug)
        #[arg(long)]
        target_path: Option<String>,
    },
    /// Open a pull request between two branches
    PullRequest {
        #[command(flatten)]
        repo: RepoArgs,
        #[command(flatten)]
        pull_request: PullRequestArgs,
    },
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config);
    let config = Config::load(&config_path)?;

    let (handle, mut cancel) = Cancellation::manual();
    if let Some(secs) = cli.timeout {
        cancel = cancel.with_timeout(Duration::from_secs(secs));
    }
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
        }
    });

    let workspace = std::path::absolute(&cli.workspace)
        .with_context(|| format!("Invalid workspace {}", cli.workspace.display()))?;
    let app = App::new(config, RealGit, workspace).with_cancellation(cancel);
    let mut stdout = std::io::stdout();
    // Progress goes to stderr so stdout carries only the outputs.
    let mut progress = std::io::stderr();

    match cli.command {
        Commands::Publish {
            repo,
            commit,
            description,
            visibility,
            default_branch,
            enable_lfs,
            pr_title,
            pr_description,
            pr_source_branch,
            pr_target_branch,
            pr_reviewers,
        } => {
            let pull_request = match (pr_title, pr_source_branch) {
                (Some(title), Some(source_branch)) => Some(PullRequestInput {
                    title,
                    description: pr_description,
                    source_branch,
                    target_branch: pr_target_branch.unwrap_or_else(|| default_branch.clone()),
                    reviewers: pr_reviewers,
                }),
                _ => None,
            };
            let options = PublishOptions {
                repo_url: repo.repo_url,
                description,
                visibility,
                default_branch,
                source_path: commit.source_path,
                enable_lfs,
                token: repo.token,
                commit_message: commit.commit_message,
                author_name: commit.author_name,
                author_email: commit.author_email,
                pull_request,
            };
            let result = app.cmd_publish(&options, &mut progress).await?;
            write_outputs(&result, cli.json, &mut stdout)?;
        }
        Commands::Push {
            repo,
            commit,
            branch,
        } => {
            let options = PushOptions {
                repo_url: repo.repo_url,
                branch,
                source_path: commit.source_path,
                token: repo.token,
                commit_message: commit.commit_message,
                author_name: commit.author_name,
                author_email: commit.author_email,
            };
            let result = app.cmd_push(&options, &mut progress).await?;
            write_outputs(&result, cli.json, &mut stdout)?;
        }
        Commands::Checkout {
            repo,
            base_branch,
            branch,
            target_path,
        } => {
            let options = CheckoutOptions {
                repo_url: repo.repo_url,
                base_branch,
                branch,
                target_path,
                token: repo.token,
            };
            let result = app.cmd_checkout(&options, &mut progress).await?;
            write_outputs(&result, cli.json, &mut stdout)?;
        }
        Commands::PullRequest { repo, pull_request } => {
            let options = PullRequestOptions {
                repo_url: repo.repo_url,
                token: repo.token,
                input: pull_request.into(),
            };
            let result = app.cmd_pull_request(&options, &mut progress).await?;
            write_outputs(&result, cli.json, &mut stdout)?;
        }
    }

    Ok(())
}
