pub mod auth;
pub mod cancel;
pub mod commands;
pub mod config;
pub mod error;
pub mod locator;
pub mod ops;
pub mod reviewers;
pub mod workspace;

mod app;

// Re-export the entry points
pub use app::App;
pub use app::DEFAULT_BRANCH;
pub use app::PullRequestInput;
pub use config::Config;
pub use error::Error;
pub use error::Result;

// Disable colors for all tests to get clean output
#[cfg(test)]
#[ctor::ctor]
fn init_tests() {
    colored::control::set_override(false);
}
