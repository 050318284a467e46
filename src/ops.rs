//! Integration layers for the two systems that `bbpub` drives:
//!
//! - [`bitbucket`]: Bitbucket Server REST calls (repositories, LFS, default reviewers, pull requests)
//! - [`bitbucket_http`]: Authenticated JSON transport underneath [`bitbucket`]
//! - [`git`]: Local git work (init, commit, push, clone, branch) behind the mockable [`git::GitOps`] trait

pub mod bitbucket;
pub mod bitbucket_http;
pub mod git;
