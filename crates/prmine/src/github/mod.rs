//! GitHub REST access layer: rate-limited client, wire types, repository
//! search, and pull-request endpoints.

pub mod client;
pub mod error;
pub mod pulls;
pub mod search;
pub mod types;

pub use client::{CheckpointFn, GitHubClient, RateLimitGate};
pub use error::GitHubError;
pub use search::{search_merged_prs, RepoSearch};
pub use types::{
    FileChange, IssueReference, IssueSearchItem, PullRequestRecord, RepositoryDescriptor,
};
