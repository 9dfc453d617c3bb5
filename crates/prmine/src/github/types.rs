//! Wire types for the GitHub endpoints the harvester consumes.
//!
//! All of these are immutable snapshots of a single API response.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of `/search/repositories`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSearchPage {
    #[serde(default)]
    pub items: Vec<SearchRepo>,
}

/// A repository as returned by the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRepo {
    pub name: String,
    pub owner: RepoOwner,
    #[serde(default)]
    pub stargazers_count: u64,
    /// Forge-reported size in KB.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub clone_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// A candidate repository, immutable once fetched.
#[derive(Debug, Clone)]
pub struct RepositoryDescriptor {
    pub owner: String,
    pub name: String,
    pub stars: u64,
    /// Forge-reported size in KB.
    pub size_kb: u64,
    pub clone_url: String,
}

impl RepositoryDescriptor {
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl From<SearchRepo> for RepositoryDescriptor {
    fn from(repo: SearchRepo) -> Self {
        Self {
            owner: repo.owner.login,
            name: repo.name,
            stars: repo.stargazers_count,
            size_kb: repo.size,
            clone_url: repo.clone_url,
        }
    }
}

/// One page of `/search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSearchPage {
    #[serde(default)]
    pub items: Vec<IssueSearchItem>,
}

/// A merged-PR candidate from the issue search endpoint.
///
/// The search API reports pull requests through the issues schema, so
/// `number` here is the PR number.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSearchItem {
    pub number: u64,
    #[serde(default)]
    pub title: String,
}

/// Pull-request detail snapshot from one API call.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRecord {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    /// Merge timestamp; `None` means the PR was never merged. Any
    /// boolean "is merged" is derived from this, never stored.
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub base: BaseRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BaseRef {
    #[serde(default)]
    pub sha: String,
}

impl PullRequestRecord {
    /// Total changed lines (additions + deletions).
    #[must_use]
    pub fn total_lines(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A single changed file from `pulls/{n}/files`.
///
/// Used only to evaluate the documentation-only heuristic; never
/// persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct FileChange {
    #[serde(rename = "filename")]
    pub path: String,
    #[serde(default)]
    pub status: String,
}

/// A timeline event from `issues/{n}/timeline`.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub source: Option<TimelineSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineSource {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub issue: Option<TimelineIssue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineIssue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
}

/// The issue a pull request is understood to resolve.
///
/// May be synthesized (falling back to the PR's own number) when no
/// link can be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueReference {
    pub number: u64,
    pub title: String,
    pub url: String,
}

impl IssueReference {
    /// Synthesize a reference for an issue number discovered in a repo.
    #[must_use]
    pub fn synthesized(owner: &str, name: &str, number: u64, title: &str) -> Self {
        Self {
            number,
            title: title.to_string(),
            url: format!("https://github.com/{}/{}/issues/{}", owner, name, number),
        }
    }
}
