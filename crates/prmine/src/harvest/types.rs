//! Options, output rows, and run accounting for a harvest.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::github::types::{IssueReference, PullRequestRecord, RepositoryDescriptor};

/// Everything a harvest run can be tuned with. Field defaults mirror
/// the CLI defaults.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Output CSV path.
    pub out_path: PathBuf,
    /// Restrict the search to a single `owner/name` repository.
    pub repo_filter: Option<String>,
    pub min_stars: u64,
    /// Repositories strictly larger than this are skipped.
    pub max_repo_mb: f64,
    pub min_files: u64,
    pub max_files: u64,
    pub min_lines: u64,
    pub max_lines: u64,
    /// Upper bound on candidate repositories scanned.
    pub max_repos: usize,
    /// Soft cap on collected rows: submission of new repositories stops
    /// once reached, but in-flight repositories finish and their rows
    /// are kept.
    pub max_rows: usize,
    /// Flush buffered rows every N newly collected rows.
    pub checkpoint_every: usize,
    /// Measure size by cloning instead of trusting the reported figure.
    pub verify_clone_size: bool,
    /// Concurrent repository workers.
    pub workers: usize,
    pub no_cache: bool,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    /// Only consider PRs created within this many days; 0 disables the
    /// cutoff.
    pub max_age_days: u32,
    /// Maximum PR-search pages fetched per repository.
    pub search_page_cap: u32,
    pub bare_ref_max_digits: usize,
    pub max_rate_limit_retries: u32,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            out_path: PathBuf::from("harvest.csv"),
            repo_filter: None,
            min_stars: 50,
            max_repo_mb: 199.9,
            min_files: 5,
            max_files: 999_999,
            min_lines: 200,
            max_lines: 999_999,
            max_repos: 1000,
            max_rows: 500,
            checkpoint_every: 20,
            verify_clone_size: false,
            workers: 1,
            no_cache: false,
            cache_dir: PathBuf::from(".cache"),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            max_age_days: 30,
            search_page_cap: 10,
            bare_ref_max_digits: 7,
            max_rate_limit_retries: 5,
        }
    }
}

/// One harvested issue/PR pair. Field order is the CSV column order.
#[derive(Debug, Clone, Serialize)]
pub struct HarvestRow {
    pub repo: String,
    pub stars: u64,
    pub repo_size_mb: f64,
    pub issue_number: u64,
    pub issue_title: String,
    pub issue_url: String,
    pub pr_number: u64,
    pub pr_url: String,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub base_sha: String,
    pub clone_command: String,
}

impl HarvestRow {
    pub fn new(
        repo: &RepositoryDescriptor,
        size_mb: f64,
        issue: &IssueReference,
        pr: &PullRequestRecord,
    ) -> Self {
        Self {
            repo: repo.full_name(),
            stars: repo.stars,
            repo_size_mb: (size_mb * 100.0).round() / 100.0,
            issue_number: issue.number,
            issue_title: issue.title.clone(),
            issue_url: issue.url.clone(),
            pr_number: pr.number,
            pr_url: pr.html_url.clone(),
            merged_at: pr.merged_at,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            base_sha: pr.base.sha.clone(),
            clone_command: format!(
                "git clone https://github.com/{}/{}.git && cd {} && git checkout {}",
                repo.owner, repo.name, repo.name, pr.base.sha
            ),
        }
    }
}

/// Mutable in-memory run state shared between the orchestrator and the
/// checkpoint callback.
#[derive(Debug, Default)]
pub struct HarvestState {
    pub rows: Vec<HarvestRow>,
    pub issues_checked: usize,
    pub prs_checked: usize,
    /// Number of rows already written to the sink.
    pub last_saved_index: usize,
}

/// Final accounting returned from a harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    pub rows_saved: usize,
    pub issues_checked: usize,
    pub prs_checked: usize,
    pub repos_scanned: usize,
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_knobs() {
        let options = HarvestOptions::default();
        assert_eq!(options.min_stars, 50);
        assert_eq!(options.max_repo_mb, 199.9);
        assert_eq!(options.min_files, 5);
        assert_eq!(options.min_lines, 200);
        assert_eq!(options.max_rows, 500);
        assert_eq!(options.checkpoint_every, 20);
        assert_eq!(options.workers, 1);
        assert_eq!(options.cache_ttl, Duration::from_secs(86_400));
        assert_eq!(options.max_age_days, 30);
        assert_eq!(options.search_page_cap, 10);
    }

    #[test]
    fn row_rounds_size_and_builds_the_clone_command() {
        let repo = RepositoryDescriptor {
            owner: "org".to_string(),
            name: "alpha".to_string(),
            stars: 900,
            size_kb: 3000,
            clone_url: "https://github.com/org/alpha.git".to_string(),
        };
        let issue = IssueReference::synthesized("org", "alpha", 7, "Retry bug");
        let pr: PullRequestRecord = serde_json::from_str(
            r#"{"number": 8, "additions": 100, "deletions": 50, "changed_files": 6,
                "merged_at": "2026-01-02T03:04:05Z",
                "html_url": "https://github.com/org/alpha/pull/8",
                "base": {"sha": "abc123"}}"#,
        )
        .unwrap();

        let row = HarvestRow::new(&repo, 3000.0 / 1024.0, &issue, &pr);

        assert_eq!(row.repo, "org/alpha");
        assert_eq!(row.repo_size_mb, 2.93);
        assert_eq!(row.issue_number, 7);
        assert_eq!(row.pr_number, 8);
        assert_eq!(
            row.clone_command,
            "git clone https://github.com/org/alpha.git && cd alpha && git checkout abc123"
        );
    }
}
