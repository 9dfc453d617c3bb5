//! Search endpoints: candidate repositories and linked merged PRs.

use std::collections::VecDeque;

use chrono::{Duration, Utc};

use crate::github::client::GitHubClient;
use crate::github::error::GitHubError;
use crate::github::types::{IssueSearchItem, IssueSearchPage, RepoSearchPage, RepositoryDescriptor};

pub(crate) const REPO_SEARCH_PATH: &str = "/search/repositories";
pub(crate) const ISSUE_SEARCH_PATH: &str = "/search/issues";

/// Search results come in pages of this size; a shorter page means the
/// result set is exhausted.
const PER_PAGE: usize = 100;

/// Target language for candidate repositories.
const LANGUAGE: &str = "Python";

pub(crate) fn repo_search_params(
    min_stars: u64,
    repo_filter: Option<&str>,
    page: u32,
) -> Vec<(String, String)> {
    let mut q = format!("language:{LANGUAGE} stars:>={min_stars} fork:false archived:false");
    if let Some(full_name) = repo_filter {
        q.push_str(&format!(" repo:{full_name}"));
    }
    vec![
        ("q".to_string(), q),
        ("sort".to_string(), "stars".to_string()),
        ("order".to_string(), "desc".to_string()),
        ("per_page".to_string(), PER_PAGE.to_string()),
        ("page".to_string(), page.to_string()),
    ]
}

pub(crate) fn pr_search_params(
    owner: &str,
    name: &str,
    max_age_days: u32,
    page: u32,
) -> Vec<(String, String)> {
    let mut q = format!("repo:{owner}/{name} is:pr is:merged linked:issue");
    if max_age_days > 0 {
        let cutoff = (Utc::now() - Duration::days(i64::from(max_age_days))).format("%Y-%m-%d");
        q.push_str(&format!(" created:>{cutoff}"));
    }
    vec![
        ("q".to_string(), q),
        ("sort".to_string(), "updated".to_string()),
        ("order".to_string(), "desc".to_string()),
        ("per_page".to_string(), PER_PAGE.to_string()),
        ("page".to_string(), page.to_string()),
    ]
}

/// Lazily paginated stream of candidate repositories, most-starred
/// first. Always starts at page 1; resumption is handled downstream by
/// the deduplicating sink, not here.
pub struct RepoSearch {
    client: GitHubClient,
    min_stars: u64,
    max_repos: usize,
    repo_filter: Option<String>,
    buffer: VecDeque<RepositoryDescriptor>,
    next_page: u32,
    yielded: usize,
    exhausted: bool,
}

impl RepoSearch {
    pub fn new(
        client: &GitHubClient,
        min_stars: u64,
        max_repos: usize,
        repo_filter: Option<String>,
    ) -> Self {
        Self {
            client: client.clone(),
            min_stars,
            max_repos,
            repo_filter,
            buffer: VecDeque::new(),
            next_page: 1,
            yielded: 0,
            exhausted: false,
        }
    }

    /// Yield the next candidate, fetching another page when the buffer
    /// runs dry. `None` once the search is exhausted or `max_repos`
    /// candidates have been yielded.
    pub async fn next(&mut self) -> Result<Option<RepositoryDescriptor>, GitHubError> {
        if self.yielded >= self.max_repos {
            return Ok(None);
        }

        if self.buffer.is_empty() && !self.exhausted {
            let params =
                repo_search_params(self.min_stars, self.repo_filter.as_deref(), self.next_page);
            let page: Option<RepoSearchPage> =
                self.client.get_json(REPO_SEARCH_PATH, &params).await?;

            match page {
                Some(page) if !page.items.is_empty() => {
                    if page.items.len() < PER_PAGE {
                        self.exhausted = true;
                    }
                    self.next_page += 1;
                    self.buffer
                        .extend(page.items.into_iter().map(RepositoryDescriptor::from));
                }
                _ => self.exhausted = true,
            }
        }

        match self.buffer.pop_front() {
            Some(repo) => {
                self.yielded += 1;
                Ok(Some(repo))
            }
            None => Ok(None),
        }
    }
}

/// List merged PRs linked to an issue in `owner/name`, newest activity
/// first, up to `page_cap` pages.
pub async fn search_merged_prs(
    client: &GitHubClient,
    owner: &str,
    name: &str,
    max_age_days: u32,
    page_cap: u32,
) -> Result<Vec<IssueSearchItem>, GitHubError> {
    let mut items = Vec::new();

    for page in 1..=page_cap {
        let params = pr_search_params(owner, name, max_age_days, page);
        let result: Option<IssueSearchPage> =
            client.get_json(ISSUE_SEARCH_PATH, &params).await?;

        match result {
            Some(page) if !page.items.is_empty() => {
                let short = page.items.len() < PER_PAGE;
                items.extend(page.items);
                if short {
                    break;
                }
            }
            _ => break,
        }
    }

    Ok(items)
}
