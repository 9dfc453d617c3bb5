//! Resolve which issue a pull request closes.
//!
//! Resolution is tiered, cheapest first: closing keywords in the PR
//! body, then a looser "issue #N" mention, then a bare `#N`, then the
//! PR's timeline, and finally the PR's own number so every merged PR
//! still yields a row.

use std::sync::LazyLock;

use regex::Regex;

use crate::github::client::GitHubClient;
use crate::github::error::GitHubError;
use crate::github::pulls::find_timeline_issue;
use crate::github::types::{IssueReference, PullRequestRecord};

static CLOSING_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:closes|fixes|resolves|resolve)[\s\w.-]*#(\d+)")
        .unwrap_or_else(|e| unreachable!("closing keyword regex: {e}"))
});

static ISSUE_MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)issue[\s\w.-]*#(\d+)")
        .unwrap_or_else(|e| unreachable!("issue mention regex: {e}"))
});

static BARE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#(\d+)").unwrap_or_else(|e| unreachable!("bare ref regex: {e}"))
});

#[derive(Debug, Clone, Copy)]
pub struct LinkerConfig {
    /// A bare `#N` reference is only trusted when its digit run is
    /// shorter than this; longer runs are usually PR numbers from other
    /// repos or pasted IDs.
    pub bare_ref_max_digits: usize,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            bare_ref_max_digits: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IssueLinker {
    config: LinkerConfig,
}

impl IssueLinker {
    #[must_use]
    pub fn new(config: LinkerConfig) -> Self {
        Self { config }
    }

    /// Extract an issue number from a PR body, or `None` when the body
    /// carries no usable reference.
    #[must_use]
    pub fn find_in_body(&self, body: &str) -> Option<u64> {
        for pattern in [&*CLOSING_KEYWORD, &*ISSUE_MENTION] {
            if let Some(number) = first_capture(pattern, body) {
                return Some(number);
            }
        }

        // Bare references are only trusted at the first match; a long
        // digit run disqualifies the body entirely rather than falling
        // through to later matches.
        let capture = BARE_REF.captures(body)?;
        let digits = capture.get(1)?.as_str();
        if digits.len() >= self.config.bare_ref_max_digits {
            return None;
        }
        digits.parse().ok()
    }

    /// Resolve the issue a merged PR closes.
    ///
    /// `search_title` is the title reported by the search endpoint and
    /// is used for synthesized references.
    pub async fn resolve(
        &self,
        client: &GitHubClient,
        owner: &str,
        name: &str,
        pr: &PullRequestRecord,
        search_title: &str,
    ) -> Result<IssueReference, GitHubError> {
        if let Some(number) = self.find_in_body(pr.body.as_deref().unwrap_or_default()) {
            return Ok(IssueReference::synthesized(owner, name, number, search_title));
        }

        if let Some(mut issue) = find_timeline_issue(client, owner, name, pr.number).await? {
            if issue.url.is_empty() {
                issue.url = IssueReference::synthesized(owner, name, issue.number, "").url;
            }
            if issue.title.is_empty() {
                issue.title = search_title.to_string();
            }
            return Ok(issue);
        }

        Ok(IssueReference::synthesized(
            owner,
            name,
            pr.number,
            search_title,
        ))
    }
}

fn first_capture(pattern: &Regex, body: &str) -> Option<u64> {
    pattern
        .captures(body)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
