//! Pull-request detail endpoints: the PR record, its changed files,
//! and the issue timeline used as a linking fallback.

use crate::github::client::GitHubClient;
use crate::github::error::GitHubError;
use crate::github::types::{FileChange, IssueReference, PullRequestRecord, TimelineEvent};

const PER_PAGE: usize = 100;

fn page_params(page: u32) -> Vec<(String, String)> {
    vec![
        ("per_page".to_string(), PER_PAGE.to_string()),
        ("page".to_string(), page.to_string()),
    ]
}

/// Fetch one pull request. `Ok(None)` when the PR is gone or otherwise
/// unfetchable; callers skip it.
pub async fn get_pull(
    client: &GitHubClient,
    owner: &str,
    name: &str,
    number: u64,
) -> Result<Option<PullRequestRecord>, GitHubError> {
    client
        .get_json(&format!("/repos/{owner}/{name}/pulls/{number}"), &[])
        .await
}

/// List every changed file of a pull request, following pagination.
pub async fn list_files(
    client: &GitHubClient,
    owner: &str,
    name: &str,
    number: u64,
) -> Result<Vec<FileChange>, GitHubError> {
    let path = format!("/repos/{owner}/{name}/pulls/{number}/files");
    let mut files = Vec::new();

    for page in 1.. {
        let batch: Option<Vec<FileChange>> =
            client.get_json(&path, &page_params(page)).await?;
        match batch {
            Some(batch) if !batch.is_empty() => {
                let short = batch.len() < PER_PAGE;
                files.extend(batch);
                if short {
                    break;
                }
            }
            _ => break,
        }
    }

    Ok(files)
}

/// Walk a PR's timeline looking for the first cross-referenced issue.
///
/// Pull requests share the issues namespace, so the timeline lives
/// under `/issues/{number}/timeline`.
pub async fn find_timeline_issue(
    client: &GitHubClient,
    owner: &str,
    name: &str,
    number: u64,
) -> Result<Option<IssueReference>, GitHubError> {
    let path = format!("/repos/{owner}/{name}/issues/{number}/timeline");

    for page in 1.. {
        let batch: Option<Vec<TimelineEvent>> =
            client.get_json(&path, &page_params(page)).await?;
        let Some(batch) = batch else { break };
        if batch.is_empty() {
            break;
        }
        let short = batch.len() < PER_PAGE;

        for event in batch {
            if event.event != "cross-referenced" {
                continue;
            }
            let Some(source) = event.source else { continue };
            if source.kind.as_deref() != Some("issue") {
                continue;
            }
            if let Some(issue) = source.issue {
                return Ok(Some(IssueReference {
                    number: issue.number,
                    title: issue.title,
                    url: issue.html_url,
                }));
            }
        }

        if short {
            break;
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::http::{append_query, MockTransport};

    const API: &str = "https://api.github.com";

    fn paged(path: &str, page: u32) -> String {
        append_query(&format!("{API}{path}"), &page_params(page))
    }

    #[tokio::test]
    async fn get_pull_decodes_the_record() {
        let transport = MockTransport::new();
        transport.push_json(
            &format!("{API}/repos/org/alpha/pulls/8"),
            r#"{
                "number": 8,
                "title": "Add retry logic",
                "body": "Fixes #7",
                "additions": 100,
                "deletions": 50,
                "changed_files": 6,
                "merged_at": "2026-01-02T03:04:05Z",
                "html_url": "https://github.com/org/alpha/pull/8",
                "base": {"sha": "abc123"}
            }"#,
        );

        let client = GitHubClient::new(Arc::new(transport), None);
        let pr = get_pull(&client, "org", "alpha", 8).await.unwrap().unwrap();

        assert_eq!(pr.number, 8);
        assert_eq!(pr.body.as_deref(), Some("Fixes #7"));
        assert_eq!(pr.base.sha, "abc123");
        assert!(pr.merged_at.is_some());
    }

    #[tokio::test]
    async fn missing_pull_is_absent_not_an_error() {
        let transport = MockTransport::new();
        transport.push_response(
            &format!("{API}/repos/org/alpha/pulls/9"),
            crate::http::HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let client = GitHubClient::new(Arc::new(transport), None);
        assert!(get_pull(&client, "org", "alpha", 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_files_follows_pagination() {
        let transport = MockTransport::new();
        let full_page = format!(
            "[{}]",
            (0..100)
                .map(|i| format!(r#"{{"filename":"src/f{i}.py","status":"modified"}}"#))
                .collect::<Vec<_>>()
                .join(",")
        );
        transport.push_json(&paged("/repos/org/alpha/pulls/8/files", 1), &full_page);
        transport.push_json(
            &paged("/repos/org/alpha/pulls/8/files", 2),
            r#"[{"filename":"docs/guide.md","status":"added"}]"#,
        );

        let client = GitHubClient::new(Arc::new(transport.clone()), None);
        let files = list_files(&client, "org", "alpha", 8).await.unwrap();

        assert_eq!(files.len(), 101);
        assert_eq!(files[100].path, "docs/guide.md");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn timeline_yields_first_cross_referenced_issue() {
        let transport = MockTransport::new();
        transport.push_json(
            &paged("/repos/org/alpha/issues/8/timeline", 1),
            r#"[
                {"event": "labeled"},
                {"event": "cross-referenced", "source": {"type": "commit"}},
                {"event": "cross-referenced",
                 "source": {"type": "issue",
                            "issue": {"number": 7, "title": "Retry bug",
                                      "html_url": "https://github.com/org/alpha/issues/7"}}},
                {"event": "cross-referenced",
                 "source": {"type": "issue",
                            "issue": {"number": 3, "title": "Older", "html_url": "u"}}}
            ]"#,
        );

        let client = GitHubClient::new(Arc::new(transport), None);
        let issue = find_timeline_issue(&client, "org", "alpha", 8)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(issue.number, 7);
        assert_eq!(issue.title, "Retry bug");
    }

    #[tokio::test]
    async fn timeline_without_issue_references_yields_none() {
        let transport = MockTransport::new();
        transport.push_json(
            &paged("/repos/org/alpha/issues/8/timeline", 1),
            r#"[{"event": "labeled"}, {"event": "closed"}]"#,
        );

        let client = GitHubClient::new(Arc::new(transport), None);
        assert!(find_timeline_issue(&client, "org", "alpha", 8)
            .await
            .unwrap()
            .is_none());
    }
}
