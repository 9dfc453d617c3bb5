//! Rate-limit-aware GitHub REST client.
//!
//! All fetching funnels through [`GitHubClient::get_bytes`]: cache
//! lookup, quota gating, the 403 backoff loop, and cache writes live in
//! one place so every endpoint behaves identically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;

use crate::cache::{cache_key, CacheEnvelope, ResponseCache};
use crate::github::error::GitHubError;
use crate::http::{append_query, HttpRequest, HttpTransport};

const GITHUB_API: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("prmine/", env!("CARGO_PKG_VERSION"));

/// Grace added after the reported reset instant before retrying.
const RESET_GRACE_SECS: i64 = 2;

/// Callback invoked right before a rate-limit sleep so in-memory
/// progress can be persisted. Injected at construction; there is no
/// global registry.
pub type CheckpointFn = Arc<dyn Fn() -> std::io::Result<()> + Send + Sync>;

/// Shared quota gate.
///
/// When any fetch learns the quota is exhausted until time T, the gate
/// is raised so concurrent fetches wait instead of burning their own
/// 403s. `raise` keeps the latest deadline it has seen.
#[derive(Clone, Default)]
pub struct RateLimitGate {
    until: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl RateLimitGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self, until: DateTime<Utc>) {
        let mut slot = self
            .until
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match *slot {
            Some(existing) if existing >= until => {}
            _ => *slot = Some(until),
        }
    }

    /// Sleep until the gate's deadline has passed, if one is set.
    pub async fn wait(&self) {
        loop {
            let deadline = {
                let slot = self
                    .until
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                *slot
            };
            let Some(deadline) = deadline else { return };
            let now = Utc::now();
            if deadline <= now {
                let mut slot = self
                    .until
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                if slot.map_or(true, |d| d <= Utc::now()) {
                    *slot = None;
                }
                return;
            }
            let delta = (deadline - now)
                .to_std()
                .unwrap_or(Duration::from_secs(0));
            tokio::time::sleep(delta).await;
        }
    }
}

/// GitHub REST client shared by every fetch in a harvest run.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    token: Option<String>,
    cache: Option<ResponseCache>,
    checkpoint: Option<CheckpointFn>,
    gate: RateLimitGate,
    max_rate_limit_retries: u32,
}

impl GitHubClient {
    pub fn new(transport: Arc<dyn HttpTransport>, token: Option<String>) -> Self {
        Self {
            transport,
            token,
            cache: None,
            checkpoint: None,
            gate: RateLimitGate::new(),
            max_rate_limit_retries: 5,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: CheckpointFn) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    #[must_use]
    pub fn with_max_rate_limit_retries(mut self, retries: u32) -> Self {
        self.max_rate_limit_retries = retries;
        self
    }

    fn base_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            ("X-GitHub-Api-Version".to_string(), API_VERSION.to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    /// Fetch `path` (relative to the API root) with query `params`.
    ///
    /// Returns `Ok(None)` for any HTTP error status that is not a
    /// quota-exhaustion 403: those units of work are skipped, not
    /// fatal. Only 200 bodies are ever cached.
    pub async fn get_bytes(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<Vec<u8>>, GitHubError> {
        let url = format!("{GITHUB_API}{path}");
        let key = cache_key(&url, params);

        if let Some(cache) = &self.cache {
            if let Some(envelope) = cache.get(&key) {
                tracing::trace!(path, "cache hit");
                return Ok(Some(envelope.body));
            }
        }

        let full_url = append_query(&url, params);
        let mut attempts: u32 = 0;

        loop {
            self.gate.wait().await;

            let response = self
                .transport
                .send(HttpRequest {
                    url: full_url.clone(),
                    headers: self.base_headers(),
                })
                .await?;

            if let Some(reset) = quota_exhaustion(&response.status, &response.headers) {
                attempts += 1;
                if attempts > self.max_rate_limit_retries {
                    return Err(GitHubError::RateLimitExhausted { attempts: attempts - 1 });
                }

                if let Some(checkpoint) = &self.checkpoint {
                    if let Err(err) = checkpoint() {
                        tracing::warn!(error = %err, "checkpoint before rate-limit wait failed");
                    }
                }

                let resource = crate::http::header_get(&response.headers, "x-ratelimit-resource")
                    .unwrap_or("core");
                let resume_at = reset + chrono::Duration::seconds(RESET_GRACE_SECS);
                tracing::warn!(
                    resource,
                    resume_at = %resume_at,
                    attempt = attempts,
                    "rate limit exhausted, waiting for reset"
                );
                self.gate.raise(resume_at);
                continue;
            }

            if response.status >= 400 {
                tracing::debug!(path, status = response.status, "skipping on error status");
                return Ok(None);
            }

            if let Some(cache) = &self.cache {
                let kept_headers: Vec<(String, String)> = response
                    .headers
                    .iter()
                    .filter(|(k, _)| {
                        let k = k.to_ascii_lowercase();
                        k.starts_with("x-ratelimit-") || k == "content-type"
                    })
                    .cloned()
                    .collect();
                let envelope =
                    CacheEnvelope::new(response.status, kept_headers, response.body.clone());
                if let Err(err) = cache.put(&key, &envelope) {
                    tracing::warn!(error = %err, path, "cache write failed");
                }
            }

            return Ok(Some(response.body));
        }
    }

    /// Fetch and decode a JSON body. `Ok(None)` mirrors [`get_bytes`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Option<T>, GitHubError> {
        match self.get_bytes(path, params).await? {
            Some(body) => {
                let value = serde_json::from_slice(&body).map_err(|source| {
                    GitHubError::Decode {
                        path: path.to_string(),
                        source,
                    }
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

/// Detect the quota-exhaustion flavor of 403: the remaining counter is
/// zero and a parseable reset timestamp is present. Returns the reset
/// instant.
fn quota_exhaustion(status: &u16, headers: &[(String, String)]) -> Option<DateTime<Utc>> {
    if *status != 403 {
        return None;
    }
    if crate::http::header_get(headers, "x-ratelimit-remaining")? != "0" {
        return None;
    }
    let reset: i64 = crate::http::header_get(headers, "x-ratelimit-reset")?
        .parse()
        .ok()?;
    Utc.timestamp_opt(reset, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    use crate::http::{HttpResponse, MockTransport};

    fn exhausted_403(reset: i64) -> HttpResponse {
        HttpResponse {
            status: 403,
            headers: vec![
                ("X-RateLimit-Remaining".to_string(), "0".to_string()),
                ("X-RateLimit-Reset".to_string(), reset.to_string()),
                ("X-RateLimit-Resource".to_string(), "search".to_string()),
            ],
            body: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_after_quota_403_and_runs_checkpoint() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/search/repositories";
        transport.push_response(url, exhausted_403(Utc::now().timestamp() + 1));
        transport.push_json(url, r#"{"items":[]}"#);

        let saves = Arc::new(AtomicUsize::new(0));
        let saves_clone = Arc::clone(&saves);
        let checkpoint: CheckpointFn = Arc::new(move || {
            saves_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let client = GitHubClient::new(Arc::new(transport.clone()), None)
            .with_checkpoint(checkpoint);
        let body = client
            .get_bytes("/search/repositories", &[])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(body, br#"{"items":[]}"#.to_vec());
        assert_eq!(saves.load(Ordering::SeqCst), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_rate_limit_retries() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/search/repositories";
        for _ in 0..3 {
            transport.push_response(url, exhausted_403(Utc::now().timestamp() + 1));
        }

        let client = GitHubClient::new(Arc::new(transport.clone()), None)
            .with_max_rate_limit_retries(2);
        let err = client
            .get_bytes("/search/repositories", &[])
            .await
            .expect_err("should give up");

        assert!(matches!(err, GitHubError::RateLimitExhausted { attempts: 2 }));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn plain_error_status_maps_to_absent_result() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/repos/o/n/pulls/7";
        transport.push_response(
            url,
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );

        let client = GitHubClient::new(Arc::new(transport.clone()), None);
        let result = client.get_bytes("/repos/o/n/pulls/7", &[]).await.unwrap();

        assert!(result.is_none());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn cached_response_skips_the_transport() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
        let transport = MockTransport::new();
        let url = "https://api.github.com/repos/o/n/pulls/8";
        transport.push_json(url, r#"{"number": 8}"#);

        let client =
            GitHubClient::new(Arc::new(transport.clone()), None).with_cache(cache.clone());

        let first = client.get_bytes("/repos/o/n/pulls/8", &[]).await.unwrap();
        let second = client.get_bytes("/repos/o/n/pulls/8", &[]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.requests().len(), 1, "second fetch served from cache");
    }

    #[tokio::test]
    async fn error_statuses_are_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = ResponseCache::open(dir.path(), Duration::from_secs(3600)).unwrap();
        let transport = MockTransport::new();
        let url = "https://api.github.com/repos/o/n/pulls/9";
        transport.push_response(
            url,
            HttpResponse {
                status: 404,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        transport.push_json(url, r#"{"number": 9}"#);

        let client =
            GitHubClient::new(Arc::new(transport.clone()), None).with_cache(cache.clone());

        assert!(client.get_bytes("/repos/o/n/pulls/9", &[]).await.unwrap().is_none());
        // The 404 must not have been stored, so this goes to the wire.
        assert!(client.get_bytes("/repos/o/n/pulls/9", &[]).await.unwrap().is_some());
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn token_and_api_headers_are_attached() {
        let transport = MockTransport::new();
        let url = "https://api.github.com/rate_limit";
        transport.push_json(url, "{}");

        let client =
            GitHubClient::new(Arc::new(transport.clone()), Some("tok_abc".to_string()));
        client.get_bytes("/rate_limit", &[]).await.unwrap();

        let requests = transport.requests();
        let headers = &requests[0].headers;
        assert_eq!(
            crate::http::header_get(headers, "authorization"),
            Some("Bearer tok_abc")
        );
        assert_eq!(
            crate::http::header_get(headers, "accept"),
            Some("application/vnd.github+json")
        );
        assert_eq!(
            crate::http::header_get(headers, "x-github-api-version"),
            Some(API_VERSION)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gate_blocks_until_deadline_then_clears() {
        let gate = RateLimitGate::new();
        gate.raise(Utc::now() - chrono::Duration::seconds(5));
        // Past deadline clears immediately.
        gate.wait().await;

        // An unset gate is a no-op.
        gate.wait().await;
    }

    #[test]
    fn quota_exhaustion_requires_zero_remaining_and_reset() {
        let full = vec![
            ("x-ratelimit-remaining".to_string(), "0".to_string()),
            ("x-ratelimit-reset".to_string(), "1700000000".to_string()),
        ];
        assert!(quota_exhaustion(&403, &full).is_some());
        assert!(quota_exhaustion(&200, &full).is_none());

        let nonzero = vec![
            ("x-ratelimit-remaining".to_string(), "3".to_string()),
            ("x-ratelimit-reset".to_string(), "1700000000".to_string()),
        ];
        assert!(quota_exhaustion(&403, &nonzero).is_none());

        let unparseable = vec![
            ("x-ratelimit-remaining".to_string(), "0".to_string()),
            ("x-ratelimit-reset".to_string(), "soon".to_string()),
        ];
        assert!(quota_exhaustion(&403, &unparseable).is_none());
    }
}
