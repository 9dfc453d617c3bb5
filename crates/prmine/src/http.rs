//! Transport boundary for all HTTP I/O.
//!
//! The harvester never talks to the network directly; everything goes
//! through [`HttpTransport`] so unit tests can substitute an in-memory
//! mock instead of sockets or loopback servers.

use async_trait::async_trait;
use thiserror::Error;

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A minimal GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HttpHeaders,
}

/// A minimal HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for {url}")]
    NoMockResponse { url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Append a query string to `url`, percent-encoding nothing beyond what
/// the GitHub search syntax needs (spaces, `:`, `>`, `/` are left to the
/// encoder). Parameters keep their given order.
#[must_use]
pub fn append_query(url: &str, params: &[(String, String)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencode(v)))
        .collect();
    format!("{}?{}", url, query.join("&"))
}

/// Minimal percent-encoding for query values.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char);
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// A real HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.client.get(&request.url);
        for (k, v) in request.headers {
            builder = builder.header(&k, &v);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let mut headers: HttpHeaders = Vec::new();
        for (name, value) in resp.headers().iter() {
            headers.push((
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            ));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

// ---------- Test-only mock transport ----------

#[cfg(test)]
use std::collections::{HashMap, VecDeque};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// In-memory mock transport.
///
/// Designed for unit tests: no sockets, no loopback HTTP servers. If
/// multiple responses are registered for the same URL they are returned
/// in FIFO order.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[cfg(test)]
#[derive(Default)]
struct MockTransportInner {
    routes: HashMap<String, VecDeque<HttpResponse>>,
    requests: Vec<HttpRequest>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, url: impl Into<String>, response: HttpResponse) {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner
            .routes
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    /// Register a 200 response with a JSON body.
    pub fn push_json(&self, url: impl Into<String>, body: &str) {
        self.push_response(
            url,
            HttpResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body: body.as_bytes().to_vec(),
            },
        );
    }

    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        let inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");
        inner.requests.clone()
    }
}

#[cfg(test)]
#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut inner = self
            .inner
            .lock()
            .expect("mock transport lock should not be poisoned");

        let url = request.url.clone();
        inner.requests.push(request);

        match inner.routes.get_mut(&url).and_then(|q| q.pop_front()) {
            Some(resp) => Ok(resp),
            None => Err(HttpError::NoMockResponse { url }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_get_is_case_insensitive_and_returns_first_match() {
        let headers: HttpHeaders = vec![
            ("X-RateLimit-Remaining".to_string(), "0".to_string()),
            ("x-ratelimit-remaining".to_string(), "42".to_string()),
        ];
        assert_eq!(header_get(&headers, "x-ratelimit-remaining"), Some("0"));
        assert_eq!(header_get(&headers, "X-RATELIMIT-REMAINING"), Some("0"));
        assert_eq!(header_get(&headers, "missing"), None);
    }

    #[test]
    fn header_get_accepts_plain_slices() {
        let headers = [("x-ratelimit-reset".to_string(), "1700000000".to_string())];
        assert_eq!(
            header_get(&headers[..], "X-RateLimit-Reset"),
            Some("1700000000")
        );
    }

    #[test]
    fn append_query_preserves_parameter_order() {
        let params = vec![
            ("q".to_string(), "stars:>=50".to_string()),
            ("page".to_string(), "2".to_string()),
        ];
        assert_eq!(
            append_query("https://api.github.com/search/repositories", &params),
            "https://api.github.com/search/repositories?q=stars%3A%3E%3D50&page=2"
        );
    }

    #[test]
    fn append_query_without_params_returns_url_unchanged() {
        assert_eq!(
            append_query("https://api.github.com/rate_limit", &[]),
            "https://api.github.com/rate_limit"
        );
    }

    #[test]
    fn urlencode_escapes_search_syntax() {
        assert_eq!(urlencode("repo:falconry/falcon"), "repo%3Afalconry%2Ffalcon");
        assert_eq!(urlencode("a b"), "a+b");
    }

    #[tokio::test]
    async fn mock_transport_returns_registered_response_and_records_request() {
        let transport = MockTransport::new();
        let url = "https://example.com/api";

        transport.push_response(
            url,
            HttpResponse {
                status: 200,
                headers: vec![("X-Test".to_string(), "ok".to_string())],
                body: b"hello".to_vec(),
            },
        );

        let req = HttpRequest {
            url: url.to_string(),
            headers: vec![("Accept".to_string(), "application/json".to_string())],
        };
        let resp = transport.send(req.clone()).await.expect("mock response");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("x-test"), Some("ok"));
        assert_eq!(resp.body, b"hello".to_vec());

        assert_eq!(transport.requests(), vec![req]);
    }

    #[tokio::test]
    async fn mock_transport_errors_when_no_response_is_registered() {
        let transport = MockTransport::new();
        let req = HttpRequest {
            url: "https://example.com/missing".to_string(),
            headers: Vec::new(),
        };

        let err = transport
            .send(req)
            .await
            .expect_err("missing mock should error");
        match err {
            HttpError::NoMockResponse { url } => {
                assert_eq!(url, "https://example.com/missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn mock_transport_pops_responses_in_fifo_order() {
        let transport = MockTransport::new();
        let url = "https://example.com/seq";
        transport.push_response(
            url,
            HttpResponse {
                status: 403,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        transport.push_json(url, "{}");

        let req = HttpRequest {
            url: url.to_string(),
            headers: Vec::new(),
        };
        assert_eq!(transport.send(req.clone()).await.unwrap().status, 403);
        assert_eq!(transport.send(req).await.unwrap().status, 200);
    }
}
