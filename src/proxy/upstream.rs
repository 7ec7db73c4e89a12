//! HTTP client for forwarding queries to the SearXNG backend.
//! No retries: a failed call is reported once and the caller may try again.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::models::search::SearchResponse;

/// Backend failures. Messages are built from errors stripped of their URL,
/// since the URL carries the query.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request timed out")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Unavailable(String),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("backend returned an unreadable body: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse, BackendError>;
}

pub struct SearxClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl SearxClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("backend URL must be http or https");
        }
        // Keep any path prefix (e.g. https://host/searx) when joining.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("search")?;

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(16)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SearchBackend for SearxClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, BackendError> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Status(status.as_u16()));
        }

        resp.json::<SearchResponse>().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::InvalidResponse(e.without_url().to_string())
            }
        })
    }
}

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else {
        BackendError::Unavailable(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = SearxClient::new("http://searx.local:8888", Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint().as_str(), "http://searx.local:8888/search");

        let c = SearxClient::new("https://example.org/searx", Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint().as_str(), "https://example.org/searx/search");
    }

    #[test]
    fn test_rejects_non_http_backend() {
        assert!(SearxClient::new("ftp://example.org", Duration::from_secs(1)).is_err());
        assert!(SearxClient::new("not a url", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_forwards_encoded_query_and_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust & safety?"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{"title": "Rust", "url": "https://www.rust-lang.org/", "content": "safe"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearxClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let results = client.search("rust & safety?").await.unwrap();
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].title, "Rust");
    }

    #[tokio::test]
    async fn test_non_success_status_is_backend_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SearxClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.search("anything").await.unwrap_err();
        assert!(matches!(err, BackendError::Status(503)));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .mount(&server)
            .await;

        let client = SearxClient::new(&server.uri(), Duration::from_millis(100)).unwrap();
        let err = client.search("slow").await.unwrap_err();
        assert!(matches!(err, BackendError::Timeout));
    }

    #[tokio::test]
    async fn test_unreachable_backend_error_omits_query() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let client = SearxClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.search("very-private-words").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_) | BackendError::Timeout));
        assert!(!err.to_string().contains("very-private-words"));
    }

    #[tokio::test]
    async fn test_garbage_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = SearxClient::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.search("q").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidResponse(_)));
    }
}
