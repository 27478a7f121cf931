//! HTTP transport backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use super::{Client, Request};
use crate::error::{RetrieveError, RetrieveResult};

/// Fetches request bodies over HTTP.
///
/// Non-success statuses are errors. Redirects are followed by `reqwest`.
///
/// # Example
///
/// ```rust,ignore
/// use quarry::retrieve::{HttpClient, RetrieveOptions};
///
/// let options = RetrieveOptions::default()
///     .with_client(HttpClient::new().with_user_agent("MyBot/1.0"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client with a 30 second timeout.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            user_agent: "QuarryBot/1.0".to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Use a preconfigured `reqwest` client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn build(&self, request: &Request) -> RetrieveResult<reqwest::RequestBuilder> {
        let url = Url::parse(&request.uri).map_err(|_| RetrieveError::InvalidUri {
            uri: request.uri.clone(),
        })?;
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| RetrieveError::Http(Box::new(e)))?;

        let mut builder = self
            .client
            .request(method, url)
            .header("User-Agent", &self.user_agent);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        Ok(builder)
    }
}

#[async_trait]
impl Client for HttpClient {
    async fn fetch(&self, request: &Request) -> RetrieveResult<String> {
        let uri = &request.uri;
        debug!(uri = %uri, method = %request.method, "HTTP fetch starting");

        let response = self.build(request)?.send().await.map_err(|e| {
            warn!(uri = %uri, error = %e, "HTTP request failed");
            RetrieveError::Http(Box::new(e))
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(uri = %uri, status = status.as_u16(), "HTTP request returned error status");
            return Err(RetrieveError::Status {
                uri: uri.clone(),
                status: status.as_u16(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| RetrieveError::Http(Box::new(e)))?;

        debug!(uri = %uri, bytes = text.len(), "HTTP fetch complete");
        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_applies_request_fields() {
        let client = HttpClient::new().with_user_agent("TestBot/0.1");
        let request = Request::new("https://example.com/search")
            .with_method("post")
            .with_header("Accept", "application/json")
            .with_body("q=rust");

        let built = client.build(&request).unwrap().build().unwrap();
        assert_eq!(built.method(), &Method::POST);
        assert_eq!(built.url().as_str(), "https://example.com/search");
        assert_eq!(built.headers()["User-Agent"], "TestBot/0.1");
        assert_eq!(built.headers()["Accept"], "application/json");
    }

    #[tokio::test]
    async fn test_invalid_uri_fails_before_sending() {
        let err = HttpClient::new()
            .fetch(&Request::new("not a uri"))
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::InvalidUri { .. }));
    }

    #[tokio::test]
    async fn test_empty_uri_is_invalid() {
        let err = HttpClient::new().fetch(&Request::default()).await.unwrap_err();
        assert!(matches!(err, RetrieveError::InvalidUri { .. }));
    }
}
