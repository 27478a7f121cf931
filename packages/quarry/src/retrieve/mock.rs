//! Mock client for testing.
//!
//! Serves canned bodies by URI and records every request it receives.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Client, Request};
use crate::error::{RetrieveError, RetrieveResult};

/// Canned response for a URI.
#[derive(Debug, Clone)]
enum Response {
    Body(String),
    Status(u16),
}

/// Mock client for testing.
///
/// Clones share their pages and call log, so a clone handed to
/// [`RetrieveOptions`](super::RetrieveOptions) can still be inspected.
///
/// # Example
///
/// ```rust
/// use quarry::retrieve::MockClient;
///
/// let mock = MockClient::new()
///     .with_page("https://example.com/1", "<a class=\"next\" href=\"/2\">2</a>")
///     .with_failure("https://example.com/2", 503);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MockClient {
    /// Canned responses indexed by URI
    pages: Arc<RwLock<HashMap<String, Response>>>,
    /// Every request received, in order
    calls: Arc<RwLock<Vec<Request>>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `uri`.
    pub fn add_page(&self, uri: impl Into<String>, body: impl Into<String>) {
        let mut pages = self.pages.write().unwrap();
        pages.insert(uri.into(), Response::Body(body.into()));
    }

    /// Answer `uri` with an error status.
    pub fn add_failure(&self, uri: impl Into<String>, status: u16) {
        let mut pages = self.pages.write().unwrap();
        pages.insert(uri.into(), Response::Status(status));
    }

    /// Serve `body` for `uri` (builder pattern).
    pub fn with_page(self, uri: impl Into<String>, body: impl Into<String>) -> Self {
        self.add_page(uri, body);
        self
    }

    /// Answer `uri` with an error status (builder pattern).
    pub fn with_failure(self, uri: impl Into<String>, status: u16) -> Self {
        self.add_failure(uri, status);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.read().unwrap().clone()
    }

    /// URIs requested so far, in order.
    pub fn requested_uris(&self) -> Vec<String> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .map(|request| request.uri.clone())
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }
}

#[async_trait]
impl Client for MockClient {
    async fn fetch(&self, request: &Request) -> RetrieveResult<String> {
        self.calls.write().unwrap().push(request.clone());

        let pages = self.pages.read().unwrap();
        match pages.get(&request.uri) {
            Some(Response::Body(body)) => Ok(body.clone()),
            Some(Response::Status(status)) => Err(RetrieveError::Status {
                uri: request.uri.clone(),
                status: *status,
            }),
            None => Err(RetrieveError::NotFound {
                uri: request.uri.clone(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
