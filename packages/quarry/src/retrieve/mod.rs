//! Retrieval: turning a request, a file, or a raw body into a document.
//!
//! The network is reached through the [`Client`] trait so that callers can
//! swap transports. [`HttpClient`] is the default; [`MockClient`] serves
//! canned bodies for tests; [`ValidatedClient`] and [`RateLimitedClient`]
//! wrap any client with SSRF checks and rate limits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry::retrieve::{self, HttpClient, RetrieveOptions, ValidatedClient};
//!
//! let options = RetrieveOptions::default()
//!     .with_client(ValidatedClient::new(HttpClient::new()));
//! let document = retrieve::request("https://example.com", &options).await?;
//! ```

mod http;
mod mock;
mod rate_limited;
mod validated;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{self, Body, DocumentKind, DocumentRef};
use crate::error::{RetrieveError, RetrieveResult};

pub use http::HttpClient;
pub use mock::MockClient;
pub use rate_limited::RateLimitedClient;
pub use validated::{UrlValidator, ValidatedClient};

/// A transport that fetches raw bodies.
#[async_trait]
pub trait Client: Send + Sync {
    /// Fetch the body the request points at.
    async fn fetch(&self, request: &Request) -> RetrieveResult<String>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "client"
    }
}

#[async_trait]
impl<C: Client + ?Sized> Client for Arc<C> {
    async fn fetch(&self, request: &Request) -> RetrieveResult<String> {
        (**self).fetch(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Description of a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub uri: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Default for Request {
    fn default() -> Self {
        Self {
            uri: String::new(),
            method: default_method(),
            headers: BTreeMap::new(),
            body: None,
        }
    }
}

impl Request {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

impl From<&str> for Request {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for Request {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

/// How to retrieve and load documents.
#[derive(Clone)]
pub struct RetrieveOptions {
    /// Backend the body is loaded into.
    pub kind: DocumentKind,

    /// Transport used for requests.
    pub client: Arc<dyn Client>,

    /// Template for requests made while following links. Each followed
    /// request is this template with its URI replaced.
    pub request: Request,
}

/// One HTTP client for every default set of options, so its connection
/// pool is reused.
static DEFAULT_CLIENT: LazyLock<Arc<dyn Client>> = LazyLock::new(|| Arc::new(HttpClient::new()));

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            kind: DocumentKind::default(),
            client: Arc::clone(&DEFAULT_CLIENT),
            request: Request::default(),
        }
    }
}

impl RetrieveOptions {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: DocumentKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_client(mut self, client: impl Client + 'static) -> Self {
        self.client = Arc::new(client);
        self
    }

    pub fn with_request(mut self, request: Request) -> Self {
        self.request = request;
        self
    }

    /// The request template pointed at `uri`.
    pub fn request_for(&self, uri: impl Into<String>) -> Request {
        self.request.clone().with_uri(uri)
    }
}

impl fmt::Debug for RetrieveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrieveOptions")
            .field("kind", &self.kind)
            .field("client", &self.client.name())
            .field("request", &self.request)
            .finish()
    }
}

/// Fetch a request with the configured client and load the body.
pub async fn request(request: impl Into<Request>, options: &RetrieveOptions) -> RetrieveResult<DocumentRef> {
    let request = request.into();
    debug!(
        uri = %request.uri,
        method = %request.method,
        client = options.client.name(),
        kind = %options.kind,
        "Retrieving document"
    );

    let text = options.client.fetch(&request).await?;
    body(text, options).await
}

/// Read a local file and load its contents.
pub async fn file(path: impl AsRef<Path>, options: &RetrieveOptions) -> RetrieveResult<DocumentRef> {
    let path = path.as_ref();
    debug!(path = %path.display(), kind = %options.kind, "Reading document");

    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RetrieveError::Io {
            path: path.display().to_string(),
            source,
        })?;

    body(text, options).await
}

/// Load a document directly from a body already in memory.
pub async fn body(body: impl Into<Body>, options: &RetrieveOptions) -> RetrieveResult<DocumentRef> {
    Ok(document::load(options.kind, body)?)
}
