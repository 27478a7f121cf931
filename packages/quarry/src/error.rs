//! Typed errors for queries and document retrieval.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use std::sync::Arc;

use thiserror::Error;

/// Errors that can reject a query's `on()` future.
#[derive(Debug, Error)]
pub enum Error {
    /// Nothing was found and the query was configured to fail instead of
    /// substituting its default.
    #[error("no value found for selector {selector}")]
    MissingValue { selector: String },

    /// A link could not be turned into an absolute URI.
    #[error("malformed link {link:?} (base {base:?}): {source}")]
    MalformedLink {
        link: String,
        base: String,
        #[source]
        source: url::ParseError,
    },

    /// The document behind a scope could not be retrieved.
    #[error("retrieval failed: {0}")]
    Retrieve(#[source] Arc<RetrieveError>),

    /// A document body could not be loaded.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// A user callback failed.
    #[error("callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary error raised inside a callback query.
    pub fn callback(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Callback(err.into())
    }
}

impl From<RetrieveError> for Error {
    fn from(err: RetrieveError) -> Self {
        Self::Retrieve(Arc::new(err))
    }
}

impl From<Arc<RetrieveError>> for Error {
    fn from(err: Arc<RetrieveError>) -> Self {
        Self::Retrieve(err)
    }
}

/// Errors that can occur while loading a document body.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// JSON body did not parse
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while retrieving a document.
#[derive(Debug, Error)]
pub enum RetrieveError {
    /// Security validation failed
    #[error("security error: {0}")]
    Security(#[from] SecurityError),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {uri}")]
    Status { uri: String, status: u16 },

    /// Invalid URI format
    #[error("invalid URI: {uri}")]
    InvalidUri { uri: String },

    /// Nothing is served at this URI (mock client)
    #[error("not found: {uri}")]
    NotFound { uri: String },

    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Body was retrieved but could not be loaded
    #[error("document error: {0}")]
    Document(#[from] DocumentError),
}

/// Security-related errors, primarily for SSRF protection.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// URL scheme not allowed (e.g., file://, ftp://)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// Host is blocked (e.g., localhost, internal IPs)
    #[error("blocked host: {0}")]
    BlockedHost(String),

    /// IP in blocked CIDR range (e.g., 10.0.0.0/8)
    #[error("blocked IP range: {0}")]
    BlockedCidr(String),

    /// URL has no host
    #[error("URL has no host")]
    NoHost,

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Result type alias for query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for retrieval operations.
pub type RetrieveResult<T> = std::result::Result<T, RetrieveError>;

/// Result type alias for security operations.
pub type SecurityResult<T> = std::result::Result<T, SecurityError>;
