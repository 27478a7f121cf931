//! Declarative extraction of structured data from HTML and JSON documents.
//!
//! Describe *what* to pull out of a document as a tree of queries, and
//! quarry resolves it: looking values up, coercing them, joining nested
//! results, following links and walking through paginated listings.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry::{pick, query, RetrieveOptions};
//!
//! let scope = quarry::request("https://shop.example/products", RetrieveOptions::default());
//!
//! let products = scope
//!     .paginate(
//!         query::collection(
//!             "li.product",
//!             pick! {
//!                 "name" => "a",
//!                 "price" => query::number(".price"),
//!                 "url" => query::uri("a", "https://shop.example"),
//!             },
//!         ),
//!         query::uri("a.next", "https://shop.example"),
//!         5,
//!     )
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`document`] - HTML and JSON documents and their selectors
//! - [`query`] - Query variants and the resolution pipeline
//! - [`scope`] - A document plus shorthand for querying it
//! - [`retrieve`] - Fetching documents over HTTP, from files or from memory
//! - [`value`] - The dynamic values queries produce
//!
//! Everything runs on the caller's task. Documents are shared with `Rc`,
//! so queries and scopes are `!Send`; drive them with a current-thread
//! runtime or a `LocalSet`.

pub mod document;
pub mod error;
pub mod query;
pub mod retrieve;
pub mod scope;
pub mod value;

use std::path::PathBuf;

pub use document::{Body, Document, DocumentKind, DocumentRef, Raw, Selector};
pub use error::{DocumentError, Error, Result, RetrieveError, SecurityError};
pub use query::{Configure, Query, QueryExt, QueryRef, Selectable};
pub use retrieve::{Client, Request, RetrieveOptions};
pub use scope::Scope;
pub use value::Value;

/// A scope over the document a request points at.
///
/// Nothing is fetched until the first query runs.
pub fn request(request: impl Into<Request>, options: RetrieveOptions) -> Scope {
    let request = request.into();
    let fetch_options = options.clone();
    Scope::pending(
        async move { retrieve::request(request, &fetch_options).await },
        options,
    )
}

/// A scope over the contents of a local file.
pub fn file(path: impl Into<PathBuf>, options: RetrieveOptions) -> Scope {
    let path = path.into();
    let fetch_options = options.clone();
    Scope::pending(async move { retrieve::file(path, &fetch_options).await }, options)
}

/// A scope over a body already in memory.
pub fn body(body: impl Into<Body>, options: RetrieveOptions) -> Scope {
    let body = body.into();
    let fetch_options = options.clone();
    Scope::pending(async move { retrieve::body(body, &fetch_options).await }, options)
}
