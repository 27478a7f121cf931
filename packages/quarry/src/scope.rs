//! A document together with shorthand for querying it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::document::{DocumentRef, Raw, Selector};
use crate::error::{Error, Result, RetrieveError, RetrieveResult};
use crate::query::{self, as_string, factory, Configure, Max, QueryExt, Selectable};
use crate::retrieve::RetrieveOptions;
use crate::value::Value;

type PendingDocument = Shared<LocalBoxFuture<'static, std::result::Result<DocumentRef, Arc<RetrieveError>>>>;

#[derive(Clone)]
enum Source {
    Ready(DocumentRef),
    /// Retrieved at most once, however many queries await it.
    Pending(PendingDocument),
}

/// A document (or a document still being retrieved) plus one method per
/// query variant.
///
/// Every method resolves the document first, so a failed retrieval fails
/// the query with [`Error::Retrieve`]. Follow and paginate queries built
/// here retrieve linked pages with the scope's [`RetrieveOptions`].
///
/// # Example
///
/// ```rust,ignore
/// let scope = quarry::request("https://example.com", RetrieveOptions::default());
/// let title = scope.string("h1").await?;
/// let links = scope.collection("a", query::uri("/href", "https://example.com")).await?;
/// ```
#[derive(Clone)]
pub struct Scope {
    source: Source,
    options: Option<RetrieveOptions>,
}

impl Scope {
    /// A scope over an already loaded document.
    pub fn new(document: DocumentRef) -> Self {
        Self {
            source: Source::Ready(document),
            options: None,
        }
    }

    /// A scope over a document that is still being retrieved.
    ///
    /// The future runs when the first query needs the document.
    pub fn pending<F>(document: F, options: RetrieveOptions) -> Self
    where
        F: Future<Output = RetrieveResult<DocumentRef>> + 'static,
    {
        let shared = document.map(|result| result.map_err(Arc::new)).boxed_local().shared();
        Self {
            source: Source::Pending(shared),
            options: Some(options),
        }
    }

    pub fn with_options(mut self, options: RetrieveOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Options for retrieving linked pages; defaults apply when unset.
    pub fn options(&self) -> Option<&RetrieveOptions> {
        self.options.as_ref()
    }

    fn retrieve_options(&self) -> RetrieveOptions {
        self.options.clone().unwrap_or_default()
    }

    /// Wait for the document.
    pub async fn document(&self) -> Result<DocumentRef> {
        match &self.source {
            Source::Ready(document) => Ok(DocumentRef::clone(document)),
            Source::Pending(pending) => pending.clone().await.map_err(Error::Retrieve),
        }
    }

    /// Run any query against the document. Plain selectors become string
    /// queries.
    pub async fn execute(&self, query: impl Into<Selectable>) -> Result<Option<Value>> {
        let query = factory(query, as_string);
        let document = self.document().await?;
        query.on(&document).await
    }

    pub async fn value(&self, selector: impl Into<Selector>) -> Result<Option<Value>> {
        self.execute(query::value(selector)).await
    }

    pub async fn string(&self, selector: impl Into<Selector>) -> Result<Option<Value>> {
        self.execute(query::string(selector)).await
    }

    pub async fn number(&self, selector: impl Into<Selector>) -> Result<Option<Value>> {
        self.execute(query::number(selector)).await
    }

    pub async fn regex(
        &self,
        selector: impl Into<Selector>,
        pattern: regex::Regex,
        group: impl Into<Option<usize>>,
    ) -> Result<Option<Value>> {
        self.execute(query::regex(selector, pattern, group)).await
    }

    pub async fn uri(&self, selector: impl Into<Selector>, base: impl Into<String>) -> Result<Option<Value>> {
        self.execute(query::uri(selector, base)).await
    }

    pub async fn link(&self, selector: impl Into<Selector>, base: impl Into<String>) -> Result<Option<Value>> {
        self.execute(query::link(selector, base)).await
    }

    pub async fn object<K, V>(&self, pick: impl IntoIterator<Item = (K, V)>) -> Result<Option<Value>>
    where
        K: Into<String>,
        V: Into<Selectable>,
    {
        self.execute(query::object(pick)).await
    }

    pub async fn collection(
        &self,
        selector: impl Into<Selector>,
        inner: impl Into<Selectable>,
    ) -> Result<Option<Value>> {
        self.execute(query::collection(selector, inner)).await
    }

    pub async fn context(
        &self,
        selector: impl Into<Selector>,
        inner: impl Into<Selectable>,
    ) -> Result<Option<Value>> {
        self.execute(query::context(selector, inner)).await
    }

    pub async fn follow(
        &self,
        uri: impl Into<Selectable>,
        inner: impl Into<Selectable>,
    ) -> Result<Option<Value>> {
        let query = query::follow(uri, inner).with_retrieve(self.retrieve_options());
        self.execute(query).await
    }

    pub async fn paginate(
        &self,
        inner: impl Into<Selectable>,
        uri: impl Into<Selectable>,
        max: impl Into<Max>,
    ) -> Result<Option<Value>> {
        let query = query::paginate(inner, uri, max).with_retrieve(self.retrieve_options());
        self.execute(query).await
    }

    pub async fn callback<F, Fut>(&self, f: F) -> Result<Option<Value>>
    where
        F: Fn(Scope) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        self.execute(query::callback(f)).await
    }

    pub async fn raw(&self, f: impl Fn(Raw<'_>) -> Option<Value> + 'static) -> Result<Option<Value>> {
        self.execute(query::raw(f)).await
    }

    /// Like [`Scope::string`] but failing when nothing is found.
    pub async fn require(&self, selector: impl Into<Selector>) -> Result<Value> {
        let value = self
            .execute(query::string(selector).throw_on_missing(true))
            .await?;
        Ok(value.unwrap_or_default())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Ready(document) => format!("{document:?}"),
            Source::Pending(_) => "<pending>".to_string(),
        };
        f.debug_struct("Scope")
            .field("source", &source)
            .field("options", &self.options)
            .finish()
    }
}
