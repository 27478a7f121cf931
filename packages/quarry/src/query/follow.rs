//! Queries that leave the current document: following a link and walking
//! through paginated results.

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use tracing::debug;

use super::{as_string, as_uri, factory, settle, Configure, Found, Query, QueryExt, QueryOptions, QueryRef, Selectable};
use crate::document::DocumentRef;
use crate::error::Result;
use crate::retrieve::{self, RetrieveOptions};
use crate::value::Value;

/// Retrieve the page at `uri` using the request template in `options`.
async fn fetch(options: &RetrieveOptions, uri: &str) -> Result<DocumentRef> {
    let request = options.request_for(uri);
    Ok(retrieve::request(request, options).await?)
}

/// Evaluate a uri query; a missing or empty link is `None`.
async fn next_link(uri: &QueryRef, document: &DocumentRef) -> Result<Option<String>> {
    Ok(uri
        .on(document)
        .await?
        .filter(Value::is_truthy)
        .map(|link| link.to_text()))
}

/// Resolves a link in the current document, retrieves the linked page and
/// applies an inner query to it.
///
/// Nothing about following is fatal: a missing link, a failed request or
/// a failing inner query all resolve to the default.
#[derive(Debug, Clone)]
pub struct FollowQuery {
    options: QueryOptions,
    uri: QueryRef,
    inner: QueryRef,
    retrieve: RetrieveOptions,
}

impl FollowQuery {
    /// A plain selector for `uri` becomes a URI query; one for `inner` a
    /// string query.
    pub fn new(uri: impl Into<Selectable>, inner: impl Into<Selectable>) -> Self {
        Self {
            options: QueryOptions::default(),
            uri: factory(uri, as_uri),
            inner: factory(inner, as_string),
            retrieve: RetrieveOptions::default(),
        }
    }

    /// How the linked page is retrieved.
    pub fn with_retrieve(mut self, retrieve: RetrieveOptions) -> Self {
        self.retrieve = retrieve;
        self
    }

    async fn follow(&self, document: &DocumentRef) -> Result<Option<Value>> {
        let Some(link) = next_link(&self.uri, document).await? else {
            debug!("No link to follow");
            return Ok(None);
        };

        debug!(uri = %link, "Following link");
        let page = fetch(&self.retrieve, &link).await?;
        self.inner.on(&page).await
    }
}

impl Configure for FollowQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for FollowQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        match self.follow(document).await {
            Ok(found) => Ok(found.map(Found::Value)),
            Err(e) => {
                debug!(error = %e, "Follow failed, using default");
                Ok(None)
            }
        }
    }
}

/// When to stop fetching pages.
#[derive(Clone, Default)]
pub enum Max {
    /// Keep going while there is a next link.
    #[default]
    Unlimited,
    /// Stop once this many pages have been collected.
    Pages(usize),
    /// Keep going while the predicate holds for (pages so far, their results).
    While(Rc<dyn Fn(usize, &[Value]) -> bool>),
}

impl Max {
    pub fn when(predicate: impl Fn(usize, &[Value]) -> bool + 'static) -> Self {
        Self::While(Rc::new(predicate))
    }

    fn allows(&self, count: usize, pages: &[Value]) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Pages(max) => count < *max,
            Self::While(predicate) => predicate(count, pages),
        }
    }
}

/// `0` means unlimited.
impl From<usize> for Max {
    fn from(max: usize) -> Self {
        match max {
            0 => Self::Unlimited,
            max => Self::Pages(max),
        }
    }
}

impl From<Option<usize>> for Max {
    fn from(max: Option<usize>) -> Self {
        max.map(Max::from).unwrap_or_default()
    }
}

impl fmt::Debug for Max {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("Unlimited"),
            Self::Pages(max) => f.debug_tuple("Pages").field(max).finish(),
            Self::While(_) => f.write_str("While(<predicate>)"),
        }
    }
}

/// Combines the per-page results.
pub type MergeFn = Rc<dyn Fn(Vec<Value>) -> Value>;

/// Flatten one level: array pages are spliced in, anything else is kept
/// as a single item.
pub fn flatten(pages: Vec<Value>) -> Value {
    pages
        .into_iter()
        .flat_map(|page| match page {
            Value::Array(items) => items,
            other => vec![other],
        })
        .collect()
}

/// Applies an inner query to the current page, then keeps following the
/// next-page link and applying it again.
///
/// Stops when there is no next link or [`Max`] says so, then merges the
/// per-page results (flattening one level unless configured otherwise).
/// Like [`FollowQuery`], any failure along the way resolves to the default.
#[derive(Clone)]
pub struct PaginateQuery {
    options: QueryOptions,
    inner: QueryRef,
    uri: QueryRef,
    max: Max,
    merge: MergeFn,
    retrieve: RetrieveOptions,
}

impl PaginateQuery {
    pub fn new(inner: impl Into<Selectable>, uri: impl Into<Selectable>, max: impl Into<Max>) -> Self {
        Self {
            options: QueryOptions::default(),
            inner: factory(inner, as_string),
            uri: factory(uri, as_uri),
            max: max.into(),
            merge: Rc::new(flatten),
            retrieve: RetrieveOptions::default(),
        }
    }

    pub fn with_merge(mut self, merge: impl Fn(Vec<Value>) -> Value + 'static) -> Self {
        self.merge = Rc::new(merge);
        self
    }

    pub fn with_retrieve(mut self, retrieve: RetrieveOptions) -> Self {
        self.retrieve = retrieve;
        self
    }

    async fn collect(&self, document: &DocumentRef) -> Result<Vec<Value>> {
        let mut pages = Vec::new();
        let mut current = Rc::clone(document);

        loop {
            pages.push(self.inner.on(&current).await?.unwrap_or_default());

            let Some(link) = next_link(&self.uri, &current).await? else {
                break;
            };
            if !self.max.allows(pages.len(), &pages) {
                debug!(pages = pages.len(), "Page limit reached");
                break;
            }

            debug!(uri = %link, pages = pages.len(), "Fetching next page");
            current = fetch(&self.retrieve, &link).await?;
        }

        Ok(pages)
    }
}

impl fmt::Debug for PaginateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginateQuery")
            .field("options", &self.options)
            .field("inner", &self.inner)
            .field("uri", &self.uri)
            .field("max", &self.max)
            .field("retrieve", &self.retrieve)
            .finish()
    }
}

impl Configure for PaginateQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for PaginateQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        match self.collect(document).await {
            Ok(pages) => Ok(Some(Found::Value(Value::Array(pages)))),
            Err(e) => {
                debug!(error = %e, "Pagination failed, using default");
                Ok(None)
            }
        }
    }

    async fn build<'a>(&'a self, found: Option<Found<'a>>) -> Result<Option<Value>> {
        Ok(settle(found).await?.map(|value| match value {
            Value::Array(pages) => (self.merge)(pages),
            other => other,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{self, DocumentKind, Selector};
    use crate::query::{collection, string, uri};
    use crate::retrieve::MockClient;
    use std::cell::Cell;

    fn page(title: &str, next: Option<&str>) -> String {
        let next = next
            .map(|href| format!(r#"<a class="next" href="{href}">next</a>"#))
            .unwrap_or_default();
        format!(r#"<h1>{title}</h1><ul><li>{title}-a</li><li>{title}-b</li></ul>{next}"#)
    }

    fn site() -> MockClient {
        MockClient::new()
            .with_page("http://site.test/2", page("second", Some("/3")))
            .with_page("http://site.test/3", page("third", None))
            .with_page("http://site.test/detail", "<p class=\"body\">details</p>")
            .with_failure("http://site.test/broken", 500)
    }

    fn first_page() -> DocumentRef {
        document::load(DocumentKind::Dom, page("first", Some("/2"))).unwrap()
    }

    fn options(mock: &MockClient) -> RetrieveOptions {
        RetrieveOptions::default().with_client(mock.clone())
    }

    fn next() -> crate::query::UriQuery {
        uri("a.next", "http://site.test/")
    }

    #[tokio::test]
    async fn test_follow_applies_inner_to_linked_page() {
        let mock = site();
        let doc = document::load(DocumentKind::Dom, r#"<a href="/detail">more</a>"#).unwrap();
        let query = FollowQuery::new(uri("a", "http://site.test"), ".body").with_retrieve(options(&mock));

        assert_eq!(query.on(&doc).await.unwrap(), Some(Value::from("details")));
        assert_eq!(mock.requested_uris(), vec!["http://site.test/detail"]);
    }

    #[tokio::test]
    async fn test_follow_uses_request_template() {
        let mock = site();
        let doc = document::load(DocumentKind::Dom, r#"<a href="/detail">more</a>"#).unwrap();
        let retrieve = options(&mock).with_request(
            crate::retrieve::Request::default().with_header("Cookie", "session=1"),
        );

        FollowQuery::new(uri("a", "http://site.test"), ".body")
            .with_retrieve(retrieve)
            .on(&doc)
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].headers.get("Cookie").map(String::as_str), Some("session=1"));
    }

    #[tokio::test]
    async fn test_follow_failure_resolves_to_default() {
        let mock = site();
        let doc = document::load(DocumentKind::Dom, r#"<a href="/broken">x</a>"#).unwrap();

        let query = FollowQuery::new(uri("a", "http://site.test"), ".body")
            .with_retrieve(options(&mock))
            .with_default("unavailable");
        assert_eq!(query.on(&doc).await.unwrap(), Some(Value::from("unavailable")));

        let no_default = FollowQuery::new(uri("a", "http://site.test"), ".body").with_retrieve(options(&mock));
        assert_eq!(no_default.on(&doc).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_follow_without_link_does_not_fetch() {
        let mock = site();
        let doc = document::load(DocumentKind::Dom, "<p>no links</p>").unwrap();
        let query = FollowQuery::new(uri("a", "http://site.test"), ".body").with_retrieve(options(&mock));

        assert_eq!(query.on(&doc).await.unwrap(), None);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_follow_swallows_inner_errors() {
        let mock = site();
        let doc = document::load(DocumentKind::Dom, r#"<a href="/detail">more</a>"#).unwrap();
        let query = FollowQuery::new(uri("a", "http://site.test"), string(".missing").throw_on_missing(true))
            .with_retrieve(options(&mock))
            .with_default("none");

        assert_eq!(query.on(&doc).await.unwrap(), Some(Value::from("none")));
    }

    #[tokio::test]
    async fn test_paginate_until_no_next_link() {
        let mock = site();
        let query = PaginateQuery::new("h1", next(), 0).with_retrieve(options(&mock));

        assert_eq!(
            query.on(&first_page()).await.unwrap(),
            Some(Value::from(vec!["first", "second", "third"]))
        );
        assert_eq!(
            mock.requested_uris(),
            vec!["http://site.test/2", "http://site.test/3"]
        );
    }

    #[tokio::test]
    async fn test_paginate_respects_max() {
        let mock = site();

        let one = PaginateQuery::new("h1", next(), 1).with_retrieve(options(&mock));
        assert_eq!(one.on(&first_page()).await.unwrap(), Some(Value::from(vec!["first"])));
        assert_eq!(mock.call_count(), 0);

        let two = PaginateQuery::new("h1", next(), 2).with_retrieve(options(&mock));
        assert_eq!(
            two.on(&first_page()).await.unwrap(),
            Some(Value::from(vec!["first", "second"]))
        );
    }

    #[tokio::test]
    async fn test_paginate_max_predicate_sees_pages() {
        let mock = site();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);

        let query = PaginateQuery::new(
            "h1",
            next(),
            Max::when(move |count, pages| {
                counter.set(counter.get() + 1);
                pages.last() != Some(&Value::from("second")) && count < 10
            }),
        )
        .with_retrieve(options(&mock));

        assert_eq!(
            query.on(&first_page()).await.unwrap(),
            Some(Value::from(vec!["first", "second"]))
        );
        assert_eq!(seen.get(), 2);
    }

    #[tokio::test]
    async fn test_paginate_flattens_collections_by_default() {
        let mock = site();
        let query = PaginateQuery::new(collection("li", Selector::None), next(), 2).with_retrieve(options(&mock));

        assert_eq!(
            query.on(&first_page()).await.unwrap(),
            Some(Value::from(vec!["first-a", "first-b", "second-a", "second-b"]))
        );
    }

    #[tokio::test]
    async fn test_paginate_custom_merge() {
        let mock = site();
        let query = PaginateQuery::new("h1", next(), 0)
            .with_retrieve(options(&mock))
            .with_merge(|pages| Value::from(pages.len()));

        assert_eq!(query.on(&first_page()).await.unwrap(), Some(Value::from(3usize)));
    }

    #[tokio::test]
    async fn test_paginate_failure_resolves_to_default() {
        let mock = MockClient::new();
        let query = PaginateQuery::new("h1", next(), 0)
            .with_retrieve(options(&mock))
            .with_default(Value::array());

        assert_eq!(query.on(&first_page()).await.unwrap(), Some(Value::array()));
        assert_eq!(mock.requested_uris(), vec!["http://site.test/2"]);
    }

    #[test]
    fn test_max_conversions() {
        assert!(matches!(Max::from(0), Max::Unlimited));
        assert!(matches!(Max::from(3), Max::Pages(3)));
        assert!(matches!(Max::from(None), Max::Unlimited));
        assert!(Max::Pages(2).allows(1, &[]));
        assert!(!Max::Pages(2).allows(2, &[]));
    }

    #[test]
    fn test_flatten_one_level() {
        let pages = vec![
            Value::from(vec!["a", "b"]),
            Value::from("c"),
            Value::from(vec![Value::from(vec!["d"])]),
        ];
        assert_eq!(
            flatten(pages),
            Value::from(vec![
                Value::from("a"),
                Value::from("b"),
                Value::from("c"),
                Value::from(vec!["d"]),
            ])
        );
    }
}
