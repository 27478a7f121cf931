use async_trait::async_trait;
use futures::FutureExt;

use super::{as_string, factory, Configure, Found, Query, QueryExt, QueryOptions, QueryRef, Selectable};
use crate::document::{DocumentRef, Selector};
use crate::error::Result;
use crate::value::Value;

/// Applies an inner query to every child at a selector.
///
/// Results keep document order and are resolved together. A child whose
/// inner query resolves to nothing contributes `null`. No matching
/// children gives the default, an empty array.
#[derive(Debug, Clone)]
pub struct CollectionQuery {
    options: QueryOptions,
    inner: QueryRef,
}

impl CollectionQuery {
    pub fn new(selector: impl Into<Selector>, inner: impl Into<Selectable>) -> Self {
        Self {
            options: QueryOptions::new(selector).with_default(Value::array()),
            inner: factory(inner, as_string),
        }
    }

    /// Keep only the items matching `predicate`.
    ///
    /// Runs as a format step, after any transforms added before it.
    pub fn with_filter(self, predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        self.with_format(move |value| match value {
            Value::Array(items) => items.into_iter().filter(|item| predicate(item)).collect(),
            other => other,
        })
    }
}

impl Configure for CollectionQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for CollectionQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        let Some(children) = document.children(&self.options.selector) else {
            return Ok(None);
        };

        let inner = &self.inner;
        Ok(Some(Found::Sequence(
            children
                .into_iter()
                .map(|child| async move { inner.on(&child).await }.boxed_local())
                .collect(),
        )))
    }
}

/// Applies an inner query to the first child at a selector.
///
/// The default only applies when there is no such child. Whatever the
/// inner query resolves to, including its own default or nothing at all,
/// is returned as is.
#[derive(Debug, Clone)]
pub struct ContextQuery {
    options: QueryOptions,
    inner: QueryRef,
}

impl ContextQuery {
    pub fn new(selector: impl Into<Selector>, inner: impl Into<Selectable>) -> Self {
        Self {
            options: QueryOptions::new(selector),
            inner: factory(inner, as_string),
        }
    }
}

impl Configure for ContextQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for ContextQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        let first = document
            .children(&self.options.selector)
            .and_then(|children| children.into_iter().next());

        let Some(child) = first else {
            return Ok(None);
        };

        Ok(Some(Found::Settled(self.inner.on(&child).await?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{self, DocumentKind};
    use crate::error::Error;
    use crate::pick;
    use crate::query::{number, string, value};
    use proptest::prelude::*;

    const LIST: &str = r#"
        <ul>
          <li><span class="name">one</span><span class="n">1</span></li>
          <li><span class="name">two</span><span class="n">2</span></li>
          <li><span class="name">three</span></li>
        </ul>
    "#;

    fn list() -> DocumentRef {
        document::load(DocumentKind::Dom, LIST).unwrap()
    }

    #[tokio::test]
    async fn test_collection_preserves_order() {
        let query = CollectionQuery::new("li", ".name");
        assert_eq!(
            query.on(&list()).await.unwrap(),
            Some(Value::from(vec!["one", "two", "three"]))
        );
    }

    #[tokio::test]
    async fn test_collection_order_ignores_resolution_latency() {
        use std::cell::RefCell;
        use std::rc::Rc;
        use std::time::Duration;

        let document = document::load(
            DocumentKind::Json,
            r#"[{"id": "0", "delay": 90}, {"id": "1", "delay": 60}, {"id": "2", "delay": 30}]"#,
        )
        .unwrap();
        let finished = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&finished);
        let query = CollectionQuery::new(
            Selector::None,
            crate::query::callback(move |item| {
                let log = Rc::clone(&log);
                async move {
                    let delay = item.number("delay").await?.map_or(0.0, |d| d.to_number());
                    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
                    let id = item.string("id").await?;
                    log.borrow_mut().push(id.clone().unwrap_or_default());
                    Ok::<_, Error>(id)
                }
            }),
        );

        assert_eq!(
            query.on(&document).await.unwrap(),
            Some(Value::from(vec!["0", "1", "2"]))
        );
        assert_eq!(
            *finished.borrow(),
            vec![Value::from("2"), Value::from("1"), Value::from("0")]
        );
    }

    #[tokio::test]
    async fn test_collection_of_objects() {
        let query = CollectionQuery::new(
            "li",
            pick! {
                "name" => ".name",
                "n" => value(".n"),
            },
        );

        let result = query.on(&list()).await.unwrap().unwrap();
        let items = result.as_array().unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[1].get("n"), Some(&Value::from("2")));
        // Missing keys are dropped from each object
        assert_eq!(items[2].get("n"), None);
    }

    #[tokio::test]
    async fn test_missing_items_become_null() {
        let query = CollectionQuery::new("li", value(".n"));
        assert_eq!(
            query.on(&list()).await.unwrap(),
            Some(Value::from(vec![Value::from("1"), Value::from("2"), Value::Null]))
        );
    }

    #[tokio::test]
    async fn test_no_children_is_empty_array() {
        let query = CollectionQuery::new("table tr", "td");
        assert_eq!(query.on(&list()).await.unwrap(), Some(Value::array()));
    }

    #[tokio::test]
    async fn test_filter_runs_after_earlier_formats() {
        let query = CollectionQuery::new("li", number(".n"))
            .with_format(|v| match v {
                Value::Array(items) => items
                    .into_iter()
                    .map(|n| Value::from(n.to_number() * 10.0))
                    .collect(),
                other => other,
            })
            .with_filter(|n| n.as_f64().is_some_and(|n| n > 10.0));

        assert_eq!(query.on(&list()).await.unwrap(), Some(Value::from(vec![20])));
    }

    #[tokio::test]
    async fn test_failing_item_fails_collection() {
        let query = CollectionQuery::new("li", string(".n").throw_on_missing(true));
        let err = query.on(&list()).await.unwrap_err();
        assert!(matches!(err, Error::MissingValue { .. }));
    }

    #[tokio::test]
    async fn test_context_uses_first_child() {
        let query = ContextQuery::new("li", ".name");
        assert_eq!(query.on(&list()).await.unwrap(), Some(Value::from("one")));
    }

    #[tokio::test]
    async fn test_context_default_only_without_child() {
        let missing = ContextQuery::new("table", ".name").with_default("fallback");
        assert_eq!(missing.on(&list()).await.unwrap(), Some(Value::from("fallback")));

        // The inner query's own result is never re-defaulted
        let inner_missing = ContextQuery::new("li", value(".nope")).with_default("fallback");
        assert_eq!(inner_missing.on(&list()).await.unwrap(), None);

        let inner_default = ContextQuery::new("li", ".nope").with_default("fallback");
        assert_eq!(inner_default.on(&list()).await.unwrap(), Some(Value::from("")));
    }

    proptest! {
        #[test]
        fn prop_collection_follows_array_order(items in prop::collection::vec("[a-z]{0,8}", 0..20)) {
            let doc = document::load(DocumentKind::Json, serde_json::json!({ "items": items.clone() })).unwrap();
            let query = CollectionQuery::new("items", value(Selector::None));

            let result = tokio_test::block_on(query.on(&doc)).unwrap();
            prop_assert_eq!(result, Some(Value::from(items)));
        }
    }
}
