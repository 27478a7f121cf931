use async_trait::async_trait;

use super::{as_string, factory, Configure, Found, Query, QueryExt, QueryOptions, QueryRef, Selectable};
use crate::document::DocumentRef;
use crate::error::Result;

/// Resolves named sub-queries against the same document and joins them
/// into an object. Keys keep the order they were given in; a sub-query
/// resolving to nothing leaves its key out.
#[derive(Debug, Clone)]
pub struct ObjectQuery {
    options: QueryOptions,
    pick: Vec<(String, QueryRef)>,
}

impl ObjectQuery {
    /// Plain selectors in `pick` become string queries.
    pub fn new<K, V>(pick: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Selectable>,
    {
        Self {
            options: QueryOptions::default(),
            pick: pick
                .into_iter()
                .map(|(key, value)| (key.into(), factory(value, as_string)))
                .collect(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pick.iter().map(|(key, _)| key.as_str())
    }
}

impl Configure for ObjectQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for ObjectQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        Ok(Some(Found::Keyed(
            self.pick
                .iter()
                .map(|(key, query)| (key.clone(), query.on(document)))
                .collect(),
        )))
    }
}
