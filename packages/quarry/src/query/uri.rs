use async_trait::async_trait;
use url::Url;

use super::{settle, Configure, Found, Query, QueryOptions};
use crate::document::{DocumentRef, Selector};
use crate::error::{Error, Result};
use crate::value::Value;

/// Resolve `link` against `base` the way a browser resolves an anchor.
///
/// An empty base requires `link` to be absolute. The result is normalized,
/// so `http://uri.com` comes back as `http://uri.com/`.
pub fn resolve_link(base: &str, link: &str) -> Result<String> {
    let resolved = if base.is_empty() {
        Url::parse(link)
    } else {
        Url::parse(base).and_then(|base| base.join(link))
    };

    resolved
        .map(String::from)
        .map_err(|source| Error::MalformedLink {
            link: link.to_string(),
            base: base.to_string(),
            source,
        })
}

/// A string query that reads href-like values and resolves them to
/// absolute URIs.
#[derive(Debug, Clone)]
pub struct UriQuery {
    options: QueryOptions,
    base: String,
}

impl UriQuery {
    pub fn new(selector: impl Into<Selector>, base: impl Into<String>) -> Self {
        Self {
            options: QueryOptions::new(selector).with_default(""),
            base: base.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }
}

impl Configure for UriQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for UriQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        let Some(link) = document.uri(&self.options.selector) else {
            return Ok(None);
        };

        let resolved = resolve_link(&self.base, &link)?;
        Ok(Some(Found::Value(Value::String(resolved))))
    }

    async fn build<'a>(&'a self, found: Option<Found<'a>>) -> Result<Option<Value>> {
        Ok(settle(found).await?.map(|value| Value::String(value.to_text())))
    }
}
