//! Leaf queries: the plain value lookup and its string/number coercions.

use async_trait::async_trait;

use super::{settle, Configure, Found, Query, QueryOptions};
use crate::document::Selector;
use crate::error::Result;
use crate::value::Value;

/// The value at a selector, as the document stores it.
///
/// Every other stage is the pipeline default, so no default value is set.
#[derive(Debug, Clone)]
pub struct ValueQuery {
    options: QueryOptions,
}

impl ValueQuery {
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            options: QueryOptions::new(selector),
        }
    }
}

impl Configure for ValueQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for ValueQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }
}

/// The value at a selector, coerced to a string.
#[derive(Debug, Clone)]
pub struct StringQuery {
    options: QueryOptions,
}

impl StringQuery {
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            options: QueryOptions::new(selector).with_default(""),
        }
    }
}

impl Configure for StringQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for StringQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn build<'a>(&'a self, found: Option<Found<'a>>) -> Result<Option<Value>> {
        Ok(settle(found).await?.map(|value| Value::String(value.to_text())))
    }
}

/// The value at a selector, coerced to a number. Unparseable input is `NaN`.
#[derive(Debug, Clone)]
pub struct NumberQuery {
    options: QueryOptions,
}

impl NumberQuery {
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            options: QueryOptions::new(selector).with_default(f64::NAN),
        }
    }
}

impl Configure for NumberQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for NumberQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn build<'a>(&'a self, found: Option<Found<'a>>) -> Result<Option<Value>> {
        Ok(settle(found).await?.map(|value| Value::Number(value.to_number())))
    }
}
