use async_trait::async_trait;
use regex::Regex;

use super::{Configure, Found, Query, QueryOptions};
use crate::document::{DocumentRef, Selector};
use crate::error::Result;
use crate::value::Value;

/// Matches a pattern against the text at a selector.
///
/// With a group index the result is that capture group; without one it is
/// the whole match followed by every group (unmatched groups are null).
/// No match, a missing group, or a missing input all fall to the default,
/// which is an empty array.
#[derive(Debug, Clone)]
pub struct RegexQuery {
    options: QueryOptions,
    pattern: Regex,
    group: Option<usize>,
}

impl RegexQuery {
    pub fn new(selector: impl Into<Selector>, pattern: Regex, group: impl Into<Option<usize>>) -> Self {
        Self {
            options: QueryOptions::new(selector).with_default(Value::array()),
            pattern,
            group: group.into(),
        }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    fn matches(&self, text: &str) -> Option<Value> {
        let captures = self.pattern.captures(text)?;

        match self.group {
            Some(group) => captures.get(group).map(|m| Value::from(m.as_str())),
            None => Some(
                captures
                    .iter()
                    .map(|m| m.map(|m| Value::from(m.as_str())).unwrap_or_default())
                    .collect(),
            ),
        }
    }
}

impl Configure for RegexQuery {
    fn options_mut(&mut self) -> &mut QueryOptions {
        &mut self.options
    }
}

#[async_trait(?Send)]
impl Query for RegexQuery {
    fn options(&self) -> &QueryOptions {
        &self.options
    }

    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        Ok(document
            .value(&self.options.selector)
            .and_then(|input| self.matches(&input.to_text()))
            .map(Found::Value))
    }
}
