//! Queries: composable descriptions of how to extract a value.
//!
//! Every query resolves through the same four stages, always in order:
//!
//! 1. **find** - look the raw value up in the document (variant specific)
//! 2. **substitute** - fall back to the default, or fail if configured to
//! 3. **build** - join pending sub-results and coerce (variant specific)
//! 4. **format** - run the configured transforms, left to right
//!
//! Variants customise the pipeline only by overriding individual stages of
//! [`Query`]. The pipeline itself lives in [`QueryExt::on`], which has a
//! blanket implementation and so cannot be reordered by a variant.
//!
//! # Usage
//!
//! ```rust,ignore
//! use quarry::{pick, query};
//!
//! let products = query::collection(
//!     "li.product",
//!     pick! {
//!         "name" => "a",
//!         "price" => query::number(".price"),
//!         "url" => query::uri("a", "https://shop.example"),
//!     },
//! );
//! let result = products.on(&document).await?;
//! ```

mod callback;
mod collection;
mod follow;
mod object;
mod regex;
mod scalar;
mod uri;

use std::fmt;
use std::future::Future;
use std::rc::Rc;

use async_trait::async_trait;
use futures::future::{try_join_all, FutureExt, LocalBoxFuture};

use crate::document::{DocumentRef, Raw, Selector};
use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::value::Value;

pub use self::callback::{CallbackFn, CallbackQuery, RawQuery};
pub use self::collection::{CollectionQuery, ContextQuery};
pub use self::follow::{flatten, FollowQuery, Max, MergeFn, PaginateQuery};
pub use self::object::ObjectQuery;
pub use self::regex::RegexQuery;
pub use self::scalar::{NumberQuery, StringQuery, ValueQuery};
pub use self::uri::{resolve_link, UriQuery};

/// Shared, immutable handle to a configured query.
pub type QueryRef = Rc<dyn Query>;

/// A sub-query result that has not been awaited yet.
pub type Pending<'a> = LocalBoxFuture<'a, Result<Option<Value>>>;

/// A transform applied during the format stage.
pub type FormatFn = Rc<dyn Fn(Value) -> Value>;

/// What the find stage produced.
pub enum Found<'a> {
    /// A raw value straight from the document.
    Value(Value),
    /// Already resolved by a sub-query. Passed through the default stage
    /// untouched, even when the sub-query resolved to nothing.
    Settled(Option<Value>),
    /// Named sub-results, joined into an object by the build stage.
    Keyed(Vec<(String, Pending<'a>)>),
    /// Positional sub-results, joined into an array by the build stage.
    Sequence(Vec<Pending<'a>>),
}

impl From<Value> for Found<'_> {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Found<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Settled(value) => f.debug_tuple("Settled").field(value).finish(),
            Self::Keyed(entries) => f
                .debug_list()
                .entries(entries.iter().map(|(key, _)| key))
                .finish(),
            Self::Sequence(pending) => write!(f, "Sequence({} pending)", pending.len()),
        }
    }
}

/// Join whatever the find stage produced into a single value.
///
/// Sub-results are awaited together and the join is all-or-nothing: the
/// first failing sub-query fails the whole value. Order is preserved. A
/// missing sub-result drops its key from an object and becomes `Null` in
/// an array.
pub async fn settle(found: Option<Found<'_>>) -> Result<Option<Value>> {
    match found {
        None => Ok(None),
        Some(Found::Value(value)) => Ok(Some(value)),
        Some(Found::Settled(value)) => Ok(value),
        Some(Found::Keyed(entries)) => {
            let (keys, pending): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
            let values = try_join_all(pending).await?;
            Ok(Some(Value::Object(
                keys.into_iter()
                    .zip(values)
                    .filter_map(|(key, value)| value.map(|value| (key, value)))
                    .collect(),
            )))
        }
        Some(Found::Sequence(pending)) => {
            let values = try_join_all(pending).await?;
            Ok(Some(Value::Array(
                values.into_iter().map(Option::unwrap_or_default).collect(),
            )))
        }
    }
}

/// Options every query carries.
#[derive(Clone, Default)]
pub struct QueryOptions {
    /// Where to look in the document.
    pub selector: Selector,

    /// Value substituted when nothing is found.
    pub default: Option<Value>,

    /// Fail with [`Error::MissingValue`] instead of substituting the default.
    pub throw_on_missing: bool,

    /// Transforms applied to the built value, in order.
    pub format: Vec<FormatFn>,
}

impl QueryOptions {
    pub fn new(selector: impl Into<Selector>) -> Self {
        Self {
            selector: selector.into(),
            ..Default::default()
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

impl fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptions")
            .field("selector", &self.selector)
            .field("default", &self.default)
            .field("throw_on_missing", &self.throw_on_missing)
            .field("format", &self.format.len())
            .finish()
    }
}

/// Builder methods shared by every query variant.
pub trait Configure: Sized {
    fn options_mut(&mut self) -> &mut QueryOptions;

    /// Set the value substituted when nothing is found.
    fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.options_mut().default = Some(value.into());
        self
    }

    /// Resolve to nothing, rather than a variant default, when nothing is found.
    fn without_default(mut self) -> Self {
        self.options_mut().default = None;
        self
    }

    /// Fail instead of substituting the default.
    fn throw_on_missing(mut self, throw: bool) -> Self {
        self.options_mut().throw_on_missing = throw;
        self
    }

    /// Append a transform to the format stage.
    fn with_format(mut self, f: impl Fn(Value) -> Value + 'static) -> Self {
        self.options_mut().format.push(Rc::new(f));
        self
    }
}

/// The stages of query resolution.
///
/// Implementors provide [`Query::options`] and override whichever stages
/// differ from the plain value lookup.
#[async_trait(?Send)]
pub trait Query: fmt::Debug {
    fn options(&self) -> &QueryOptions;

    /// Look the raw value up in the document.
    async fn find<'a>(&'a self, document: &'a DocumentRef) -> Result<Option<Found<'a>>> {
        Ok(document.value(&self.options().selector).map(Found::Value))
    }

    /// Pass a found value through, or substitute the default.
    fn substitute<'a>(&self, found: Option<Found<'a>>) -> Result<Option<Found<'a>>> {
        if found.is_some() {
            return Ok(found);
        }

        let options = self.options();
        if options.throw_on_missing {
            return Err(Error::MissingValue {
                selector: options.selector.to_string(),
            });
        }

        Ok(options.default.clone().map(Found::Value))
    }

    /// Join pending sub-results and coerce.
    async fn build<'a>(&'a self, found: Option<Found<'a>>) -> Result<Option<Value>> {
        settle(found).await
    }

    /// Apply the format transforms to a present value.
    fn format(&self, value: Option<Value>) -> Option<Value> {
        value.map(|value| self.options().format.iter().fold(value, |acc, f| f(acc)))
    }
}

/// Execution of a query against a document.
pub trait QueryExt: Query {
    /// Run the four stages against `document`.
    ///
    /// Always asynchronous, whether or not any stage suspends.
    fn on<'a>(&'a self, document: &'a DocumentRef) -> Pending<'a> {
        async move {
            let found = self.find(document).await?;
            let found = self.substitute(found)?;
            let built = self.build(found).await?;
            Ok(self.format(built))
        }
        .boxed_local()
    }
}

impl<Q: Query + ?Sized> QueryExt for Q {}

/// Anything a query can be inferred from.
#[derive(Clone)]
pub enum Selectable {
    /// An already configured query, used as is.
    Query(QueryRef),
    /// Named sub-queries, becoming an object query.
    Mapping(Vec<(String, Selectable)>),
    /// A function over a scope, becoming a callback query.
    Callback(CallbackFn),
    /// A selector, becoming the caller's fallback variant.
    Selector(Selector),
}

impl Selectable {
    /// A callback from a plain async function.
    pub fn callback<F, Fut>(f: F) -> Self
    where
        F: Fn(Scope) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        Self::Callback(Rc::new(move |scope| f(scope).boxed_local()))
    }
}

impl fmt::Debug for Selectable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(query) => f.debug_tuple("Query").field(query).finish(),
            Self::Mapping(pick) => f.debug_tuple("Mapping").field(pick).finish(),
            Self::Callback(_) => f.write_str("Callback"),
            Self::Selector(selector) => f.debug_tuple("Selector").field(selector).finish(),
        }
    }
}

impl From<QueryRef> for Selectable {
    fn from(query: QueryRef) -> Self {
        Self::Query(query)
    }
}

impl From<Selector> for Selectable {
    fn from(selector: Selector) -> Self {
        Self::Selector(selector)
    }
}

impl From<&str> for Selectable {
    fn from(path: &str) -> Self {
        Self::Selector(path.into())
    }
}

impl From<String> for Selectable {
    fn from(path: String) -> Self {
        Self::Selector(path.into())
    }
}

impl<K: Into<String>, V: Into<Selectable>> From<Vec<(K, V)>> for Selectable {
    fn from(pick: Vec<(K, V)>) -> Self {
        Self::Mapping(
            pick.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Conversions from each concrete query into `Selectable` and `QueryRef`.
macro_rules! impl_query_conversions {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Selectable {
                fn from(query: $ty) -> Self {
                    Self::Query(Rc::new(query))
                }
            }

            impl From<$ty> for QueryRef {
                fn from(query: $ty) -> Self {
                    Rc::new(query)
                }
            }
        )*
    };
}

impl_query_conversions!(
    ValueQuery,
    StringQuery,
    NumberQuery,
    RegexQuery,
    UriQuery,
    ObjectQuery,
    CollectionQuery,
    ContextQuery,
    FollowQuery,
    PaginateQuery,
    CallbackQuery,
    RawQuery,
);

/// Builds the query used when the input is a plain selector.
pub type Fallback = fn(Selector) -> QueryRef;

/// Infer a query from `input`.
///
/// Checked in a fixed order: an existing query is returned as is (never
/// re-wrapped), a mapping becomes an object query, a callback becomes a
/// callback query, and anything else goes to `fallback`.
pub fn factory(input: impl Into<Selectable>, fallback: Fallback) -> QueryRef {
    match input.into() {
        Selectable::Query(query) => query,
        Selectable::Mapping(pick) => Rc::new(ObjectQuery::new(pick)),
        Selectable::Callback(f) => Rc::new(CallbackQuery::from_fn(f)),
        Selectable::Selector(selector) => fallback(selector),
    }
}

/// Fallback producing a string query.
pub fn as_string(selector: Selector) -> QueryRef {
    Rc::new(StringQuery::new(selector))
}

/// Fallback producing a plain value query.
pub fn as_value(selector: Selector) -> QueryRef {
    Rc::new(ValueQuery::new(selector))
}

/// Fallback producing a URI query with no base.
pub fn as_uri(selector: Selector) -> QueryRef {
    Rc::new(UriQuery::new(selector, ""))
}

/// The raw value at `selector`, with no coercion and no default.
pub fn value(selector: impl Into<Selector>) -> ValueQuery {
    ValueQuery::new(selector)
}

/// The value at `selector` as a string; defaults to `""`.
pub fn string(selector: impl Into<Selector>) -> StringQuery {
    StringQuery::new(selector)
}

/// The value at `selector` as a number; defaults to `NaN`.
pub fn number(selector: impl Into<Selector>) -> NumberQuery {
    NumberQuery::new(selector)
}

/// A capture group of `pattern` matched against the value at `selector`,
/// or every group when `group` is `None`.
pub fn regex(
    selector: impl Into<Selector>,
    pattern: ::regex::Regex,
    group: impl Into<Option<usize>>,
) -> RegexQuery {
    RegexQuery::new(selector, pattern, group)
}

/// The link at `selector`, resolved against `base`.
pub fn uri(selector: impl Into<Selector>, base: impl Into<String>) -> UriQuery {
    UriQuery::new(selector, base)
}

/// Alias of [`uri`].
pub fn link(selector: impl Into<Selector>, base: impl Into<String>) -> UriQuery {
    UriQuery::new(selector, base)
}

/// An object with one entry per named sub-query.
pub fn object<K, V>(pick: impl IntoIterator<Item = (K, V)>) -> ObjectQuery
where
    K: Into<String>,
    V: Into<Selectable>,
{
    ObjectQuery::new(pick)
}

/// `inner` applied to every child at `selector`.
pub fn collection(selector: impl Into<Selector>, inner: impl Into<Selectable>) -> CollectionQuery {
    CollectionQuery::new(selector, inner)
}

/// `inner` applied to the first child at `selector`.
pub fn context(selector: impl Into<Selector>, inner: impl Into<Selectable>) -> ContextQuery {
    ContextQuery::new(selector, inner)
}

/// `inner` applied to the page the `uri` query links to.
pub fn follow(uri: impl Into<Selectable>, inner: impl Into<Selectable>) -> FollowQuery {
    FollowQuery::new(uri, inner)
}

/// `inner` applied to every page reachable through the `uri` query.
pub fn paginate(
    inner: impl Into<Selectable>,
    uri: impl Into<Selectable>,
    max: impl Into<Max>,
) -> PaginateQuery {
    PaginateQuery::new(inner, uri, max)
}

/// An arbitrary async function over a scope of the document.
pub fn callback<F, Fut>(f: F) -> CallbackQuery
where
    F: Fn(Scope) -> Fut + 'static,
    Fut: Future<Output = Result<Option<Value>>> + 'static,
{
    CallbackQuery::new(f)
}

/// An arbitrary function over the backend's native handles.
pub fn raw(f: impl Fn(Raw<'_>) -> Option<Value> + 'static) -> RawQuery {
    RawQuery::new(f)
}

/// Build a mapping of named sub-queries for [`object`] and friends.
///
/// ```rust,ignore
/// let person = query::object(pick! {
///     "name" => "h1",
///     "age" => query::number(".age"),
/// });
/// ```
#[macro_export]
macro_rules! pick {
    ($($key:expr => $value:expr),* $(,)?) => {
        vec![
            $((
                ::std::string::String::from($key),
                $crate::query::Selectable::from($value),
            )),*
        ]
    };
}
