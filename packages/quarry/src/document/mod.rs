//! Read-only documents that queries walk.
//!
//! Two layers:
//!
//! - [`Document`] is the object-safe surface queries consume
//!   (`value`, `children`, `uri`, `raw`).
//! - [`Backend`] is what a concrete store (HTML via `scraper`, JSON via
//!   `serde_json`) implements. Only [`Backend::query`] is required; the
//!   value/children/uri lookups default to delegating to it.
//!
//! [`View`] glues the two together: a shared store plus a cursor into it.
//! Child documents are new views over the *same* store, so creating them
//! is cheap and no parent pointer is kept.

pub mod dom;
pub mod json;

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::value::Value;

pub use dom::Dom;
pub use json::Json;

/// Shared handle to a document.
pub type DocumentRef = Rc<dyn Document>;

/// Escape hatch function receiving a backend's native handles.
pub type RawFn = Rc<dyn Fn(Raw<'_>) -> Option<Value>>;

/// Which backend a document is built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Dom,
    Json,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dom => f.write_str("dom"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dom" | "html" => Ok(Self::Dom),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown document kind: {other}")),
        }
    }
}

/// Native handles handed to raw functions and function selectors.
#[derive(Clone)]
pub enum Raw<'a> {
    Dom {
        html: &'a scraper::Html,
        node: ego_tree::NodeRef<'a, scraper::Node>,
    },
    Json {
        store: &'a serde_json::Value,
        node: &'a serde_json::Value,
    },
}

/// Where to look inside a document.
#[derive(Clone, Default)]
pub enum Selector {
    /// The current cursor itself.
    #[default]
    None,
    /// A delimited path string, interpreted by the backend.
    Path(String),
    /// A function evaluated against the backend's native handles.
    Func(RawFn),
}

impl Selector {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn func(f: impl Fn(Raw<'_>) -> Option<Value> + 'static) -> Self {
        Self::Func(Rc::new(f))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("<current>"),
            Self::Path(path) => write!(f, "{path:?}"),
            Self::Func(_) => f.write_str("<function>"),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<&str> for Selector {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Selector {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<&String> for Selector {
    fn from(path: &String) -> Self {
        Self::Path(path.clone())
    }
}

impl<S: Into<Selector>> From<Option<S>> for Selector {
    fn from(selector: Option<S>) -> Self {
        selector.map(Into::into).unwrap_or_default()
    }
}

/// Raw input a backend loads its store from.
#[derive(Debug, Clone)]
pub enum Body {
    Text(String),
    Json(serde_json::Value),
}

impl Body {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Json(json) => json.to_string(),
        }
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(json: serde_json::Value) -> Self {
        Self::Json(json)
    }
}

/// The read-only query surface over a document.
///
/// Every lookup returns `None` when nothing is found; that is not an error
/// and flows into the query's default substitution.
pub trait Document: fmt::Debug {
    fn kind(&self) -> DocumentKind;

    /// Resolve a leaf value.
    fn value(&self, selector: &Selector) -> Option<Value>;

    /// Resolve zero or more nested contexts as child documents.
    ///
    /// `None` means nothing addressable matched, which callers treat the
    /// same as an empty sequence.
    fn children(&self, selector: &Selector) -> Option<Vec<DocumentRef>>;

    /// Resolve a value meant as a hyperlink, preferring href-like attributes.
    fn uri(&self, selector: &Selector) -> Option<String>;

    fn link(&self, selector: &Selector) -> Option<String> {
        self.uri(selector)
    }

    /// Call `f` with the backend's native store and cursor.
    fn raw(&self, f: &RawFn) -> Option<Value>;
}

/// Result of the low-level lookup primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum Hit<C> {
    /// Addressable nodes, in document order (possibly empty).
    Nodes(Vec<C>),
    /// A computed value with no node behind it (function selectors).
    Value(Value),
}

/// Adapter contract for a concrete backing store.
pub trait Backend: Sized + 'static {
    /// Position within the store that lookups are relative to.
    type Cursor: Clone + fmt::Debug;

    /// Normalized selector.
    type Path;

    const KIND: DocumentKind;

    /// Parse the raw body into the store. Called once per document.
    fn load(body: Body) -> Result<Self, DocumentError>;

    /// Cursor addressing the whole store.
    fn whole(&self) -> Self::Cursor;

    fn load_root(&self, root: Option<Self::Cursor>) -> Self::Cursor {
        root.unwrap_or_else(|| self.whole())
    }

    fn format_selector(&self, selector: &Selector) -> Self::Path;

    /// The single lookup primitive. An identity path yields the cursor itself.
    fn query(&self, cursor: &Self::Cursor, path: &Self::Path) -> Option<Hit<Self::Cursor>>;

    /// Leaf value stored at a node.
    fn node_value(&self, cursor: &Self::Cursor) -> Option<Value>;

    /// Native handles for a node.
    fn node_raw<'a>(&'a self, cursor: &Self::Cursor) -> Option<Raw<'a>>;

    fn query_value(&self, cursor: &Self::Cursor, path: &Self::Path) -> Option<Value> {
        match self.query(cursor, path)? {
            Hit::Value(value) => Some(value),
            Hit::Nodes(nodes) => nodes.first().and_then(|node| self.node_value(node)),
        }
    }

    fn query_children(&self, cursor: &Self::Cursor, path: &Self::Path) -> Option<Vec<Self::Cursor>> {
        match self.query(cursor, path)? {
            Hit::Nodes(nodes) if !nodes.is_empty() => Some(nodes),
            _ => None,
        }
    }

    fn query_uri(&self, cursor: &Self::Cursor, path: &Self::Path) -> Option<String> {
        match self.query_value(cursor, path)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_text()),
        }
    }

    fn query_raw(&self, cursor: &Self::Cursor, f: &RawFn) -> Option<Value> {
        self.node_raw(cursor).and_then(|raw| f(raw))
    }
}

/// A document: a shared store plus a cursor into it.
pub struct View<B: Backend> {
    store: Rc<B>,
    root: B::Cursor,
}

impl<B: Backend> View<B> {
    /// Load a document from a raw body, rooted at the whole store.
    pub fn load(body: impl Into<Body>) -> Result<Self, DocumentError> {
        let store = Rc::new(B::load(body.into())?);
        Ok(Self::with_root(store, None))
    }

    /// A view over an already loaded store.
    pub fn with_root(store: Rc<B>, root: Option<B::Cursor>) -> Self {
        let root = store.load_root(root);
        Self { store, root }
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn root(&self) -> &B::Cursor {
        &self.root
    }

    /// A child document of the same kind: same store, new cursor.
    fn create(&self, root: B::Cursor) -> DocumentRef {
        Rc::new(Self::with_root(Rc::clone(&self.store), Some(root)))
    }
}

impl<B: Backend> Clone for View<B> {
    fn clone(&self) -> Self {
        Self {
            store: Rc::clone(&self.store),
            root: self.root.clone(),
        }
    }
}

impl<B: Backend> fmt::Debug for View<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("kind", &B::KIND)
            .field("root", &self.root)
            .finish()
    }
}

impl<B: Backend> Document for View<B> {
    fn kind(&self) -> DocumentKind {
        B::KIND
    }

    fn value(&self, selector: &Selector) -> Option<Value> {
        let path = self.store.format_selector(selector);
        self.store.query_value(&self.root, &path)
    }

    fn children(&self, selector: &Selector) -> Option<Vec<DocumentRef>> {
        let path = self.store.format_selector(selector);
        self.store
            .query_children(&self.root, &path)
            .map(|roots| roots.into_iter().map(|root| self.create(root)).collect())
    }

    fn uri(&self, selector: &Selector) -> Option<String> {
        let path = self.store.format_selector(selector);
        self.store.query_uri(&self.root, &path)
    }

    fn raw(&self, f: &RawFn) -> Option<Value> {
        self.store.query_raw(&self.root, f)
    }
}

/// Load a document of the given kind from a raw body.
pub fn load(kind: DocumentKind, body: impl Into<Body>) -> Result<DocumentRef, DocumentError> {
    let document: DocumentRef = match kind {
        DocumentKind::Dom => Rc::new(View::<Dom>::load(body)?),
        DocumentKind::Json => Rc::new(View::<Json>::load(body)?),
    };
    Ok(document)
}
