//! HTML documents backed by `scraper`.
//!
//! Paths are `"<css selector>/<attribute>"`. The CSS part may be empty to
//! address the current node, and the attribute part is optional:
//!
//! - `"h1"` - text of the matched elements
//! - `"a.next/href"` - the `href` of the first matched element
//! - `"/data-id"` - an attribute of the current element

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector as Css};
use tracing::debug;

use super::{Backend, Body, DocumentKind, Hit, Raw, RawFn, Selector};
use crate::error::DocumentError;
use crate::value::Value;

/// Attributes tried, in order, when a link is requested without naming one.
const LINK_ATTRIBUTES: &[&str] = &["href"];

/// A parsed HTML document.
pub struct Dom {
    html: Html,
}

impl Dom {
    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Matched element ids, in document order.
    fn select(&self, cursor: NodeId, selector: &Css) -> Vec<NodeId> {
        let Some(node) = self.html.tree.get(cursor) else {
            return Vec::new();
        };

        match ElementRef::wrap(node) {
            Some(element) => element.select(selector).map(|el| el.id()).collect(),
            // The document node itself is not an element.
            None => self.html.select(selector).map(|el| el.id()).collect(),
        }
    }

    fn text(&self, id: NodeId) -> String {
        self.html
            .tree
            .get(id)
            .map(|node| {
                node.descendants()
                    .filter_map(|n| n.value().as_text())
                    .map(|text| &**text)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.html
            .tree
            .get(id)
            .and_then(ElementRef::wrap)
            .and_then(|el| el.value().attr(name))
            .map(String::from)
    }

    /// Resolve a path to a value: the named attribute if there is one, else
    /// the first fallback attribute present, else the non-empty text.
    fn element_value(&self, cursor: &NodeId, path: &DomPath, fallback: &[&str]) -> Option<Value> {
        let nodes = match self.query(cursor, path)? {
            Hit::Value(value) => return Some(value),
            Hit::Nodes(nodes) => nodes,
        };
        let first = *nodes.first()?;

        if let Some(name) = path.attr() {
            return self.attr(first, name).map(Value::String);
        }

        if let Some(found) = fallback.iter().find_map(|name| self.attr(first, name)) {
            return Some(Value::String(found));
        }

        let text: String = nodes.iter().map(|id| self.text(*id)).collect();
        (!text.is_empty()).then_some(Value::String(text))
    }
}

/// Normalized DOM path.
pub enum DomPath {
    Current { attr: Option<String> },
    Css { selector: Css, attr: Option<String> },
    Func(RawFn),
    /// A CSS selector that failed to parse; never matches.
    Invalid,
}

impl DomPath {
    fn attr(&self) -> Option<&str> {
        match self {
            Self::Current { attr } | Self::Css { attr, .. } => attr.as_deref(),
            _ => None,
        }
    }
}

/// Split `"css/attr"` at the first slash outside brackets and quotes, so
/// selectors like `a[href="/about"]` stay intact.
fn split_path(path: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in path.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '/' if depth == 0 => return (&path[..i], Some(&path[i + 1..])),
                _ => {}
            },
        }
    }

    (path, None)
}

impl Backend for Dom {
    type Cursor = NodeId;
    type Path = DomPath;

    const KIND: DocumentKind = DocumentKind::Dom;

    fn load(body: Body) -> Result<Self, DocumentError> {
        Ok(Self {
            html: Html::parse_document(&body.into_text()),
        })
    }

    fn whole(&self) -> NodeId {
        self.html.tree.root().id()
    }

    fn format_selector(&self, selector: &Selector) -> DomPath {
        let path = match selector {
            Selector::None => return DomPath::Current { attr: None },
            Selector::Func(f) => return DomPath::Func(f.clone()),
            Selector::Path(path) => path,
        };

        let (css, attr) = split_path(path);
        let attr = attr
            .map(|a| a.split('/').next().unwrap_or_default().trim())
            .filter(|a| !a.is_empty())
            .map(String::from);

        let css = css.trim();
        if css.is_empty() {
            return DomPath::Current { attr };
        }

        match Css::parse(css) {
            Ok(selector) => DomPath::Css { selector, attr },
            Err(e) => {
                debug!(selector = %css, error = ?e, "Invalid CSS selector");
                DomPath::Invalid
            }
        }
    }

    fn query(&self, cursor: &NodeId, path: &DomPath) -> Option<Hit<NodeId>> {
        match path {
            DomPath::Current { .. } => Some(Hit::Nodes(vec![*cursor])),
            DomPath::Css { selector, .. } => Some(Hit::Nodes(self.select(*cursor, selector))),
            DomPath::Func(f) => self.node_raw(cursor).and_then(|raw| f(raw)).map(Hit::Value),
            DomPath::Invalid => None,
        }
    }

    fn node_value(&self, cursor: &NodeId) -> Option<Value> {
        let text = self.text(*cursor);
        (!text.is_empty()).then_some(Value::String(text))
    }

    fn node_raw<'a>(&'a self, cursor: &NodeId) -> Option<Raw<'a>> {
        let node = self.html.tree.get(*cursor)?;
        Some(Raw::Dom {
            html: &self.html,
            node,
        })
    }

    fn query_value(&self, cursor: &NodeId, path: &DomPath) -> Option<Value> {
        self.element_value(cursor, path, &[])
    }

    fn query_uri(&self, cursor: &NodeId, path: &DomPath) -> Option<String> {
        self.element_value(cursor, path, LINK_ATTRIBUTES)
            .map(|value| value.to_text())
    }
}
