//! JSON documents backed by `serde_json`.
//!
//! Paths use property-access syntax: `store.items[0].name` (or
//! `store.items.0.name`). Cursors are JSON pointers into the shared value.

use super::{Backend, Body, DocumentKind, Hit, Raw, RawFn, Selector};
use crate::error::DocumentError;
use crate::value::Value;

/// A parsed JSON document.
pub struct Json {
    store: serde_json::Value,
}

impl Json {
    pub fn store(&self) -> &serde_json::Value {
        &self.store
    }
}

/// Normalized JSON path.
pub enum JsonPath {
    Current,
    Segments(Vec<String>),
    Func(RawFn),
}

/// Split a property path into segments: `a.b[0]["c.d"]` → `a`, `b`, `0`, `c.d`.
fn parse_segments(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let quote = chars.next_if(|c| *c == '"' || *c == '\'');
                let mut key = String::new();
                while let Some(c) = chars.next() {
                    if Some(c) == quote && chars.peek() == Some(&']') {
                        chars.next();
                        break;
                    }
                    if quote.is_none() && c == ']' {
                        break;
                    }
                    key.push(c);
                }
                segments.push(key);
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

/// Escape a key for use as a JSON pointer token.
fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

impl Backend for Json {
    type Cursor = String;
    type Path = JsonPath;

    const KIND: DocumentKind = DocumentKind::Json;

    fn load(body: Body) -> Result<Self, DocumentError> {
        let store = match body {
            Body::Json(json) => json,
            Body::Text(text) => serde_json::from_str(&text)?,
        };
        Ok(Self { store })
    }

    fn whole(&self) -> String {
        String::new()
    }

    fn format_selector(&self, selector: &Selector) -> JsonPath {
        match selector {
            Selector::None => JsonPath::Current,
            Selector::Func(f) => JsonPath::Func(f.clone()),
            Selector::Path(path) => {
                let segments = parse_segments(path);
                if segments.is_empty() {
                    JsonPath::Current
                } else {
                    JsonPath::Segments(segments)
                }
            }
        }
    }

    fn query(&self, cursor: &String, path: &JsonPath) -> Option<Hit<String>> {
        let segments = match path {
            JsonPath::Current => return Some(Hit::Nodes(vec![cursor.clone()])),
            JsonPath::Func(f) => return self.node_raw(cursor).and_then(|raw| f(raw)).map(Hit::Value),
            JsonPath::Segments(segments) => segments,
        };

        let mut node = self.store.pointer(cursor)?;
        let mut pointer = cursor.clone();

        for segment in segments {
            node = match node {
                serde_json::Value::Object(map) => map.get(segment)?,
                serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
            pointer.push('/');
            pointer.push_str(&escape_token(segment));
        }

        Some(Hit::Nodes(vec![pointer]))
    }

    fn node_value(&self, cursor: &String) -> Option<Value> {
        self.store.pointer(cursor).map(Value::from)
    }

    fn node_raw<'a>(&'a self, cursor: &String) -> Option<Raw<'a>> {
        let node = self.store.pointer(cursor)?;
        Some(Raw::Json {
            store: &self.store,
            node,
        })
    }

    /// Arrays yield one child per element; any other node is its own single child.
    fn query_children(&self, cursor: &String, path: &JsonPath) -> Option<Vec<String>> {
        let Hit::Nodes(nodes) = self.query(cursor, path)? else {
            return None;
        };
        let pointer = nodes.into_iter().next()?;

        match self.store.pointer(&pointer)? {
            serde_json::Value::Array(items) => Some(
                (0..items.len())
                    .map(|i| format!("{pointer}/{i}"))
                    .collect(),
            ),
            _ => Some(vec![pointer]),
        }
    }
}
