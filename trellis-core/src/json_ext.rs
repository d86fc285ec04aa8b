//! JSON aliases and helpers shared across the execution core.

use std::fmt;
use std::fmt::Write;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Map;

/// A JSON value backed by reference-counted byte strings, so responses can be
/// cloned without copying string data.
pub type Json = serde_json_bytes::Value;

/// A JSON object.
pub type Object = Map<ByteString, Json>;

/// A GraphQL response path element, either a field response key or a list
/// index.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathElement {
    /// An index path element.
    Index(usize),

    /// A field response key path element.
    Key(String),
}

/// A path into a GraphQL response, as carried by the `path` entry of a
/// response error.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a new path with `key` appended.
    pub fn join_key(&self, key: impl Into<String>) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Key(key.into()));
        Self(elements)
    }

    /// Returns a new path with list index `index` appended.
    pub fn join_index(&self, index: usize) -> Self {
        let mut elements = self.0.clone();
        elements.push(PathElement::Index(index));
        Self(elements)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathElement> {
        self.0.iter()
    }
}

impl From<&str> for Path {
    /// Parses a dotted path such as `friends.0.name`. Segments that parse as
    /// integers become indices.
    fn from(value: &str) -> Self {
        Self(
            value
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(|segment| match segment.parse::<usize>() {
                    Ok(index) => PathElement::Index(index),
                    Err(_) => PathElement::Key(segment.to_string()),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            match element {
                PathElement::Index(index) => write!(f, "{index}")?,
                PathElement::Key(key) => f.write_str(key)?,
            }
        }
        Ok(())
    }
}

/// Hashes a JSON value in a structure-sensitive, order-insensitive way.
///
/// Object entries are hashed in key order so that two objects that compare
/// equal through [`Map`]'s order-independent equality also hash equally.
pub(crate) fn hash_json<H: Hasher>(value: &Json, state: &mut H) {
    match value {
        Json::Null => state.write_u8(0),
        Json::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Json::Number(n) => {
            state.write_u8(2);
            if let Some(i) = n.as_i64() {
                i.hash(state);
            } else if let Some(u) = n.as_u64() {
                u.hash(state);
            } else if let Some(f) = n.as_f64() {
                f.to_bits().hash(state);
            }
        }
        Json::String(s) => {
            state.write_u8(3);
            s.as_str().hash(state);
        }
        Json::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_json(item, state);
            }
        }
        Json::Object(map) => {
            state.write_u8(5);
            state.write_usize(map.len());
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(key, _)| key.as_str());
            for (key, entry) in entries {
                key.as_str().hash(state);
                hash_json(entry, state);
            }
        }
    }
}
