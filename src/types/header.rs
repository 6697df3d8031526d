//! The parsed, in-memory representation of a header.
//!
//! A [`HeaderTree`] is an ordered list of `(name, value)` pairs with a name index on the
//! side. Entry order is on-disk order and is what the writer walks when it needs to match
//! a descriptor, so inserts of an existing name overwrite in place.

use crate::error::{HeaderError, Result};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// A single header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Int(i64),
    Float(f64),
    /// Fixed or field-counted array of scalars.
    Array(Vec<HeaderValue>),
    Bytes(Vec<u8>),
    /// Repeated sub-records, one tree each.
    Records(Vec<HeaderTree>),
}

impl HeaderValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            HeaderValue::Int(_) => "int",
            HeaderValue::Float(_) => "float",
            HeaderValue::Array(_) => "array",
            HeaderValue::Bytes(_) => "bytes",
            HeaderValue::Records(_) => "records",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of a scalar; integers widen to `f64`.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(v) => Some(*v as f64),
            HeaderValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            HeaderValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[HeaderTree]> {
        match self {
            HeaderValue::Records(r) => Some(r),
            _ => None,
        }
    }
}

impl From<i64> for HeaderValue {
    fn from(v: i64) -> Self {
        HeaderValue::Int(v)
    }
}

impl From<i32> for HeaderValue {
    fn from(v: i32) -> Self {
        HeaderValue::Int(v as i64)
    }
}

impl From<f64> for HeaderValue {
    fn from(v: f64) -> Self {
        HeaderValue::Float(v)
    }
}

impl From<&str> for HeaderValue {
    fn from(v: &str) -> Self {
        HeaderValue::Bytes(v.as_bytes().to_vec())
    }
}

impl From<&[u8]> for HeaderValue {
    fn from(v: &[u8]) -> Self {
        HeaderValue::Bytes(v.to_vec())
    }
}

impl From<Vec<HeaderTree>> for HeaderValue {
    fn from(v: Vec<HeaderTree>) -> Self {
        HeaderValue::Records(v)
    }
}

impl Serialize for HeaderValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            HeaderValue::Int(v) => serializer.serialize_i64(*v),
            HeaderValue::Float(v) => serializer.serialize_f64(*v),
            // Text fields are ASCII in every modeled format
            HeaderValue::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
            HeaderValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            HeaderValue::Records(trees) => {
                let mut seq = serializer.serialize_seq(Some(trees.len()))?;
                for tree in trees {
                    seq.serialize_element(tree)?;
                }
                seq.end()
            }
        }
    }
}

/// Ordered mapping of field name to value.
#[derive(Debug, Clone, Default)]
pub struct HeaderTree {
    entries: Vec<(String, HeaderValue)>,
    index: HashMap<String, usize>,
}

impl PartialEq for HeaderTree {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl HeaderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, keeping the original position if the name already exists.
    /// Returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Option<HeaderValue> {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&pos) => Some(std::mem::replace(&mut self.entries[pos].1, value)),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut HeaderValue> {
        self.index.get(name).map(|&pos| &mut self.entries[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_int()
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_float()
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name)?.as_bytes()
    }

    pub fn records(&self, name: &str) -> Option<&[HeaderTree]> {
        self.get(name)?.as_records()
    }

    pub fn records_mut(&mut self, name: &str) -> Option<&mut Vec<HeaderTree>> {
        match self.get_mut(name)? {
            HeaderValue::Records(r) => Some(r),
            _ => None,
        }
    }

    /// Integer field that must exist.
    pub fn require_int(&self, name: &str) -> Result<i64> {
        let value = self
            .get(name)
            .ok_or_else(|| HeaderError::MissingField(name.to_string()))?;
        value.as_int().ok_or_else(|| HeaderError::TypeMismatch {
            field: name.to_string(),
            expected: "int",
            actual: value.kind_name(),
        })
    }

    /// JSON rendering with entries in on-disk order.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl Serialize for HeaderTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position() {
        let mut tree = HeaderTree::new();
        tree.insert("a", 1i64);
        tree.insert("b", 2.5f64);
        tree.insert("c", "name");
        let previous = tree.insert("a", 10i64);

        assert_eq!(previous, Some(HeaderValue::Int(1)));
        assert_eq!(tree.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(tree.int("a"), Some(10));
        assert_eq!(tree.float("b"), Some(2.5));
        assert_eq!(tree.float("a"), Some(10.0));
        assert_eq!(tree.bytes("c"), Some(&b"name"[..]));
    }

    #[test]
    fn test_require_int_errors() {
        let mut tree = HeaderTree::new();
        tree.insert("f", 1.0f64);

        assert!(matches!(tree.require_int("missing"), Err(HeaderError::MissingField(_))));
        assert!(matches!(
            tree.require_int("f"),
            Err(HeaderError::TypeMismatch { expected: "int", actual: "float", .. })
        ));
    }

    #[test]
    fn test_json_preserves_order() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut child = HeaderTree::new();
        child.insert("q", 0.5f64);

        let mut tree = HeaderTree::new();
        tree.insert("zeta", 1i64);
        tree.insert("alpha", "<default>");
        tree.insert("rows", vec![child]);

        let json = serde_json::to_string(&tree)?;
        assert_eq!(json, r#"{"zeta":1,"alpha":"<default>","rows":[{"q":0.5}]}"#);
        Ok(())
    }

    #[test]
    fn test_equality_ignores_index_layout() {
        let mut a = HeaderTree::new();
        a.insert("x", 1i64);
        let mut b = HeaderTree::new();
        b.insert("x", 0i64);
        b.insert("x", 1i64);
        assert_eq!(a, b);
    }
}
