//! `BsonDocument` — an ordered key→value mapping. Field order is
//! significant (it's preserved across serialization) so storage is a flat
//! `Vec` rather than a hash map; lookups are linear, which is fine for the
//! small field counts real documents have.

use super::value::BsonValue;
use crate::common::Collation;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BsonDocument {
    fields: Vec<(String, BsonValue)>,
}

impl BsonDocument {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&BsonValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Set a field, overwriting it in place if it already exists so field
    /// order is stable across updates.
    pub fn set(&mut self, key: impl Into<String>, value: BsonValue) {
        let key = key.into();
        if let Some(slot) = self.fields.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.fields.push((key, value));
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<BsonValue> {
        let pos = self.fields.iter().position(|(k, _)| k == key)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BsonValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Navigate a dotted path like `address.city`, returning `None` if any
    /// segment is missing or not a document.
    pub fn get_path(&self, path: &[String]) -> Option<&BsonValue> {
        let mut current = self.get(path.first()?)?;
        for segment in &path[1..] {
            current = match current {
                BsonValue::Document(doc) => doc.get(segment)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Overwrite the value at a dotted path like `address.city`, creating
    /// intermediate documents as needed. A no-op if an intermediate
    /// segment exists but isn't a document.
    pub fn set_path(&mut self, path: &[String], value: BsonValue) {
        match path {
            [] => {}
            [only] => self.set(only.clone(), value),
            [first, rest @ ..] => {
                let slot = self.fields.iter_mut().find(|(k, _)| k == first);
                match slot {
                    Some((_, BsonValue::Document(inner))) => inner.set_path(rest, value),
                    Some(_) => {}
                    None => {
                        let mut inner = BsonDocument::new();
                        inner.set_path(rest, value);
                        self.set(first.clone(), BsonValue::Document(inner));
                    }
                }
            }
        }
    }

    /// Compare two documents field-by-field in the order `self` declares
    /// them; missing fields in `other` make `self` the larger document.
    pub fn compare(&self, other: &Self, collation: &Collation) -> Ordering {
        for (key, value) in &self.fields {
            match other.get(key) {
                Some(other_value) => {
                    let c = value.compare(other_value, collation);
                    if c != Ordering::Equal {
                        return c;
                    }
                }
                None => return Ordering::Greater,
            }
        }
        self.fields.len().cmp(&other.fields.len())
    }
}

impl FromIterator<(String, BsonValue)> for BsonDocument {
    fn from_iter<T: IntoIterator<Item = (String, BsonValue)>>(iter: T) -> Self {
        let mut doc = BsonDocument::new();
        for (k, v) in iter {
            doc.set(k, v);
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_preserves_order() {
        let mut doc = BsonDocument::new();
        doc.set("b", BsonValue::Int32(2));
        doc.set("a", BsonValue::Int32(1));
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_set_overwrite_keeps_position() {
        let mut doc = BsonDocument::new();
        doc.set("a", BsonValue::Int32(1));
        doc.set("b", BsonValue::Int32(2));
        doc.set("a", BsonValue::Int32(99));
        let keys: Vec<_> = doc.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(matches!(doc.get("a"), Some(BsonValue::Int32(99))));
    }

    #[test]
    fn test_get_path_nested() {
        let mut inner = BsonDocument::new();
        inner.set("city", BsonValue::String("nyc".into()));
        let mut doc = BsonDocument::new();
        doc.set("address", BsonValue::Document(inner));

        let path = vec!["address".to_string(), "city".to_string()];
        assert!(matches!(doc.get_path(&path), Some(BsonValue::String(s)) if s == "nyc"));
    }

    #[test]
    fn test_set_path_overwrites_nested_field() {
        let mut inner = BsonDocument::new();
        inner.set("city", BsonValue::String("nyc".into()));
        let mut doc = BsonDocument::new();
        doc.set("address", BsonValue::Document(inner));

        let path = vec!["address".to_string(), "city".to_string()];
        doc.set_path(&path, BsonValue::String("sf".into()));
        assert!(matches!(doc.get_path(&path), Some(BsonValue::String(s)) if s == "sf"));
    }

    #[test]
    fn test_set_path_top_level() {
        let mut doc = BsonDocument::new();
        let path = vec!["author".to_string()];
        doc.set_path(&path, BsonValue::String("ada".into()));
        assert!(matches!(doc.get("author"), Some(BsonValue::String(s)) if s == "ada"));
    }

    #[test]
    fn test_remove() {
        let mut doc = BsonDocument::new();
        doc.set("a", BsonValue::Int32(1));
        assert!(doc.remove("a").is_some());
        assert!(doc.get("a").is_none());
    }
}
