use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::node::ParamValue;

/// Template parameters keyed by name, kept in declaration order.
///
/// Re-inserting an existing key replaces its value but keeps the position
/// of the first occurrence, so later writes win without reordering.
/// Equality ignores order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: IndexMap<String, ParamValue>,
}

impl Params {
    pub fn new() -> Self {
        Params {
            entries: IndexMap::new(),
        }
    }

    /// Insert a parameter, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a ParamValue);
    type IntoIter = std::iter::Map<
        indexmap::map::Iter<'a, String, ParamValue>,
        fn((&'a String, &'a ParamValue)) -> (&'a str, &'a ParamValue),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let entry: fn((&'a String, &'a ParamValue)) -> (&'a str, &'a ParamValue) = entry_ref;
        self.entries.iter().map(entry)
    }
}

fn entry_ref<'a>((key, value): (&'a String, &'a ParamValue)) -> (&'a str, &'a ParamValue) {
    (key.as_str(), value)
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v.into());
        }
        params
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
