//! Attribute storage for entries.
//!
//! Attributes are ordered key-value pairs of strings. Keys are validated
//! identifiers, values are stored in their string form and can be parsed
//! back on request.

use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

use crate::util::{valid_key, Error, Result};

/// Ordered attribute map.
///
/// Uses SmallVec optimization for the common case of few attributes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: SmallVec<[(String, String); 6]>,
}

impl Attributes {
    /// Create empty attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute, converting the value to its string form.
    ///
    /// An existing key keeps its position.
    pub fn set(&mut self, key: &str, value: impl fmt::Display) -> Result<()> {
        valid_key(key)?;
        let value = value.to_string();

        for (k, v) in &mut self.entries {
            if k == key {
                *v = value;
                return Ok(());
            }
        }
        self.entries.push((key.to_string(), value));
        Ok(())
    }

    /// Get an attribute value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Get an attribute value or a default.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse an attribute value back into a typed value.
    ///
    /// Returns `None` if the key is missing or the value does not parse.
    pub fn get_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Parse an attribute as a boolean (`true/false/1/0`, any case).
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Check if a key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Remove a key and return its value.
    pub fn remove(&mut self, key: &str) -> Result<String> {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(pos) => Ok(self.entries.remove(pos).1),
            None => Err(Error::KeyNotFound(key.to_string())),
        }
    }

    /// Get the number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear all attributes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterate over key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Insert without key validation. Used for attributes read from a
    /// document, which may carry qualified names such as `xmlns:xsi`.
    pub(crate) fn insert_raw(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.insert_raw(k.into(), v.into());
        }
        attrs
    }
}
