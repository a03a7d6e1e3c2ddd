//! Metadata-only entries.

use crate::core::{Entry, EntryKind};
use crate::util::{valid_key, Result};

entry_wrapper! {
    /// Any metadata node without a backing file (`context`, `group`,
    /// `channel`, ...), including tags this library does not know.
    MiscEntry => Misc
}

entry_wrapper! {
    /// User-defined key/value pairs (`customAttributes`).
    ///
    /// On disk each pair is a `<customAttribute key=.. value=../>` child; in
    /// memory they are plain attributes of this node.
    CustomAttributes => CustomAttributes
}

impl MiscEntry {
    /// Create a detached node with the given tag.
    pub fn new(name: &str) -> Result<Self> {
        valid_key(name)?;
        Ok(Self(Entry::misc(name)))
    }
}

impl CustomAttributes {
    /// Create an empty set.
    pub fn new() -> Self {
        Self(Entry::new(EntryKind::CustomAttributes, "customAttributes"))
    }

    /// Create a set holding one pair.
    pub fn with(key: &str, value: impl std::fmt::Display) -> Result<Self> {
        let attrs = Self::new();
        attrs.set_attr(key, value)?;
        Ok(attrs)
    }

    /// All pairs in insertion order.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.attrs()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

impl Default for CustomAttributes {
    fn default() -> Self {
        Self::new()
    }
}
