//! Core layer - the entry tree model.
//!
//! This module provides:
//! - [`Attributes`] - ordered, validated key-value attribute storage
//! - [`Entry`] / [`EntryKind`] - tree nodes with stacking and overwrite insertion
//! - fuzzy child lookup by id, name, stem or basename

mod attributes;
mod lookup;
mod node;

pub use attributes::Attributes;
pub(crate) use node::ContainerState;
pub use node::{Entry, EntryKind, METADATA_TAGS, SINGLETON_TAGS};
