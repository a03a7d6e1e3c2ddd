//! The entry tree.
//!
//! An [`Entry`] is a cheap, clonable handle to a node. A node exclusively owns
//! its children; the parent link is a [`Weak`] reference that is only used to
//! find the container root for autosave and read-only checks.

use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use std::str::FromStr;

use super::attributes::Attributes;
use super::lookup;
use crate::util::{valid_filename, Error, Result};

/// Structural children that may occur at most once under a parent.
pub const SINGLETON_TAGS: [&str; 3] = ["binFileFormat", "csvFileFormat", "customFileFormat"];

/// Tags that are understood as plain metadata nodes.
pub const METADATA_TAGS: [&str; 8] = [
    "context",
    "group",
    "channel",
    "binFileFormat",
    "csvFileFormat",
    "customFileFormat",
    "groupEntry",
    "customAttribute",
];

/// Kind of an entry, derived from its element tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// The container root (`unisens`)
    Unisens,
    /// Binary or text signal (`signalEntry`)
    Signal,
    /// Delimited-text values (`valuesEntry`)
    Values,
    /// Delimited-text events (`eventEntry`)
    Event,
    /// Opaque file (`customEntry`)
    Custom,
    /// Custom key/value attributes (`customAttributes`)
    CustomAttributes,
    /// Any other metadata node (`channel`, `group`, `binFileFormat`, ...)
    Misc,
}

impl EntryKind {
    /// Dispatch an element tag (namespace already stripped) to an entry kind.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "unisens" => Self::Unisens,
            "signalEntry" => Self::Signal,
            "valuesEntry" => Self::Values,
            "eventEntry" => Self::Event,
            "customEntry" => Self::Custom,
            "customAttributes" => Self::CustomAttributes,
            _ => Self::Misc,
        }
    }

    /// Element tag for this kind, `None` for [`EntryKind::Misc`].
    pub const fn tag(self) -> Option<&'static str> {
        match self {
            Self::Unisens => Some("unisens"),
            Self::Signal => Some("signalEntry"),
            Self::Values => Some("valuesEntry"),
            Self::Event => Some("eventEntry"),
            Self::Custom => Some("customEntry"),
            Self::CustomAttributes => Some("customAttributes"),
            Self::Misc => None,
        }
    }

    /// True for entries backed by a data file.
    #[inline]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::Signal | Self::Values | Self::Event | Self::Custom)
    }

    /// True for entries stored as delimited text.
    #[inline]
    pub const fn is_csv(self) -> bool {
        matches!(self, Self::Values | Self::Event)
    }
}

/// Root-only state: persistence policy and the id registry.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContainerState {
    pub autosave: bool,
    pub readonly: bool,
    pub filename: String,
    pub registry: HashMap<String, Entry>,
    /// Set while a document is being loaded, disables autosave.
    pub suspended: bool,
}

pub(crate) struct EntryData {
    kind: EntryKind,
    name: String,
    attrs: Attributes,
    /// Character data of the element, if not just whitespace
    text: Option<String>,
    children: Vec<Entry>,
    parent: Weak<RefCell<EntryData>>,
    folder: PathBuf,
    container: Option<ContainerState>,
}

/// Handle to a node of the entry tree.
///
/// Cloning the handle does not clone the node; use [`Entry::deep_copy`] for that.
#[derive(Clone)]
pub struct Entry(Rc<RefCell<EntryData>>);

impl Entry {
    /// Create a detached node with the given kind and element name.
    pub fn new(kind: EntryKind, name: &str) -> Self {
        Self(Rc::new(RefCell::new(EntryData {
            kind,
            name: name.to_string(),
            attrs: Attributes::new(),
            text: None,
            children: Vec::new(),
            parent: Weak::new(),
            folder: PathBuf::from("."),
            container: None,
        })))
    }

    /// Create a generic metadata node with the given tag.
    pub fn misc(name: &str) -> Self {
        Self::new(EntryKind::Misc, name)
    }

    pub(crate) fn new_root(folder: &Path, state: ContainerState) -> Self {
        let root = Self::new(EntryKind::Unisens, "unisens");
        {
            let mut data = root.0.borrow_mut();
            data.folder = folder.to_path_buf();
            data.container = Some(state);
        }
        root
    }

    fn data(&self) -> Ref<'_, EntryData> {
        self.0.borrow()
    }

    // === Identity ===

    /// Kind of this entry.
    pub fn kind(&self) -> EntryKind {
        self.data().kind
    }

    /// Element name (tag).
    pub fn name(&self) -> String {
        self.data().name.clone()
    }

    /// Filename id, if this entry carries one.
    pub fn id(&self) -> Option<String> {
        self.data().attrs.get("id").map(String::from)
    }

    /// Lookup key: the id if present, the element name otherwise.
    pub fn key(&self) -> String {
        let data = self.data();
        data.attrs.get("id").unwrap_or(&data.name).to_string()
    }

    /// True if both handles point at the same node.
    pub fn ptr_eq(&self, other: &Entry) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Base folder that ids are resolved against.
    pub fn folder(&self) -> PathBuf {
        self.data().folder.clone()
    }

    /// Parent node, if attached.
    pub fn parent(&self) -> Option<Entry> {
        self.data().parent.upgrade().map(Entry)
    }

    /// Topmost ancestor (self when detached).
    pub fn root(&self) -> Entry {
        let mut node = self.clone();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// True if this node is a container root.
    pub fn is_container(&self) -> bool {
        self.data().container.is_some()
    }

    // === Attributes ===

    /// Snapshot of all attributes.
    pub fn attrs(&self) -> Attributes {
        self.data().attrs.clone()
    }

    /// Get an attribute value.
    pub fn attr(&self, key: &str) -> Option<String> {
        self.data().attrs.get(key).map(String::from)
    }

    /// Get an attribute value or a default.
    pub fn attr_or(&self, key: &str, default: &str) -> String {
        self.data().attrs.get_or(key, default).to_string()
    }

    /// Parse an attribute value back into a typed value.
    pub fn attr_as<T: FromStr>(&self, key: &str) -> Option<T> {
        self.data().attrs.get_as(key)
    }

    /// Parse an attribute as a boolean.
    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.data().attrs.get_bool(key)
    }

    /// Check if an attribute exists.
    pub fn has_attr(&self, key: &str) -> bool {
        self.data().attrs.contains(key)
    }

    /// Set an attribute. The value is stored in its string form.
    ///
    /// Setting `id` on a file entry requires a legal filename; under a
    /// container root the new id must not be taken by another entry.
    pub fn set_attr(&self, key: &str, value: impl fmt::Display) -> Result<&Self> {
        if key == "id" {
            let id = value.to_string();
            if self.kind().is_file() {
                valid_filename(&id)?;
            }
            self.rekey(Some(&id))?;
            self.0.borrow_mut().attrs.set(key, id)?;
        } else {
            self.0.borrow_mut().attrs.set(key, value)?;
        }
        self.touch()?;
        Ok(self)
    }

    /// Remove an attribute and return its value.
    ///
    /// File entries cannot lose their `id`.
    pub fn remove_attr(&self, key: &str) -> Result<String> {
        if key == "id" && self.has_attr("id") {
            if self.kind().is_file() {
                return Err(Error::InvalidFilename(format!(
                    "<{}> requires an id",
                    self.name()
                )));
            }
            self.rekey(None)?;
        }
        let value = self.0.borrow_mut().attrs.remove(key)?;
        self.touch()?;
        Ok(value)
    }

    /// Move this entry to a new id in the parent's registry, if the parent
    /// is a container root.
    fn rekey(&self, new_id: Option<&str>) -> Result<()> {
        let Some(parent) = self.parent() else {
            return Ok(());
        };
        let old_id = self.id();
        let mut data = parent.0.borrow_mut();
        let Some(state) = data.container.as_mut() else {
            return Ok(());
        };
        if let Some(id) = new_id {
            if state.registry.get(id).is_some_and(|e| !e.ptr_eq(self)) {
                return Err(Error::DuplicateId(id.to_string()));
            }
        }
        if let Some(id) = old_id {
            if state.registry.get(&id).is_some_and(|e| e.ptr_eq(self)) {
                state.registry.remove(&id);
            }
        }
        if let Some(id) = new_id {
            state.registry.insert(id.to_string(), self.clone());
        }
        Ok(())
    }

    /// Character data of the element.
    pub fn text(&self) -> Option<String> {
        self.data().text.clone()
    }

    /// Set or clear the character data of the element.
    pub fn set_text(&self, text: Option<&str>) -> Result<&Self> {
        self.0.borrow_mut().text = text.map(String::from);
        self.touch()?;
        Ok(self)
    }

    pub(crate) fn set_text_raw(&self, text: Option<String>) {
        self.0.borrow_mut().text = text;
    }

    pub(crate) fn set_attrs_raw(&self, attrs: Attributes) {
        self.0.borrow_mut().attrs = attrs;
    }

    // === Children ===

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.data().children.len()
    }

    /// True if there are no children.
    pub fn is_empty(&self) -> bool {
        self.data().children.is_empty()
    }

    /// Direct children in insertion order.
    pub fn children(&self) -> Vec<Entry> {
        self.data().children.clone()
    }

    /// Child at a position.
    pub fn child_at(&self, index: usize) -> Option<Entry> {
        self.data().children.get(index).cloned()
    }

    /// Children with the given element name, in order.
    pub fn children_named(&self, name: &str) -> Vec<Entry> {
        self.data()
            .children
            .iter()
            .filter(|c| c.data().name == name)
            .cloned()
            .collect()
    }

    /// First child with the given element name.
    pub fn child_named(&self, name: &str) -> Option<Entry> {
        self.data()
            .children
            .iter()
            .find(|c| c.data().name == name)
            .cloned()
    }

    /// `channel` children.
    pub fn channels(&self) -> Vec<Entry> {
        self.children_named("channel")
    }

    /// Names of the `channel` children.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels()
            .iter()
            .map(|c| c.attr_or("name", ""))
            .collect()
    }

    fn child_keys(&self) -> Vec<String> {
        self.data().children.iter().map(Entry::key).collect()
    }

    /// Resolve a key to a single child (the first of a stacked group).
    ///
    /// See [`lookup`](super::lookup) for the resolution rules.
    pub fn get(&self, key: &str) -> Result<Entry> {
        let hits = lookup::resolve(&self.child_keys(), key)?;
        Ok(self.data().children[hits[0]].clone())
    }

    /// Resolve a key to the whole same-key group.
    pub fn get_all(&self, key: &str) -> Result<Vec<Entry>> {
        let hits = lookup::resolve(&self.child_keys(), key)?;
        let data = self.data();
        Ok(hits.into_iter().map(|i| data.children[i].clone()).collect())
    }

    /// True if `key` resolves to a child.
    pub fn contains(&self, key: &str) -> bool {
        lookup::resolve(&self.child_keys(), key).is_ok()
    }

    /// Add a child, stacking it next to same-key children.
    pub fn add_entry(&self, child: impl AsRef<Entry>) -> Result<&Self> {
        self.add_child(child, true)
    }

    /// Add a child.
    ///
    /// With `stack`, a child whose key already exists joins a same-key group;
    /// without it, the existing child is replaced in place. Singleton tags
    /// are always replaced. Under a container root, entries are never
    /// stacked and a second entry with an already registered id fails with
    /// [`Error::DuplicateId`].
    pub fn add_child(&self, child: impl AsRef<Entry>, stack: bool) -> Result<&Self> {
        let child = child.as_ref();
        if child.ptr_eq(self) || child.is_ancestor_of(self) {
            return Err(Error::other(format!(
                "cannot add {} below itself",
                child.key()
            )));
        }

        let key = child.key();
        let is_root = self.is_container();
        if is_root {
            if let Some(id) = child.id() {
                let data = self.data();
                let registry = data.container.as_ref().map(|c| &c.registry);
                if let Some(existing) = registry.and_then(|r| r.get(&id)) {
                    if !existing.ptr_eq(child) {
                        return Err(Error::DuplicateId(id));
                    }
                }
            }
        }

        if let Some(old_parent) = child.parent() {
            old_parent.detach(child);
        }

        let overwrite = !stack || is_root || SINGLETON_TAGS.contains(&key.as_str());
        let replaced = {
            let mut data = self.0.borrow_mut();
            let same_key: Vec<usize> = data
                .children
                .iter()
                .enumerate()
                .filter(|(_, c)| c.key() == key)
                .map(|(i, _)| i)
                .collect();

            let mut replaced = Vec::new();
            match same_key.first() {
                Some(&first) if overwrite => {
                    for &i in same_key.iter().skip(1).rev() {
                        replaced.push(data.children.remove(i));
                    }
                    replaced.push(std::mem::replace(&mut data.children[first], child.clone()));
                }
                _ => data.children.push(child.clone()),
            }

            if let (Some(state), Some(id)) = (data.container.as_mut(), child.id()) {
                state.registry.insert(id, child.clone());
            }
            replaced
        };
        for old in replaced {
            old.0.borrow_mut().parent = Weak::new();
        }

        let folder = self.folder();
        {
            let mut data = child.0.borrow_mut();
            data.parent = Rc::downgrade(&self.0);
        }
        child.set_folder(&folder);

        self.touch()?;
        Ok(self)
    }

    /// Remove the child group that `key` resolves to.
    pub fn remove_entry(&self, key: &str) -> Result<Vec<Entry>> {
        let removed = self.get_all(key)?;
        for child in &removed {
            self.detach(child);
        }
        self.touch()?;
        Ok(removed)
    }

    /// Unlink a direct child without saving.
    fn detach(&self, child: &Entry) {
        let mut data = self.0.borrow_mut();
        data.children.retain(|c| !c.ptr_eq(child));
        if let (Some(state), Some(id)) = (data.container.as_mut(), child.id()) {
            if state.registry.get(&id).is_some_and(|e| e.ptr_eq(child)) {
                state.registry.remove(&id);
            }
        }
        drop(data);
        child.0.borrow_mut().parent = Weak::new();
    }

    fn is_ancestor_of(&self, other: &Entry) -> bool {
        let mut node = other.parent();
        while let Some(n) = node {
            if n.ptr_eq(self) {
                return true;
            }
            node = n.parent();
        }
        false
    }

    /// Set the base folder of this node and all descendants.
    pub(crate) fn set_folder(&self, folder: &Path) {
        self.0.borrow_mut().folder = folder.to_path_buf();
        for child in self.children() {
            child.set_folder(folder);
        }
    }

    // === Copy ===

    /// Clone the whole subtree into new nodes.
    ///
    /// The copy is detached: it has no parent until it is added somewhere.
    pub fn deep_copy(&self) -> Entry {
        let data = self.data();
        let copy = Entry(Rc::new(RefCell::new(EntryData {
            kind: data.kind,
            name: data.name.clone(),
            attrs: data.attrs.clone(),
            text: data.text.clone(),
            children: Vec::with_capacity(data.children.len()),
            parent: Weak::new(),
            folder: data.folder.clone(),
            container: data.container.as_ref().map(|c| ContainerState {
                registry: HashMap::new(),
                ..c.clone()
            }),
        })));

        for child in &data.children {
            let child_copy = child.deep_copy();
            child_copy.0.borrow_mut().parent = Rc::downgrade(&copy.0);
            let mut copy_data = copy.0.borrow_mut();
            if let (Some(state), Some(id)) = (copy_data.container.as_mut(), child_copy.id()) {
                state.registry.insert(id, child_copy.clone());
            }
            copy_data.children.push(child_copy);
        }
        copy
    }

    // === Container policy ===

    pub(crate) fn with_container<R>(&self, f: impl FnOnce(&mut ContainerState) -> R) -> Option<R> {
        self.0.borrow_mut().container.as_mut().map(f)
    }

    pub(crate) fn container_flag(&self, f: impl Fn(&ContainerState) -> bool) -> bool {
        self.data().container.as_ref().map(f).unwrap_or(false)
    }

    /// Fail if the container this entry belongs to is read-only.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.root().container_flag(|c| c.readonly) {
            return Err(Error::ReadOnlyViolation);
        }
        Ok(())
    }

    /// Propagate a mutation: saves the container if it has autosave enabled.
    pub(crate) fn touch(&self) -> Result<()> {
        let root = self.root();
        if root.container_flag(|c| c.autosave && !c.suspended) {
            crate::container::save_tree(&root, None, None)?;
        }
        Ok(())
    }
}

impl AsRef<Entry> for Entry {
    fn as_ref(&self) -> &Entry {
        self
    }
}

/// Structural equality: same tag, attributes and children, recursively.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (a, b) = (self.data(), other.data());
        a.name == b.name && a.attrs == b.attrs && a.text == b.text && a.children == b.children
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.data();
        f.debug_struct("Entry")
            .field("name", &data.name)
            .field("attrs", &data.attrs)
            .field("text", &data.text)
            .field("children", &data.children)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_entry(kind: EntryKind, id: &str) -> Entry {
        let e = Entry::new(kind, kind.tag().unwrap_or("misc"));
        e.set_attr("id", id).unwrap();
        e
    }

    #[test]
    fn test_stacking() {
        let parent = Entry::misc("signalEntry");
        let a = Entry::misc("channel");
        a.set_attr("name", "a").unwrap();
        let b = Entry::misc("channel");
        b.set_attr("name", "b").unwrap();

        parent.add_child(&a, true).unwrap().add_child(&b, true).unwrap();
        assert_eq!(parent.len(), 2);
        let group = parent.get_all("channel").unwrap();
        assert_eq!(group.len(), 2);
        assert!(group[0].ptr_eq(&a));
        assert!(group[1].ptr_eq(&b));
        assert_eq!(parent.channel_names(), ["a", "b"]);
    }

    #[test]
    fn test_overwrite() {
        let parent = Entry::misc("signalEntry");
        let a = Entry::misc("channel");
        let b = Entry::misc("channel");
        parent.add_child(&a, false).unwrap();
        parent.add_child(&b, false).unwrap();
        assert_eq!(parent.len(), 1);
        assert!(parent.get("channel").unwrap().ptr_eq(&b));
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_singleton_replaced_in_place() {
        let parent = Entry::misc("valuesEntry");
        let fmt1 = Entry::misc("csvFileFormat");
        let channel = Entry::misc("channel");
        let fmt2 = Entry::misc("csvFileFormat");
        parent.add_entry(&fmt1).unwrap();
        parent.add_entry(&channel).unwrap();
        parent.add_entry(&fmt2).unwrap();

        assert_eq!(parent.len(), 2);
        assert!(parent.child_at(0).unwrap().ptr_eq(&fmt2));
        assert!(parent.child_at(1).unwrap().ptr_eq(&channel));
    }

    #[test]
    fn test_parent_and_remove() {
        let parent = Entry::misc("group");
        let child = file_entry(EntryKind::Custom, "test.txt");
        parent.add_entry(&child).unwrap();
        assert!(child.parent().unwrap().ptr_eq(&parent));
        assert!(parent.contains("test"));

        let removed = parent.remove_entry("TEST").unwrap();
        assert_eq!(removed.len(), 1);
        assert!(parent.is_empty());
        assert!(child.parent().is_none());
        assert!(matches!(parent.remove_entry("test"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_no_cycles() {
        let a = Entry::misc("group");
        let b = Entry::misc("context");
        a.add_entry(&b).unwrap();
        assert!(b.add_entry(&a).is_err());
        assert!(a.add_entry(&a).is_err());
    }

    #[test]
    fn test_deep_copy_is_detached() {
        let parent = Entry::misc("group");
        let child = file_entry(EntryKind::Custom, "a.txt");
        parent.add_entry(&child).unwrap();

        let copy = parent.deep_copy();
        assert_eq!(copy, parent);
        assert!(!copy.ptr_eq(&parent));

        copy.set_attr("extra", 1).unwrap();
        copy.get("a").unwrap().set_attr("x", "y").unwrap();
        assert!(!parent.has_attr("extra"));
        assert!(!child.has_attr("x"));
        assert_ne!(copy, parent);

        let copied_child = copy.child_at(0).unwrap();
        assert!(copied_child.parent().unwrap().ptr_eq(&copy));
        assert!(child.deep_copy().parent().is_none());
    }

    fn container_root() -> Entry {
        Entry::new_root(Path::new("/data/rec"), ContainerState::default())
    }

    #[test]
    fn test_id_must_stay_a_legal_filename() {
        let signal = file_entry(EntryKind::Signal, "a.bin");
        assert!(matches!(
            signal.set_attr("id", "../escaped.bin"),
            Err(Error::InvalidFilename(_))
        ));
        assert!(matches!(signal.set_attr("id", "/abs.bin"), Err(Error::InvalidFilename(_))));
        assert_eq!(signal.id().as_deref(), Some("a.bin"));
        assert!(signal.remove_attr("id").is_err());

        signal.set_attr("id", "sub/b.bin").unwrap();
        assert_eq!(signal.id().as_deref(), Some("sub/b.bin"));

        // Metadata nodes use `id` as a plain name.
        let group = Entry::misc("group");
        group.set_attr("id", "accelerometer").unwrap();
        assert_eq!(group.remove_attr("id").unwrap(), "accelerometer");
    }

    #[test]
    fn test_renamed_id_updates_registry() {
        let root = container_root();
        let a = file_entry(EntryKind::Custom, "a.txt");
        root.add_entry(&a).unwrap();
        a.set_attr("id", "b.txt").unwrap();

        let registry = |id: &str| root.with_container(|c| c.registry.get(id).cloned()).flatten();
        assert!(registry("a.txt").is_none());
        assert!(registry("b.txt").unwrap().ptr_eq(&a));

        let second = file_entry(EntryKind::Custom, "b.txt");
        assert!(matches!(
            root.add_entry(&second),
            Err(Error::DuplicateId(ref id)) if id == "b.txt"
        ));
        assert_eq!(root.len(), 1);
        assert!(a.parent().unwrap().ptr_eq(&root));

        // The old id is free again.
        root.add_entry(file_entry(EntryKind::Custom, "a.txt")).unwrap();
        assert_eq!(root.len(), 2);
    }

    #[test]
    fn test_rename_onto_taken_id_fails() {
        let root = container_root();
        let a = file_entry(EntryKind::Custom, "a.txt");
        let b = file_entry(EntryKind::Custom, "b.txt");
        root.add_entry(&a).unwrap().add_entry(&b).unwrap();

        assert!(matches!(a.set_attr("id", "b.txt"), Err(Error::DuplicateId(_))));
        assert_eq!(a.id().as_deref(), Some("a.txt"));
        assert!(root.get("b.txt").unwrap().ptr_eq(&b));
    }

    #[test]
    fn test_text_is_part_of_equality() {
        let a = Entry::misc("context");
        let b = Entry::misc("context");
        a.set_text(Some("patient note")).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.deep_copy().text().as_deref(), Some("patient note"));
        b.set_text(Some("patient note")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_folder_propagates() {
        let parent = Entry::misc("group");
        parent.set_folder(Path::new("/data/rec"));
        let child = file_entry(EntryKind::Custom, "a.txt");
        let grandchild = file_entry(EntryKind::Custom, "b.txt");
        child.add_entry(&grandchild).unwrap();
        parent.add_entry(&child).unwrap();
        assert_eq!(grandchild.folder(), PathBuf::from("/data/rec"));
    }
}
