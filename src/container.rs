//! The Unisens container: root entry, id registry and persistence.
//!
//! A container is a folder holding `unisens.xml` and the data files its
//! entries refer to.
//!
//! # Example
//!
//! ```ignore
//! use unisens::prelude::*;
//!
//! let u = Unisens::open_with("recording", UnisensOptions::new().make_new(true))?;
//! let ecg = SignalEntry::new("ecg.bin")?;
//! u.add_entry(&ecg)?;
//! ecg.set_data(&Matrix::from_row(vec![1i16, 2, 3]), SignalOptions::new(256.0))?;
//! u.save(None, None)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::core::{ContainerState, Entry, EntryKind};
use crate::entry::CustomAttributes;
use crate::util::{Error, Result};
use crate::xml;

/// Default document filename.
pub const DEFAULT_FILENAME: &str = "unisens.xml";
/// Format version written to new documents.
pub const FORMAT_VERSION: &str = "2.0";

/// Options for [`Unisens::open_with`].
#[derive(Clone, Debug)]
pub struct UnisensOptions {
    /// Ignore an existing document and start empty
    pub make_new: bool,
    /// Save after every mutation
    pub autosave: bool,
    /// Reject saves and data writes
    pub readonly: bool,
    pub comment: Option<String>,
    pub duration: Option<f64>,
    pub measurement_id: Option<String>,
    pub timestamp_start: Option<String>,
    /// Document filename inside the folder
    pub filename: String,
    /// Write the document right away when a new container is created
    pub save_on_create: bool,
}

impl Default for UnisensOptions {
    fn default() -> Self {
        Self {
            make_new: false,
            autosave: false,
            readonly: false,
            comment: None,
            duration: None,
            measurement_id: None,
            timestamp_start: None,
            filename: DEFAULT_FILENAME.to_string(),
            save_on_create: true,
        }
    }
}

impl UnisensOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_new(mut self, make_new: bool) -> Self {
        self.make_new = make_new;
        self
    }

    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn measurement_id(mut self, id: impl Into<String>) -> Self {
        self.measurement_id = Some(id.into());
        self
    }

    pub fn timestamp_start(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp_start = Some(timestamp.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn save_on_create(mut self, save: bool) -> Self {
        self.save_on_create = save;
        self
    }
}

/// A Unisens container.
///
/// Derefs to the root [`Entry`], so lookup (`get`, `get_all`, `contains`)
/// and attribute access work directly on the container.
#[derive(Clone)]
pub struct Unisens {
    root: Entry,
}

impl Deref for Unisens {
    type Target = Entry;

    fn deref(&self) -> &Entry {
        &self.root
    }
}

impl AsRef<Entry> for Unisens {
    fn as_ref(&self) -> &Entry {
        &self.root
    }
}

impl Unisens {
    /// Open the container in `folder`, loading `unisens.xml` if present.
    pub fn open(folder: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(folder, UnisensOptions::default())
    }

    /// Open a container with explicit options.
    ///
    /// Fails with [`Error::IncompatibleConfig`] if both `autosave` and
    /// `readonly` are set.
    pub fn open_with(folder: impl AsRef<Path>, opts: UnisensOptions) -> Result<Self> {
        if opts.autosave && opts.readonly {
            return Err(Error::IncompatibleConfig(
                "autosave and readonly are mutually exclusive".into(),
            ));
        }

        let folder = folder.as_ref().to_path_buf();
        let state = ContainerState {
            autosave: opts.autosave,
            readonly: opts.readonly,
            filename: opts.filename.clone(),
            registry: HashMap::new(),
            suspended: true,
        };
        let container = Self {
            root: Entry::new_root(&folder, state),
        };

        let path = folder.join(&opts.filename);
        let loaded = path.is_file() && !opts.make_new;
        if loaded {
            info!(path = %path.display(), "loading container");
            container.load(&path)?;
        } else {
            info!(folder = %folder.display(), "creating container");
            container.init_metadata(&opts)?;
        }
        container.root.with_container(|c| c.suspended = false);

        if !loaded && opts.save_on_create && !opts.readonly {
            container.save(None, None)?;
        }
        Ok(container)
    }

    fn load(&self, path: &Path) -> Result<()> {
        let doc = xml::read_file(path)?;
        let (attrs, children) = xml::decode_root(&doc)?;
        self.root.set_attrs_raw(attrs);
        for child in children {
            self.root.add_entry(xml::decode(child)?)?;
        }
        self.root.check_files();
        debug!(entries = self.root.len(), "container loaded");
        Ok(())
    }

    fn init_metadata(&self, opts: &UnisensOptions) -> Result<()> {
        let timestamp = match &opts.timestamp_start {
            Some(ts) => ts.clone(),
            None => now_timestamp()?,
        };
        let root = &self.root;
        root.set_attr("comment", opts.comment.as_deref().unwrap_or(""))?;
        root.set_attr("duration", opts.duration.unwrap_or(0.0))?;
        root.set_attr("measurementId", opts.measurement_id.as_deref().unwrap_or("NaN"))?;
        root.set_attr("timestampStart", timestamp)?;
        root.set_attr("version", FORMAT_VERSION)?;
        Ok(())
    }

    /// The root entry.
    pub fn entry(&self) -> &Entry {
        &self.root
    }

    /// Add a top-level entry.
    ///
    /// Fails with [`Error::DuplicateId`] if another entry with the same id
    /// is registered. Entries without id replace a same-named entry.
    pub fn add_entry(&self, entry: impl AsRef<Entry>) -> Result<&Self> {
        self.root.add_entry(entry)?;
        Ok(self)
    }

    /// Remove the top-level entry `key` resolves to.
    pub fn remove_entry(&self, key: &str) -> Result<Vec<Entry>> {
        self.root.remove_entry(key)
    }

    /// Registered entry with exactly this id.
    pub fn by_id(&self, id: &str) -> Option<Entry> {
        self.root
            .with_container(|c| c.registry.get(id).cloned())
            .flatten()
    }

    /// Top-level entry at a position.
    pub fn entry_at(&self, index: usize) -> Option<Entry> {
        self.root.child_at(index)
    }

    /// All top-level entries in document order.
    pub fn entries(&self) -> Vec<Entry> {
        self.root.children()
    }

    /// Write the document.
    ///
    /// `folder` and `filename` default to the container's own.
    pub fn save(&self, folder: Option<&Path>, filename: Option<&str>) -> Result<()> {
        save_tree(&self.root, folder, filename)
    }

    /// Independent copy of the whole tree, sharing the folder.
    ///
    /// Autosave is off on the copy so it never overwrites the original's
    /// document; call [`Unisens::save`] with another folder to persist it.
    pub fn deep_copy(&self) -> Unisens {
        let root = self.root.deep_copy();
        root.with_container(|c| c.autosave = false);
        Self { root }
    }

    // === Policy ===

    pub fn is_readonly(&self) -> bool {
        self.root.container_flag(|c| c.readonly)
    }

    pub fn is_autosave(&self) -> bool {
        self.root.container_flag(|c| c.autosave)
    }

    /// Document filename inside the folder.
    pub fn filename(&self) -> String {
        self.root
            .with_container(|c| c.filename.clone())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
    }

    /// Path of the document file.
    pub fn document_path(&self) -> PathBuf {
        self.root.folder().join(self.filename())
    }

    // === Root attributes ===

    pub fn comment(&self) -> String {
        self.root.attr_or("comment", "")
    }

    pub fn set_comment(&self, comment: &str) -> Result<()> {
        self.root.set_attr("comment", comment)?;
        Ok(())
    }

    /// Duration in seconds.
    pub fn duration(&self) -> Option<f64> {
        self.root.attr_as("duration")
    }

    pub fn set_duration(&self, seconds: f64) -> Result<()> {
        self.root.set_attr("duration", seconds)?;
        Ok(())
    }

    pub fn measurement_id(&self) -> String {
        self.root.attr_or("measurementId", "NaN")
    }

    pub fn set_measurement_id(&self, id: &str) -> Result<()> {
        self.root.set_attr("measurementId", id)?;
        Ok(())
    }

    /// Start timestamp, `YYYY-MM-DDTHH:MM:SS`.
    pub fn timestamp_start(&self) -> Option<String> {
        self.root.attr("timestampStart")
    }

    pub fn set_timestamp_start(&self, timestamp: &str) -> Result<()> {
        self.root.set_attr("timestampStart", timestamp)?;
        Ok(())
    }

    pub fn version(&self) -> Option<String> {
        self.root.attr("version")
    }

    pub fn set_version(&self, version: &str) -> Result<()> {
        self.root.set_attr("version", version)?;
        Ok(())
    }

    // === Custom attributes ===

    /// The `customAttributes` node, if present.
    pub fn custom_attributes(&self) -> Option<CustomAttributes> {
        self.root
            .children()
            .into_iter()
            .find(|c| c.kind() == EntryKind::CustomAttributes)
            .and_then(|c| CustomAttributes::try_from(c).ok())
    }

    /// Set a custom attribute, creating the `customAttributes` node if needed.
    pub fn set_custom_attribute(&self, key: &str, value: impl fmt::Display) -> Result<()> {
        match self.custom_attributes() {
            Some(attrs) => {
                attrs.set_attr(key, value)?;
            }
            None => {
                let attrs = CustomAttributes::with(key, value)?;
                self.root.add_entry(&attrs)?;
            }
        }
        Ok(())
    }
}

/// Encode and write the tree of a container root.
pub(crate) fn save_tree(root: &Entry, folder: Option<&Path>, filename: Option<&str>) -> Result<()> {
    if root.container_flag(|c| c.readonly) {
        return Err(Error::ReadOnlyViolation);
    }
    let folder = match folder {
        Some(f) => f.to_path_buf(),
        None => root.folder(),
    };
    let filename = match filename {
        Some(f) => f.to_string(),
        None => root
            .with_container(|c| c.filename.clone())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string()),
    };

    let mut doc = xml::encode_document(root);
    xml::indent(&mut doc);
    fs::create_dir_all(&folder)?;
    let path = folder.join(filename);
    xml::write_file(&path, &doc)?;
    debug!(path = %path.display(), elements = doc.count(), "container saved");
    Ok(())
}

fn now_timestamp() -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second]"
    ))
    .map_err(|e| Error::other(e.to_string()))
}

/// Format seconds as `H:MM:SS`.
fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}

impl fmt::Display for Unisens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unisens: {}({}, {} entries)",
            self.measurement_id(),
            format_duration(self.duration().unwrap_or(0.0)),
            self.root.len()
        )
    }
}

impl fmt::Debug for Unisens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let comment = self.comment();
        let comment = match comment.char_indices().nth(20) {
            Some((i, _)) => format!("{}...", &comment[..i]),
            None => comment,
        };
        f.debug_struct("Unisens")
            .field("comment", &comment)
            .field("duration", &self.root.attr_or("duration", ""))
            .field("measurementId", &self.measurement_id())
            .field("timestampStart", &self.timestamp_start().unwrap_or_default())
            .field("version", &self.version().unwrap_or_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autosave_and_readonly_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let opts = UnisensOptions::new().autosave(true).readonly(true);
        assert!(matches!(
            Unisens::open_with(dir.path(), opts),
            Err(Error::IncompatibleConfig(_))
        ));
    }

    #[test]
    fn test_default_metadata() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let u = Unisens::open(dir.path())?;
        assert_eq!(u.comment(), "");
        assert_eq!(u.duration(), Some(0.0));
        assert_eq!(u.measurement_id(), "NaN");
        assert_eq!(u.version().as_deref(), Some("2.0"));
        let ts = u.timestamp_start().unwrap();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[10..11], "T");
        assert!(u.document_path().is_file());

        let keys: Vec<String> = u.attrs().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["comment", "duration", "measurementId", "timestampStart", "version"]);
        Ok(())
    }

    #[test]
    fn test_display_and_debug() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let opts = UnisensOptions::new()
            .measurement_id("Test_01")
            .duration(3725.0)
            .comment("a rather long comment for a recording")
            .save_on_create(false);
        let u = Unisens::open_with(dir.path(), opts)?;
        assert_eq!(u.to_string(), "Unisens: Test_01(1:02:05, 0 entries)");

        let debug = format!("{u:?}");
        assert!(debug.contains("a rather long commen..."));
        assert!(!u.document_path().exists());
        Ok(())
    }

    #[test]
    fn test_custom_attribute_helper() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let u = Unisens::open(dir.path())?;
        u.set_custom_attribute("weight", "73kg")?;
        u.set_custom_attribute("height", 1.74)?;
        assert_eq!(u.len(), 1);
        let attrs = u.custom_attributes().unwrap();
        assert_eq!(attrs.attr("height").as_deref(), Some("1.74"));
        Ok(())
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00:00");
        assert_eq!(format_duration(59.9), "0:00:59");
        assert_eq!(format_duration(86400.0), "24:00:00");
        assert_eq!(format_duration(f64::NAN), "0:00:00");
    }
}
