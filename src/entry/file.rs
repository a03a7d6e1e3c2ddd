//! File identity layer shared by all file-backed entries.
//!
//! The `id` attribute of a file entry is a relative filename below the
//! container folder. It may contain sub-directories separated by `/` or `\`.

use std::fs::{self, File};
use std::ops::Deref;
use std::path::PathBuf;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use tracing::{debug, warn};

use crate::core::{Entry, EntryKind};
use crate::util::{normalize_separators, split_extension, valid_filename, Error, Result};

/// Contents of a data file, memory-mapped when the `mmap` feature is on.
pub enum DataFile {
    /// Memory-mapped file
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
    /// File read into memory
    Buffer(Vec<u8>),
}

impl DataFile {
    /// Open a file for reading.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        if let Some(mapped) = map_file(&file)? {
            return Ok(mapped);
        }
        Ok(Self::Buffer(fs::read(path)?))
    }
}

#[cfg(feature = "mmap")]
fn map_file(file: &File) -> Result<Option<DataFile>> {
    // Empty files cannot be mapped on every platform.
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // Safety: the mapping is read-only and dropped before the container
    // writes the file again.
    let mmap = unsafe { Mmap::map(file) }?;
    Ok(Some(DataFile::Mapped(mmap)))
}

#[cfg(not(feature = "mmap"))]
fn map_file(_file: &File) -> Result<Option<DataFile>> {
    Ok(None)
}

impl Deref for DataFile {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(m) => &m[..],
            Self::Buffer(b) => &b[..],
        }
    }
}

impl Entry {
    /// Create a detached file entry of the given kind.
    ///
    /// Fails with [`Error::InvalidFilename`] for ids that are not legal
    /// relative filenames. Ids without an extension are accepted with a
    /// warning.
    pub fn new_file(kind: EntryKind, id: &str) -> Result<Entry> {
        let tag = kind
            .tag()
            .filter(|_| kind.is_file())
            .ok_or_else(|| Error::other(format!("{kind:?} entries have no backing file")))?;
        valid_filename(id)?;
        if split_extension(id).1.is_none() {
            warn!(id, "entry id should be a filename with extension, e.g. .bin or .csv");
        }
        let entry = Entry::new(kind, tag);
        entry.set_attr("id", id)?;
        Ok(entry)
    }

    /// Absolute path of the backing file, `None` for entries without id.
    pub fn path(&self) -> Option<PathBuf> {
        let id = self.id()?;
        let mut path = self.folder();
        path.extend(normalize_separators(&id).split('/'));
        Some(path)
    }

    /// True if the backing file exists.
    pub fn file_exists(&self) -> bool {
        self.path().is_some_and(|p| p.is_file())
    }

    /// Lower-cased file extension of the id.
    pub fn extension(&self) -> Option<String> {
        let id = self.id()?;
        split_extension(&id).1.map(str::to_ascii_lowercase)
    }

    /// Path of the backing file, checked to stay below the folder.
    pub(crate) fn require_path(&self) -> Result<PathBuf> {
        let id = self
            .id()
            .ok_or_else(|| Error::malformed(format!("<{}> has no id", self.name())))?;
        valid_filename(&id)?;
        let mut path = self.folder();
        path.extend(normalize_separators(&id).split('/'));
        Ok(path)
    }

    /// Open the backing file.
    pub fn read_file(&self) -> Result<DataFile> {
        DataFile::open(&self.require_path()?)
    }

    /// Replace the backing file with `bytes`, creating sub-directories.
    pub fn write_file(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_writable()?;
        let path = self.require_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        debug!(path = %path.display(), bytes = bytes.len(), "writing data file");
        fs::write(&path, bytes)?;
        Ok(())
    }

    /// Warn about file entries in this subtree whose backing file is missing.
    pub(crate) fn check_files(&self) {
        for child in self.children() {
            if child.kind().is_file() && !child.file_exists() {
                warn!(
                    id = %child.id().unwrap_or_default(),
                    "backing file of entry does not exist"
                );
            }
            child.check_files();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_new_file_validates_id() {
        assert!(matches!(
            Entry::new_file(EntryKind::Signal, "/abs.bin"),
            Err(Error::InvalidFilename(_))
        ));
        assert!(matches!(
            Entry::new_file(EntryKind::Custom, "a|b.txt"),
            Err(Error::InvalidFilename(_))
        ));
        assert!(Entry::new_file(EntryKind::Misc, "a.txt").is_err());

        let e = Entry::new_file(EntryKind::Signal, "noext").unwrap();
        assert_eq!(e.name(), "signalEntry");
        assert_eq!(e.extension(), None);
    }

    #[test]
    fn test_path_with_subfolders() {
        let e = Entry::new_file(EntryKind::Custom, "sub\\dir/test.TXT").unwrap();
        e.set_folder(Path::new("/data"));
        assert_eq!(e.path().unwrap(), Path::new("/data/sub/dir/test.TXT"));
        assert_eq!(e.extension().as_deref(), Some("txt"));
    }

    #[test]
    fn test_io_rejects_illegal_id() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let folder = dir.path().join("rec");
        let e = Entry::misc("customEntry");
        e.set_attr("id", "../escaped.bin")?;
        e.set_folder(&folder);

        assert!(matches!(e.write_file(&[1]), Err(Error::InvalidFilename(_))));
        assert!(matches!(e.read_file(), Err(Error::InvalidFilename(_))));
        assert!(!dir.path().join("escaped.bin").exists());
        Ok(())
    }

    #[test]
    fn test_write_and_read_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let e = Entry::new_file(EntryKind::Custom, "nested/blob.bin")?;
        e.set_folder(dir.path());
        assert!(!e.file_exists());

        e.write_file(&[1, 2, 3])?;
        assert!(e.file_exists());
        assert_eq!(&*e.read_file()?, &[1, 2, 3]);

        e.write_file(&[])?;
        assert!(e.read_file()?.is_empty());
        Ok(())
    }
}
