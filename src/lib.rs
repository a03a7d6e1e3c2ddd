//! # Unisens
//!
//! Rust implementation of the Unisens 2.0 data container format for
//! multi-sensor recordings.
//!
//! A container is a folder with an XML document (`unisens.xml`) describing
//! typed entries, most of them backed by a data file in the same folder.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (DataType, Matrix, errors, name helpers)
//! - [`core`] - Entry tree, attributes and fuzzy lookup
//! - [`xml`] - XML element tree, reader/writer and entry codec
//! - [`entry`] - Typed entries and their data codecs
//! - [`container`] - The container root and persistence
//!
//! ## Example
//!
//! ```ignore
//! use unisens::prelude::*;
//!
//! let u = Unisens::open("recording")?;
//! let ecg = SignalEntry::try_from(u.get("ecg")?)?;
//! let data = ecg.get_data(true)?;
//!
//! for (name, row) in ecg.channel_names().iter().zip(data.iter_rows()) {
//!     println!("{}: {} samples", name, row.len());
//! }
//! ```

pub mod util;
pub mod core;
pub mod xml;
pub mod entry;
pub mod container;

// Re-export commonly used types
pub use util::{DataType, Error, Matrix, Result};
pub use core::{Entry, EntryKind};
pub use container::{Unisens, UnisensOptions};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{ByteOrder, DataType, Error, Matrix, Result, Sample};
    pub use crate::core::{Attributes, Entry, EntryKind};
    pub use crate::entry::{
        CsvFormat, CsvOptions, CustomAttributes, CustomData, CustomEntry, CustomFormat,
        EventEntry, MiscEntry, ReadMode, SignalEntry, SignalOptions, Value, ValuesEntry,
    };
    pub use crate::container::{Unisens, UnisensOptions};
}
