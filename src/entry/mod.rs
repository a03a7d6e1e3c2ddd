//! Typed entries.
//!
//! Every typed entry is a thin wrapper around an [`Entry`] handle of the
//! matching [`EntryKind`]. Wrappers deref to `Entry`, so tree and attribute
//! operations are available on all of them:
//!
//! - [`SignalEntry`] - binary or delimited-text signal channels
//! - [`ValuesEntry`] / [`EventEntry`] - delimited-text records
//! - [`CustomEntry`] - opaque files with format dispatch
//! - [`CustomAttributes`] / [`MiscEntry`] - metadata nodes

/// Define a kind-checked wrapper around [`Entry`](crate::core::Entry).
macro_rules! entry_wrapper {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name($crate::core::Entry);

        impl $name {
            /// The underlying tree handle.
            #[inline]
            pub fn entry(&self) -> &$crate::core::Entry {
                &self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::core::Entry;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<$crate::core::Entry> for $name {
            #[inline]
            fn as_ref(&self) -> &$crate::core::Entry {
                &self.0
            }
        }

        impl From<$name> for $crate::core::Entry {
            #[inline]
            fn from(e: $name) -> Self {
                e.0
            }
        }

        impl TryFrom<$crate::core::Entry> for $name {
            type Error = $crate::util::Error;

            fn try_from(entry: $crate::core::Entry) -> $crate::util::Result<Self> {
                let kind = entry.kind();
                if kind == $crate::core::EntryKind::$kind {
                    Ok(Self(entry))
                } else {
                    Err($crate::util::Error::TypeMismatch {
                        expected: stringify!($name).to_string(),
                        actual: format!("{:?}", kind),
                    })
                }
            }
        }
    };
}

pub mod csv;
pub mod custom;
pub mod file;
pub mod meta;
pub mod signal;
pub mod values;

pub use self::csv::{str_to_value, CsvData, CsvFormat, CsvTable, ReadMode, Value};
pub use custom::{CodecRegistry, CustomCodec, CustomData, CustomEntry, CustomFormat};
pub use file::DataFile;
pub use meta::{CustomAttributes, MiscEntry};
pub use signal::{SignalEntry, SignalOptions};
pub use values::{CsvOptions, EventEntry, ValuesEntry};
