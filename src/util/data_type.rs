//! DataType - the canonical element type vocabulary of signal files.

use super::{Error, NativeType, Result};
use std::fmt;
use std::str::FromStr;

/// Element type of a signal data file, as recorded in the `dataType` attribute.
///
/// Only these eight types are part of the format. Everything else is
/// rejected with [`Error::UnsupportedDataType`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    Double,
    Float,
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
}

impl DataType {
    /// All canonical data types.
    pub const ALL: [DataType; 8] = [
        Self::Double,
        Self::Float,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
    ];

    /// Returns the size in bytes of a single element.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Double => 8,
            Self::Float => 4,
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 => 4,
        }
    }

    /// Returns the attribute spelling of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
        }
    }

    /// Returns true for the integer types.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::Double | Self::Float)
    }

    /// Smallest and largest representable value, as f64.
    pub const fn range(self) -> (f64, f64) {
        match self {
            Self::Double => (f64::MIN, f64::MAX),
            Self::Float => (f32::MIN as f64, f32::MAX as f64),
            Self::Int8 => (i8::MIN as f64, i8::MAX as f64),
            Self::Int16 => (i16::MIN as f64, i16::MAX as f64),
            Self::Int32 => (i32::MIN as f64, i32::MAX as f64),
            Self::Uint8 => (0.0, u8::MAX as f64),
            Self::Uint16 => (0.0, u16::MAX as f64),
            Self::Uint32 => (0.0, u32::MAX as f64),
        }
    }

    /// Map a native element type onto the canonical vocabulary.
    pub fn from_native(native: NativeType) -> Result<Self> {
        match native {
            NativeType::Float64 => Ok(Self::Double),
            NativeType::Float32 => Ok(Self::Float),
            NativeType::Int8 => Ok(Self::Int8),
            NativeType::Int16 => Ok(Self::Int16),
            NativeType::Int32 => Ok(Self::Int32),
            NativeType::Uint8 => Ok(Self::Uint8),
            NativeType::Uint16 => Ok(Self::Uint16),
            NativeType::Uint32 => Ok(Self::Uint32),
            other => Err(Error::UnsupportedDataType(other.name().to_string())),
        }
    }

    /// The native element type this data type is stored as.
    pub const fn native(self) -> NativeType {
        match self {
            Self::Double => NativeType::Float64,
            Self::Float => NativeType::Float32,
            Self::Int8 => NativeType::Int8,
            Self::Int16 => NativeType::Int16,
            Self::Int32 => NativeType::Int32,
            Self::Uint8 => NativeType::Uint8,
            Self::Uint16 => NativeType::Uint16,
            Self::Uint32 => NativeType::Uint32,
        }
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Parse the attribute spelling, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dt| dt.name() == lower)
            .ok_or_else(|| Error::UnsupportedDataType(s.to_string()))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of a binary signal file (`binFileFormat/@endianess`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// Byte order of the running host.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }

    /// Returns the attribute spelling (`LITTLE` / `BIG`).
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Little => "LITTLE",
            Self::Big => "BIG",
        }
    }
}

impl FromStr for ByteOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LITTLE" => Ok(Self::Little),
            "BIG" => Ok(Self::Big),
            _ => Err(Error::malformed(format!("unknown endianess: {s}"))),
        }
    }
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
