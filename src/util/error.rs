//! Error types for the Unisens library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Unisens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Attribute name is not a legal identifier (empty or starts with a digit)
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Attribute to remove does not exist
    #[error("Attribute not found: {0}")]
    KeyNotFound(String),

    /// Entry id is not a legal relative filename
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// No child matches a lookup key
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// More than one child matches a fuzzy lookup key
    #[error("Ambiguous key {key}: matches {candidates:?}")]
    Ambiguous { key: String, candidates: Vec<String> },

    /// Container already holds an entry with this id
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Write attempted on a read-only container
    #[error("Container is read-only")]
    ReadOnlyViolation,

    /// Mutually exclusive options were requested
    #[error("Incompatible configuration: {0}")]
    IncompatibleConfig(String),

    /// Casting to the target data type would change a value
    #[error("Precision loss: {value} cannot be stored as {data_type}")]
    PrecisionLoss { value: f64, data_type: String },

    /// Channel names do not match the number of data rows
    #[error("Channel mismatch: expected {expected} channels, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },

    /// Data type outside the canonical vocabulary
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// Typed read does not match the declared data type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// XML parse failure or structurally invalid element
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Data file content does not fit the declared layout
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// Document file does not exist
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// XML reader/writer error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// JSON codec error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image codec error
    #[cfg(feature = "image")]
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a malformed document error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }

    /// Create a malformed data error.
    pub fn bad_data(msg: impl Into<String>) -> Self {
        Self::MalformedData(msg.into())
    }
}

/// Result type alias for Unisens operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::ChannelMismatch { expected: 5, actual: 3 };
        assert!(e.to_string().contains('5'));
        assert!(e.to_string().contains('3'));

        let e = Error::Ambiguous {
            key: "double".into(),
            candidates: vec!["double.csv".into(), "double.bin".into()],
        };
        assert!(e.to_string().contains("double.bin"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
