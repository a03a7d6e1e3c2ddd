//! Custom entries: opaque files with format dispatch.
//!
//! The storage format of a custom entry is chosen by the `dataType`
//! attribute when present, by the file extension otherwise. Binary, text,
//! delimited-text and JSON are built in, images need the `image` feature.
//! Any format, including `numpy` and `pickle`, can be handled by a codec
//! registered in a [`CodecRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use super::csv::{CsvFormat, Value};
use crate::core::{Entry, EntryKind};
use crate::util::{Error, Matrix, Result};

entry_wrapper! {
    /// A `customEntry`: a file in a format the container does not interpret.
    CustomEntry => Custom
}

/// Storage format of a custom entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CustomFormat {
    Binary,
    Text,
    Csv,
    Json,
    Image,
    Numpy,
    Pickle,
}

impl CustomFormat {
    pub const ALL: [CustomFormat; 7] = [
        Self::Binary,
        Self::Text,
        Self::Csv,
        Self::Json,
        Self::Image,
        Self::Numpy,
        Self::Pickle,
    ];

    /// The `dataType` attribute spelling.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Text => "text",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Image => "image",
            Self::Numpy => "numpy",
            Self::Pickle => "pickle",
        }
    }

    /// Format for a (lower-case) file extension, binary if unknown.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("txt") => Self::Text,
            Some("csv") => Self::Csv,
            Some("json") => Self::Json,
            Some("jpg" | "jpeg" | "png" | "bmp" | "gif" | "tif" | "tiff") => Self::Image,
            Some("npy") => Self::Numpy,
            Some("pkl" | "pickle") => Self::Pickle,
            _ => Self::Binary,
        }
    }
}

impl FromStr for CustomFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == lower)
            .ok_or_else(|| Error::UnsupportedDataType(s.to_string()))
    }
}

impl fmt::Display for CustomFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded content of a custom entry.
#[derive(Clone, Debug, PartialEq)]
pub enum CustomData {
    Bytes(Vec<u8>),
    Text(String),
    Records(Vec<Vec<Value>>),
    Json(serde_json::Value),
    /// Numeric array, produced and consumed by registered codecs
    Array(Matrix<f64>),
    #[cfg(feature = "image")]
    Image(image::DynamicImage),
}

impl CustomData {
    fn kind(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::Text(_) => "text",
            Self::Records(_) => "records",
            Self::Json(_) => "json",
            Self::Array(_) => "array",
            #[cfg(feature = "image")]
            Self::Image(_) => "image",
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            Self::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&[Vec<Value>]> {
        match self {
            Self::Records(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Matrix<f64>> {
        match self {
            Self::Array(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for CustomData {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for CustomData {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl From<String> for CustomData {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for CustomData {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<Vec<Value>>> for CustomData {
    fn from(v: Vec<Vec<Value>>) -> Self {
        Self::Records(v)
    }
}

impl From<serde_json::Value> for CustomData {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Matrix<f64>> for CustomData {
    fn from(v: Matrix<f64>) -> Self {
        Self::Array(v)
    }
}

#[cfg(feature = "image")]
impl From<image::DynamicImage> for CustomData {
    fn from(v: image::DynamicImage) -> Self {
        Self::Image(v)
    }
}

/// A user-supplied codec for one [`CustomFormat`].
pub trait CustomCodec {
    fn encode(&self, data: &CustomData) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<CustomData>;
}

/// Codecs that take precedence over the built-in ones.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<CustomFormat, Box<dyn CustomCodec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec, replacing any previous one for `format`.
    pub fn register(
        &mut self,
        format: CustomFormat,
        codec: impl CustomCodec + 'static,
    ) -> &mut Self {
        self.codecs.insert(format, Box::new(codec));
        self
    }

    pub fn get(&self, format: CustomFormat) -> Option<&dyn CustomCodec> {
        self.codecs.get(&format).map(|c| c.as_ref())
    }

    pub fn contains(&self, format: CustomFormat) -> bool {
        self.codecs.contains_key(&format)
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.codecs.keys()).finish()
    }
}

fn mismatch(format: CustomFormat, data: &CustomData) -> Error {
    Error::TypeMismatch {
        expected: format.to_string(),
        actual: data.kind().to_string(),
    }
}

fn no_codec(format: CustomFormat) -> Error {
    Error::UnsupportedDataType(format!("{format} (no codec registered)"))
}

impl CustomEntry {
    /// Create a detached custom entry.
    pub fn new(id: &str) -> Result<Self> {
        Ok(Self(Entry::new_file(EntryKind::Custom, id)?))
    }

    /// Storage format: the recorded `dataType`, else the extension.
    pub fn format(&self) -> Result<CustomFormat> {
        match self.attr("dataType") {
            Some(dt) => dt.parse(),
            None => Ok(CustomFormat::from_extension(self.extension().as_deref())),
        }
    }

    /// Store data with the built-in codecs.
    pub fn set_data(
        &self,
        data: impl Into<CustomData>,
        format: Option<CustomFormat>,
    ) -> Result<()> {
        self.set_data_with(&CodecRegistry::default(), data, format)
    }

    /// Store data, preferring codecs from `registry`.
    ///
    /// The chosen format is recorded as the `dataType` attribute.
    pub fn set_data_with(
        &self,
        registry: &CodecRegistry,
        data: impl Into<CustomData>,
        format: Option<CustomFormat>,
    ) -> Result<()> {
        self.ensure_writable()?;
        let data = data.into();
        let format = match format {
            Some(f) => f,
            None => self.format()?,
        };
        let bytes = match registry.get(format) {
            Some(codec) => codec.encode(&data)?,
            None => self.encode_builtin(format, &data)?,
        };
        self.write_file(&bytes)?;
        debug!(id = %self.key(), format = %format, "custom data written");
        self.set_attr("dataType", format)?;
        Ok(())
    }

    /// Load data with the built-in codecs.
    pub fn get_data(&self, format: Option<CustomFormat>) -> Result<CustomData> {
        self.get_data_with(&CodecRegistry::default(), format)
    }

    /// Load data, preferring codecs from `registry`.
    pub fn get_data_with(
        &self,
        registry: &CodecRegistry,
        format: Option<CustomFormat>,
    ) -> Result<CustomData> {
        let format = match format {
            Some(f) => f,
            None => self.format()?,
        };
        let file = self.read_file()?;
        match registry.get(format) {
            Some(codec) => codec.decode(&file),
            None => self.decode_builtin(format, &file),
        }
    }

    fn encode_builtin(&self, format: CustomFormat, data: &CustomData) -> Result<Vec<u8>> {
        match (format, data) {
            (CustomFormat::Binary | CustomFormat::Text, _) => data
                .as_bytes()
                .map(<[u8]>::to_vec)
                .ok_or_else(|| mismatch(format, data)),
            (CustomFormat::Csv, CustomData::Records(rows)) => {
                let csv = CsvFormat::from_entry(self)?;
                Ok(csv.write_rows(rows, None).into_bytes())
            }
            (CustomFormat::Json, CustomData::Json(value)) => Ok(serde_json::to_vec_pretty(value)?),
            #[cfg(feature = "image")]
            (CustomFormat::Image, CustomData::Image(img)) => {
                let ext = self.extension().unwrap_or_default();
                let img_format = image::ImageFormat::from_extension(&ext)
                    .ok_or_else(|| Error::UnsupportedDataType(format!("image/{ext}")))?;
                let mut buf = std::io::Cursor::new(Vec::new());
                img.write_to(&mut buf, img_format)?;
                Ok(buf.into_inner())
            }
            #[cfg(not(feature = "image"))]
            (CustomFormat::Image, _) => Err(no_codec(format)),
            (CustomFormat::Numpy | CustomFormat::Pickle, _) => Err(no_codec(format)),
            _ => Err(mismatch(format, data)),
        }
    }

    fn decode_builtin(&self, format: CustomFormat, bytes: &[u8]) -> Result<CustomData> {
        match format {
            CustomFormat::Binary => Ok(CustomData::Bytes(bytes.to_vec())),
            CustomFormat::Text => Ok(CustomData::Text(String::from_utf8(bytes.to_vec())?)),
            CustomFormat::Csv => {
                let csv = CsvFormat::from_entry(self)?;
                let text = String::from_utf8(bytes.to_vec())?;
                Ok(CustomData::Records(csv.parse_values(&text)))
            }
            CustomFormat::Json => Ok(CustomData::Json(serde_json::from_slice(bytes)?)),
            #[cfg(feature = "image")]
            CustomFormat::Image => Ok(CustomData::Image(image::load_from_memory(bytes)?)),
            #[cfg(not(feature = "image"))]
            CustomFormat::Image => Err(no_codec(format)),
            CustomFormat::Numpy | CustomFormat::Pickle => Err(no_codec(format)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn custom_in(dir: &std::path::Path, id: &str) -> CustomEntry {
        let e = CustomEntry::new(id).unwrap();
        e.set_folder(dir);
        e
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(CustomFormat::from_extension(Some("txt")), CustomFormat::Text);
        assert_eq!(CustomFormat::from_extension(Some("tiff")), CustomFormat::Image);
        assert_eq!(CustomFormat::from_extension(Some("pickle")), CustomFormat::Pickle);
        assert_eq!(CustomFormat::from_extension(Some("dat")), CustomFormat::Binary);
        assert_eq!(CustomFormat::from_extension(None), CustomFormat::Binary);
        assert_eq!("JSON".parse::<CustomFormat>().unwrap(), CustomFormat::Json);
    }

    #[test]
    fn test_text_and_binary() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let text = custom_in(dir.path(), "notes.txt");
        text.set_data("hello unisens", None)?;
        assert_eq!(text.attr("dataType").as_deref(), Some("text"));
        assert_eq!(text.get_data(None)?.as_text(), Some("hello unisens"));

        let blob = custom_in(dir.path(), "blob.dat");
        blob.set_data(vec![0u8, 159, 146, 150], None)?;
        assert_eq!(blob.get_data(None)?, CustomData::Bytes(vec![0, 159, 146, 150]));
        Ok(())
    }

    #[test]
    fn test_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let e = custom_in(dir.path(), "meta.json");
        let value = json!({"subject": 12, "tags": ["a", "b"]});
        e.set_data(value.clone(), None)?;
        assert_eq!(e.get_data(None)?.as_json(), Some(&value));
        Ok(())
    }

    #[test]
    fn test_recorded_data_type_wins() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let e = custom_in(dir.path(), "table.bin");
        let rows = vec![vec![Value::Int(1), Value::from("x")]];
        e.set_data(rows.clone(), Some(CustomFormat::Csv))?;
        assert_eq!(e.format()?, CustomFormat::Csv);
        assert_eq!(e.get_data(None)?.as_records(), Some(&rows[..]));
        Ok(())
    }

    #[test]
    fn test_type_mismatch_and_missing_codec() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let e = custom_in(dir.path(), "meta.json");
        assert!(matches!(e.set_data("not json", None), Err(Error::TypeMismatch { .. })));

        let npy = custom_in(dir.path(), "array.npy");
        let m = Matrix::from_row(vec![1.0, 2.0]);
        assert!(matches!(npy.set_data(m, None), Err(Error::UnsupportedDataType(_))));
        Ok(())
    }

    struct LineArrayCodec;

    impl CustomCodec for LineArrayCodec {
        fn encode(&self, data: &CustomData) -> Result<Vec<u8>> {
            let m = data.as_array().ok_or_else(|| Error::other("expected array"))?;
            let text: Vec<String> = m.as_slice().iter().map(f64::to_string).collect();
            Ok(text.join("\n").into_bytes())
        }

        fn decode(&self, bytes: &[u8]) -> Result<CustomData> {
            let text = String::from_utf8(bytes.to_vec())?;
            let values = text
                .lines()
                .map(|l| l.parse::<f64>().map_err(|e| Error::bad_data(e.to_string())))
                .collect::<Result<Vec<_>>>()?;
            Ok(CustomData::Array(Matrix::from_row(values)))
        }
    }

    #[test]
    fn test_registered_codec() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut registry = CodecRegistry::new();
        registry.register(CustomFormat::Numpy, LineArrayCodec);
        assert!(registry.contains(CustomFormat::Numpy));

        let e = custom_in(dir.path(), "array.npy");
        let m = Matrix::from_row(vec![1.5, -2.0, 3.25]);
        e.set_data_with(&registry, m.clone(), None)?;
        assert_eq!(e.attr("dataType").as_deref(), Some("numpy"));
        assert_eq!(e.get_data_with(&registry, None)?.as_array(), Some(&m));
        Ok(())
    }
}
