//! Delimited-text codec.
//!
//! Records are one per line, fields joined by a configurable separator.
//! Numbers are written with a configurable decimal separator. Lines starting
//! with `#` are comments.

use std::fmt;

use crate::core::Entry;
use crate::util::{Error, Result};

/// Default field separator.
pub const DEFAULT_SEPARATOR: &str = ";";
/// Default decimal separator.
pub const DEFAULT_DECIMAL_SEPARATOR: &str = ".";

/// A scalar field of a delimited-text record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric value, `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }

    /// Integer value, `None` for floats and text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Text value, `None` for numbers.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Format the field with the given decimal separator.
    pub fn format(&self, decimal_separator: &str) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            // Debug formatting always keeps a decimal point or an exponent,
            // so floats are read back as floats.
            Value::Float(f) => format!("{f:?}").replace('.', decimal_separator),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(DEFAULT_DECIMAL_SEPARATOR))
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $target)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64,
    u8 => Int as i64,
    i16 => Int as i64,
    u16 => Int as i64,
    i32 => Int as i64,
    u32 => Int as i64,
    i64 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Convert a field to the most specific value: integer, then float, then text.
///
/// `decimal_separator` is replaced by `.` before the float parse. Digit
/// grouping with `_` is not accepted as a number.
pub fn str_to_value(s: &str, decimal_separator: &str) -> Value {
    let s = s.trim();
    if s.contains('_') || s.is_empty() {
        return Value::Text(s.to_string());
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Int(i);
    }
    let normalized = if decimal_separator == "." {
        s.to_string()
    } else {
        s.replace(decimal_separator, ".")
    };
    match normalized.parse::<f64>() {
        Ok(f) => Value::Float(f),
        Err(_) => Value::Text(s.to_string()),
    }
}

/// Separator configuration of a delimited-text file (`csvFileFormat`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvFormat {
    separator: String,
    decimal_separator: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            decimal_separator: DEFAULT_DECIMAL_SEPARATOR.to_string(),
        }
    }
}

impl CsvFormat {
    /// Create a format. Both separators must be non-empty and differ.
    pub fn new(separator: &str, decimal_separator: &str) -> Result<Self> {
        if separator.is_empty() || decimal_separator.is_empty() {
            return Err(Error::IncompatibleConfig(
                "separator and decimal separator must not be empty".into(),
            ));
        }
        if separator == decimal_separator {
            return Err(Error::IncompatibleConfig(format!(
                "separator and decimal separator are both {separator:?}"
            )));
        }
        Ok(Self {
            separator: separator.to_string(),
            decimal_separator: decimal_separator.to_string(),
        })
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn decimal_separator(&self) -> &str {
        &self.decimal_separator
    }

    /// Read the format of an entry from its `csvFileFormat` child.
    ///
    /// Missing children or attributes fall back to `;` and `.`.
    pub fn from_entry(entry: &Entry) -> Result<Self> {
        match entry.child_named("csvFileFormat") {
            Some(node) => Self::new(
                &node.attr_or("separator", DEFAULT_SEPARATOR),
                &node.attr_or("decimalSeparator", DEFAULT_DECIMAL_SEPARATOR),
            ),
            None => Ok(Self::default()),
        }
    }

    /// Build the `csvFileFormat` metadata node.
    pub fn to_entry(&self) -> Result<Entry> {
        let node = Entry::misc("csvFileFormat");
        node.set_attr("separator", &self.separator)?;
        node.set_attr("decimalSeparator", &self.decimal_separator)?;
        Ok(node)
    }

    /// Render records, preceded by `#` comment lines.
    pub fn write_rows<R: AsRef<[Value]>>(&self, rows: &[R], comment: Option<&str>) -> String {
        let mut out = String::new();
        if let Some(comment) = comment {
            for line in comment.lines() {
                out.push_str("# ");
                out.push_str(line);
                out.push('\n');
            }
        }
        for row in rows {
            let fields: Vec<String> = row
                .as_ref()
                .iter()
                .map(|v| self.quote(v.format(&self.decimal_separator)))
                .collect();
            out.push_str(&fields.join(&self.separator));
            out.push('\n');
        }
        out
    }

    fn quote(&self, field: String) -> String {
        if field.contains(self.separator.as_str()) || field.contains('"') || field.contains('\n') {
            format!("\"{}\"", field.replace('"', "\"\""))
        } else {
            field
        }
    }

    /// Split text into records of trimmed string fields.
    ///
    /// Comment and blank lines are skipped; trailing empty fields left by a
    /// trailing separator are dropped.
    pub fn parse_strings(&self, text: &str) -> Vec<Vec<String>> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let mut fields = split_record(line, &self.separator);
                while fields.last().is_some_and(|f| f.is_empty()) {
                    fields.pop();
                }
                fields
            })
            .collect()
    }

    /// Split text into records of typed values.
    pub fn parse_values(&self, text: &str) -> Vec<Vec<Value>> {
        self.parse_strings(text)
            .into_iter()
            .map(|row| {
                row.iter()
                    .map(|f| str_to_value(f, &self.decimal_separator))
                    .collect()
            })
            .collect()
    }
}

fn split_record(line: &str, separator: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut rest = line;

    while let Some(c) = rest.chars().next() {
        if quoted {
            if rest.starts_with("\"\"") {
                field.push('"');
                rest = &rest[2..];
                continue;
            }
            if c == '"' {
                quoted = false;
            } else {
                field.push(c);
            }
        } else if rest.starts_with(separator) {
            fields.push(field.trim().to_string());
            field.clear();
            rest = &rest[separator.len()..];
            continue;
        } else if c == '"' && field.trim().is_empty() {
            field.clear();
            quoted = true;
        } else {
            field.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    fields.push(field.trim().to_string());
    fields
}

/// Output shape of [`read`](crate::entry::ValuesEntry::get_data_as).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Records with numeric coercion
    #[default]
    List,
    /// Plain string fields
    Strings,
    /// First column as index, remaining columns as data
    Table,
}

/// Table view of delimited-text records.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsvTable {
    /// First field of every record
    pub index: Vec<Value>,
    /// Remaining fields of every record
    pub rows: Vec<Vec<Value>>,
}

impl CsvTable {
    /// Build a table from records, using the first field as index.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        let mut table = Self::default();
        for mut row in rows {
            if row.is_empty() {
                continue;
            }
            table.index.push(row.remove(0));
            table.rows.push(row);
        }
        table
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// One data column, `None` where a record is too short.
    pub fn column(&self, col: usize) -> Vec<Option<&Value>> {
        self.rows.iter().map(|r| r.get(col)).collect()
    }
}

/// Decoded records in the requested [`ReadMode`].
#[derive(Clone, Debug, PartialEq)]
pub enum CsvData {
    List(Vec<Vec<Value>>),
    Strings(Vec<Vec<String>>),
    Table(CsvTable),
}
