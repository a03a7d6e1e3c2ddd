//! Values and event entries, both stored as delimited text.
//!
//! A values entry holds one record per sample: a timestamp (in samples)
//! followed by one column per channel. An event entry holds
//! `(time, label[, comment])` records.

use tracing::debug;

use super::csv::{CsvData, CsvFormat, CsvTable, ReadMode, Value};
use super::signal::reconcile_channels;
use crate::core::{Entry, EntryKind};
use crate::util::{Error, Result};

entry_wrapper! {
    /// A `valuesEntry`: irregularly sampled values of one or more channels.
    ValuesEntry => Values
}

entry_wrapper! {
    /// An `eventEntry`: time-stamped labels.
    EventEntry => Event
}

/// Parameters for writing delimited-text records.
#[derive(Clone, Debug, Default)]
pub struct CsvOptions {
    pub sample_rate: Option<f64>,
    /// Channel names for values entries (one per data column)
    pub channel_names: Option<Vec<String>>,
    /// Written as leading `#` lines
    pub comment: Option<String>,
    pub unit: Option<String>,
    pub content_class: Option<String>,
    /// Additional attributes, set verbatim
    pub extra: Vec<(String, String)>,
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn channel_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.channel_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn content_class(mut self, content_class: impl Into<String>) -> Self {
        self.content_class = Some(content_class.into());
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.push((key.into(), value.to_string()));
        self
    }
}

/// Create a delimited-text entry with a `csvFileFormat` child.
fn new_csv_entry(kind: EntryKind, id: &str, format: &CsvFormat) -> Result<Entry> {
    let entry = Entry::new_file(kind, id)?;
    entry.add_entry(format.to_entry()?)?;
    Ok(entry)
}

/// Write records and their metadata to a delimited-text entry.
fn write_records<R: AsRef<[Value]>>(entry: &Entry, rows: &[R], opts: &CsvOptions) -> Result<()> {
    entry.ensure_writable()?;
    let format = CsvFormat::from_entry(entry)?;
    let text = format.write_rows(rows, opts.comment.as_deref());
    entry.write_file(text.as_bytes())?;
    debug!(id = %entry.key(), records = rows.len(), "records written");

    if let Some(rate) = opts.sample_rate {
        entry.set_attr("sampleRate", rate)?;
    }
    if let Some(unit) = &opts.unit {
        entry.set_attr("unit", unit)?;
    }
    if let Some(class) = &opts.content_class {
        entry.set_attr("contentClass", class)?;
    }
    for (key, value) in &opts.extra {
        entry.set_attr(key, value)?;
    }
    Ok(())
}

fn read_records(entry: &Entry, mode: ReadMode) -> Result<CsvData> {
    let format = CsvFormat::from_entry(entry)?;
    let text = String::from_utf8(entry.read_file()?.to_vec())?;
    Ok(match mode {
        ReadMode::List => CsvData::List(format.parse_values(&text)),
        ReadMode::Strings => CsvData::Strings(format.parse_strings(&text)),
        ReadMode::Table => CsvData::Table(CsvTable::from_rows(format.parse_values(&text))),
    })
}

fn read_list(entry: &Entry) -> Result<Vec<Vec<Value>>> {
    let format = CsvFormat::from_entry(entry)?;
    let text = String::from_utf8(entry.read_file()?.to_vec())?;
    Ok(format.parse_values(&text))
}

macro_rules! csv_entry_impl {
    ($name:ident, $kind:ident) => {
        impl $name {
            /// Create a detached entry with the default `;` / `.` separators.
            pub fn new(id: &str) -> Result<Self> {
                Self::with_format(id, CsvFormat::default())
            }

            /// Create a detached entry with custom separators.
            pub fn with_format(id: &str, format: CsvFormat) -> Result<Self> {
                Ok(Self(new_csv_entry(EntryKind::$kind, id, &format)?))
            }

            /// Separators of the backing file.
            pub fn format(&self) -> Result<CsvFormat> {
                CsvFormat::from_entry(self)
            }

            /// Read the records with numeric coercion.
            pub fn get_data(&self) -> Result<Vec<Vec<Value>>> {
                read_list(self)
            }

            /// Read the records in the given shape.
            pub fn get_data_as(&self, mode: ReadMode) -> Result<CsvData> {
                read_records(self, mode)
            }
        }
    };
}

csv_entry_impl!(ValuesEntry, Values);
csv_entry_impl!(EventEntry, Event);

impl ValuesEntry {
    /// Write records of `(time, value, value, ...)`.
    ///
    /// Channels are reconciled against the number of value columns.
    pub fn set_data<R: AsRef<[Value]>>(&self, rows: &[R], opts: CsvOptions) -> Result<()> {
        let columns = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        if let Some(i) = rows.iter().position(|r| r.as_ref().len() != columns) {
            return Err(Error::bad_data(format!(
                "record {i} has {} fields, expected {columns}",
                rows[i].as_ref().len()
            )));
        }
        reconcile_channels(self, opts.channel_names.as_deref(), columns.saturating_sub(1))?;
        write_records(self, rows, &opts)
    }
}

impl EventEntry {
    /// Write event records, usually `(time, label)` pairs.
    pub fn set_data<R: AsRef<[Value]>>(&self, rows: &[R], opts: CsvOptions) -> Result<()> {
        write_records(self, rows, &opts)
    }

    /// Write `(time, label)` pairs.
    pub fn set_events<L: ToString>(&self, events: &[(i64, L)], opts: CsvOptions) -> Result<()> {
        let rows: Vec<[Value; 2]> = events
            .iter()
            .map(|(t, label)| [Value::Int(*t), Value::Text(label.to_string())])
            .collect();
        self.set_data(&rows, opts)
    }

    fn pairs(&self) -> Result<Vec<(Value, Value)>> {
        read_list(self)?
            .into_iter()
            .enumerate()
            .map(|(i, row)| match <[Value; 2]>::try_from(row) {
                Ok([time, label]) => Ok((time, label)),
                Err(row) => Err(Error::bad_data(format!(
                    "event {i} has {} fields, expected time and label",
                    row.len()
                ))),
            })
            .collect()
    }

    /// Event times, in samples.
    pub fn get_times(&self) -> Result<Vec<Value>> {
        Ok(self.pairs()?.into_iter().map(|(t, _)| t).collect())
    }

    /// Event labels.
    pub fn get_labels(&self) -> Result<Vec<String>> {
        Ok(self
            .pairs()?
            .into_iter()
            .map(|(_, label)| label.to_string())
            .collect())
    }
}
