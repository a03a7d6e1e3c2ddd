//! Signal entries and the binary signal codec.
//!
//! In memory, signal data is a channel-major [`Matrix`]: one row per channel.
//! Binary files store the samples interleaved (sample 0 of every channel,
//! then sample 1, ...) in the byte order recorded by the `binFileFormat`
//! child. Ids ending in `.csv` are stored as delimited text instead, one
//! line per sample.

use byteorder::{BigEndian, LittleEndian, NativeEndian, WriteBytesExt};
use tracing::{debug, warn};

use super::csv::{CsvFormat, Value};
use crate::core::{Entry, EntryKind};
use crate::util::{ByteOrder, DataType, Error, Matrix, Result, Sample};

entry_wrapper! {
    /// A `signalEntry`: sampled data of one or more channels.
    SignalEntry => Signal
}

/// Parameters for [`SignalEntry::set_data`].
#[derive(Clone, Debug, Default)]
pub struct SignalOptions {
    pub sample_rate: Option<f64>,
    /// Stored data type; inferred from the element type when unset
    pub data_type: Option<DataType>,
    pub channel_names: Option<Vec<String>>,
    /// Scaling factor; written as 1 when unset and not yet recorded
    pub lsb_value: Option<f64>,
    pub baseline: Option<f64>,
    pub unit: Option<String>,
    pub comment: Option<String>,
    pub content_class: Option<String>,
    pub adc_resolution: Option<u32>,
    /// Separators for `.csv` signals
    pub csv_format: Option<CsvFormat>,
    /// Additional attributes, set verbatim
    pub extra: Vec<(String, String)>,
}

impl SignalOptions {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            ..Default::default()
        }
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn channel_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.channel_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn lsb_value(mut self, lsb: f64) -> Self {
        self.lsb_value = Some(lsb);
        self
    }

    pub fn baseline(mut self, baseline: f64) -> Self {
        self.baseline = Some(baseline);
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn content_class(mut self, content_class: impl Into<String>) -> Self {
        self.content_class = Some(content_class.into());
        self
    }

    pub fn adc_resolution(mut self, bits: u32) -> Self {
        self.adc_resolution = Some(bits);
        self
    }

    pub fn csv_format(mut self, format: CsvFormat) -> Self {
        self.csv_format = Some(format);
        self
    }

    /// Add an attribute that is written as is.
    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.push((key.into(), value.to_string()));
        self
    }
}

impl SignalEntry {
    /// Create a detached signal entry.
    pub fn new(id: &str) -> Result<Self> {
        Ok(Self(Entry::new_file(EntryKind::Signal, id)?))
    }

    /// True if the data is stored as delimited text.
    pub fn is_csv(&self) -> bool {
        self.extension().as_deref() == Some("csv")
    }

    /// Declared data type (`dataType` attribute).
    pub fn data_type(&self) -> Result<DataType> {
        self.attr("dataType")
            .ok_or_else(|| Error::malformed(format!("{} has no dataType", self.key())))?
            .parse()
    }

    /// Sample rate in Hz, if recorded.
    pub fn sample_rate(&self) -> Option<f64> {
        self.attr_as("sampleRate")
    }

    /// Byte order of the binary file, little endian when not recorded.
    pub fn byte_order(&self) -> Result<ByteOrder> {
        match self.child_named("binFileFormat").and_then(|n| n.attr("endianess")) {
            Some(order) => order.parse(),
            None => {
                warn!(id = %self.key(), "binFileFormat missing, assuming LITTLE endian");
                Ok(ByteOrder::Little)
            }
        }
    }

    /// Number of channels, 1 when no `channel` children exist.
    pub fn num_channels(&self) -> usize {
        self.channels().len().max(1)
    }

    /// Store a channel-major matrix and record its metadata.
    ///
    /// Integer targets round values first; values outside the target range
    /// fail with [`Error::PrecisionLoss`].
    pub fn set_data<T: Sample>(&self, data: &Matrix<T>, opts: SignalOptions) -> Result<()> {
        self.ensure_writable()?;
        let data_type = match opts.data_type {
            Some(dt) => dt,
            None => DataType::from_native(T::NATIVE)?,
        };
        let values = data.map(T::to_f64);
        let values = cast_checked(&values, data_type)?;

        reconcile_channels(self, opts.channel_names.as_deref(), data.rows())?;

        if self.is_csv() {
            let format = match opts.csv_format {
                Some(f) => f,
                None => CsvFormat::from_entry(self)?,
            };
            let rows: Vec<Vec<Value>> = values
                .transpose()
                .iter_rows()
                .map(|row| {
                    row.iter()
                        .map(|&v| {
                            if data_type.is_integer() {
                                Value::Int(v as i64)
                            } else {
                                Value::Float(v)
                            }
                        })
                        .collect()
                })
                .collect();
            self.write_file(format.write_rows(&rows, None).as_bytes())?;
            self.add_entry(format.to_entry()?)?;
        } else {
            let bytes = encode_interleaved(&values, data_type)?;
            self.write_file(&bytes)?;
            let bin_format = Entry::misc("binFileFormat");
            bin_format.set_attr("endianess", ByteOrder::native())?;
            self.add_entry(bin_format)?;
        }
        debug!(
            id = %self.key(),
            channels = data.rows(),
            samples = data.cols(),
            data_type = %data_type,
            "signal data written"
        );

        self.set_attr("dataType", data_type)?;
        if let Some(rate) = opts.sample_rate {
            self.set_attr("sampleRate", rate)?;
        }
        match opts.lsb_value {
            Some(lsb) => {
                self.set_attr("lsbValue", lsb)?;
            }
            None if !self.has_attr("lsbValue") => {
                self.set_attr("lsbValue", 1)?;
            }
            None => {}
        }
        if let Some(baseline) = opts.baseline {
            self.set_attr("baseline", baseline)?;
        }
        if let Some(unit) = &opts.unit {
            self.set_attr("unit", unit)?;
        }
        if let Some(comment) = &opts.comment {
            self.set_attr("comment", comment)?;
        }
        if let Some(class) = &opts.content_class {
            self.set_attr("contentClass", class)?;
        }
        if let Some(bits) = opts.adc_resolution {
            self.set_attr("adcResolution", bits)?;
        }
        for (key, value) in &opts.extra {
            self.set_attr(key, value)?;
        }
        Ok(())
    }

    /// Read the data as a channel-major `f64` matrix.
    ///
    /// With `scaled`, values are converted to physical units:
    /// `(raw - baseline) * lsbValue`, or `raw * lsbValue` without baseline.
    pub fn get_data(&self, scaled: bool) -> Result<Matrix<f64>> {
        let data = self.read_values()?;
        if !scaled {
            return Ok(data);
        }
        let lsb = self.attr_as::<f64>("lsbValue").unwrap_or(1.0);
        Ok(match self.attr_as::<f64>("baseline") {
            Some(baseline) => data.map(|v| (v - baseline) * lsb),
            None => data.map(|v| v * lsb),
        })
    }

    /// Read the unscaled data in its stored element type.
    ///
    /// `T` must match the declared `dataType`, otherwise this fails with
    /// [`Error::TypeMismatch`].
    pub fn get_raw<T: Sample>(&self) -> Result<Matrix<T>> {
        let data_type = self.data_type()?;
        if data_type.native() != T::NATIVE {
            return Err(Error::TypeMismatch {
                expected: data_type.native().to_string(),
                actual: T::NATIVE.to_string(),
            });
        }
        if self.is_csv() {
            return Ok(self.read_values()?.map(T::from_f64));
        }

        let order = self.byte_order()?;
        let file = self.read_file()?;
        let size = data_type.num_bytes();
        let n_channels = self.num_channels();
        check_length(file.len(), size * n_channels)?;

        let samples: Vec<T> = if order == ByteOrder::native() {
            bytemuck::pod_collect_to_vec(&file[..])
        } else {
            let mut swapped = file.to_vec();
            for chunk in swapped.chunks_exact_mut(size) {
                chunk.reverse();
            }
            bytemuck::pod_collect_to_vec(&swapped[..])
        };
        let n_samples = samples.len() / n_channels;
        Ok(Matrix::new(n_samples, n_channels, samples)?.transpose())
    }

    fn read_values(&self) -> Result<Matrix<f64>> {
        if self.is_csv() {
            let format = CsvFormat::from_entry(self)?;
            let text = String::from_utf8(self.read_file()?.to_vec())?;
            let rows: Vec<Vec<f64>> = format
                .parse_values(&text)
                .into_iter()
                .map(|row| {
                    row.iter()
                        .map(|v| {
                            v.as_f64().ok_or_else(|| {
                                Error::bad_data(format!("non-numeric signal value {v}"))
                            })
                        })
                        .collect::<Result<Vec<f64>>>()
                })
                .collect::<Result<_>>()?;
            return Ok(Matrix::from_rows(&rows)?.transpose());
        }

        let data_type = self.data_type()?;
        let order = self.byte_order()?;
        let n_channels = self.num_channels();
        let file = self.read_file()?;
        check_length(file.len(), data_type.num_bytes() * n_channels)?;

        let flat = match order {
            ByteOrder::Little => decode_values::<LittleEndian>(&file, data_type),
            ByteOrder::Big => decode_values::<BigEndian>(&file, data_type),
        };
        let n_samples = flat.len() / n_channels;
        Ok(Matrix::new(n_samples, n_channels, flat)?.transpose())
    }
}

/// Ensure `name` children match `n` rows of data.
///
/// Explicit names replace existing channels and must match `n`. Without
/// names, `ch_0..ch_{n-1}` are generated when no channels exist; existing
/// channels are kept when their count matches.
pub(crate) fn reconcile_channels(entry: &Entry, names: Option<&[String]>, n: usize) -> Result<()> {
    let existing = entry.channels().len();
    match names {
        Some(names) => {
            if names.len() != n {
                return Err(Error::ChannelMismatch {
                    expected: n,
                    actual: names.len(),
                });
            }
            if existing > 0 {
                entry.remove_entry("channel")?;
            }
            add_channels(entry, names.iter().map(String::as_str))
        }
        None if existing == 0 => {
            let generated: Vec<String> = (0..n).map(|i| format!("ch_{i}")).collect();
            add_channels(entry, generated.iter().map(String::as_str))
        }
        None if existing == n => Ok(()),
        None => Err(Error::ChannelMismatch {
            expected: n,
            actual: existing,
        }),
    }
}

fn add_channels<'a>(entry: &Entry, names: impl Iterator<Item = &'a str>) -> Result<()> {
    for name in names {
        let channel = Entry::misc("channel");
        channel.set_attr("name", name)?;
        entry.add_entry(channel)?;
    }
    Ok(())
}

fn check_length(len: usize, frame: usize) -> Result<()> {
    if len % frame != 0 {
        return Err(Error::bad_data(format!(
            "file size {len} is not a multiple of the {frame}-byte sample frame"
        )));
    }
    Ok(())
}

/// Round for integer targets and reject values outside the target range.
fn cast_checked(values: &Matrix<f64>, data_type: DataType) -> Result<Matrix<f64>> {
    if !data_type.is_integer() {
        return Ok(values.clone());
    }
    let (min, max) = data_type.range();
    for &v in values.as_slice() {
        let r = v.round();
        if !(min..=max).contains(&r) {
            return Err(Error::PrecisionLoss {
                value: v,
                data_type: data_type.to_string(),
            });
        }
    }
    Ok(values.map(f64::round))
}

/// Encode a channel-major matrix as interleaved samples in host byte order.
fn encode_interleaved(values: &Matrix<f64>, data_type: DataType) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * data_type.num_bytes());
    for frame in values.transpose().iter_rows() {
        for &v in frame {
            match data_type {
                DataType::Double => out.write_f64::<NativeEndian>(v)?,
                DataType::Float => out.write_f32::<NativeEndian>(v as f32)?,
                DataType::Int8 => out.write_i8(v as i8)?,
                DataType::Uint8 => out.write_u8(v as u8)?,
                DataType::Int16 => out.write_i16::<NativeEndian>(v as i16)?,
                DataType::Uint16 => out.write_u16::<NativeEndian>(v as u16)?,
                DataType::Int32 => out.write_i32::<NativeEndian>(v as i32)?,
                DataType::Uint32 => out.write_u32::<NativeEndian>(v as u32)?,
            }
        }
    }
    Ok(out)
}

fn decode_values<B: byteorder::ByteOrder>(bytes: &[u8], data_type: DataType) -> Vec<f64> {
    let size = data_type.num_bytes();
    bytes
        .chunks_exact(size)
        .map(|b| match data_type {
            DataType::Double => B::read_f64(b),
            DataType::Float => B::read_f32(b) as f64,
            DataType::Int8 => b[0] as i8 as f64,
            DataType::Uint8 => b[0] as f64,
            DataType::Int16 => B::read_i16(b) as f64,
            DataType::Uint16 => B::read_u16(b) as f64,
            DataType::Int32 => B::read_i32(b) as f64,
            DataType::Uint32 => B::read_u32(b) as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn signal_in(dir: &Path, id: &str) -> SignalEntry {
        let s = SignalEntry::new(id).unwrap();
        s.set_folder(dir);
        s
    }

    fn ramp(rows: usize, cols: usize) -> Matrix<i16> {
        let data = (0..rows * cols).map(|i| i as i16 - 50).collect();
        Matrix::new(rows, cols, data).unwrap()
    }

    #[test]
    fn test_binary_layout_is_interleaved() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "sig.bin");
        let data = Matrix::from_rows(&[[1i16, 2, 3], [10, 20, 30]])?;
        s.set_data(&data, SignalOptions::new(100.0))?;

        let bytes = std::fs::read(s.path().unwrap())?;
        let stored: Vec<i16> = bytemuck::pod_collect_to_vec(&bytes[..]);
        assert_eq!(stored, [1, 10, 2, 20, 3, 30]);
        assert_eq!(s.get_raw::<i16>()?, data);
        Ok(())
    }

    #[test]
    fn test_metadata_written() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "ecg.bin");
        let opts = SignalOptions::new(256.0)
            .unit("mV")
            .content_class("ECG")
            .adc_resolution(16)
            .attr("sensorLocation", "chest");
        s.set_data(&ramp(2, 10), opts)?;

        assert_eq!(s.data_type()?, DataType::Int16);
        assert_eq!(s.sample_rate(), Some(256.0));
        assert_eq!(s.attr("lsbValue").as_deref(), Some("1"));
        assert_eq!(s.attr("unit").as_deref(), Some("mV"));
        assert_eq!(s.attr("contentClass").as_deref(), Some("ECG"));
        assert_eq!(s.attr_as::<u32>("adcResolution"), Some(16));
        assert_eq!(s.attr("sensorLocation").as_deref(), Some("chest"));
        assert_eq!(s.channel_names(), ["ch_0", "ch_1"]);
        assert_eq!(s.byte_order()?, ByteOrder::native());
        Ok(())
    }

    #[test]
    fn test_channel_reconciliation() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "acc.bin");
        let err = s
            .set_data(&ramp(3, 4), SignalOptions::new(1.0).channel_names(["x", "y"]))
            .unwrap_err();
        assert!(matches!(err, Error::ChannelMismatch { expected: 3, actual: 2 }));

        s.set_data(&ramp(3, 4), SignalOptions::new(1.0).channel_names(["x", "y", "z"]))?;
        assert_eq!(s.channel_names(), ["x", "y", "z"]);

        // Existing channels are kept when the count matches.
        s.set_data(&ramp(3, 8), SignalOptions::new(1.0))?;
        assert_eq!(s.channel_names(), ["x", "y", "z"]);

        let err = s.set_data(&ramp(2, 8), SignalOptions::new(1.0)).unwrap_err();
        assert!(matches!(err, Error::ChannelMismatch { expected: 2, actual: 3 }));

        s.set_data(&ramp(2, 8), SignalOptions::new(1.0).channel_names(["l", "r"]))?;
        assert_eq!(s.channel_names(), ["l", "r"]);
        assert_eq!(s.get_data(false)?.rows(), 2);
        Ok(())
    }

    #[test]
    fn test_precision_loss() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "p.bin");
        let data = Matrix::from_row(vec![1.4, 300.0]);
        let err = s
            .set_data(&data, SignalOptions::new(1.0).data_type(DataType::Int8))
            .unwrap_err();
        assert!(matches!(err, Error::PrecisionLoss { .. }));

        s.set_data(&data, SignalOptions::new(1.0).data_type(DataType::Int16))?;
        assert_eq!(s.get_data(false)?.as_slice(), &[1.0, 300.0]);
        Ok(())
    }

    #[test]
    fn test_unsupported_native_type() {
        let dir = tempfile::tempdir().unwrap();
        let s = signal_in(dir.path(), "big.bin");
        let data = Matrix::from_row(vec![1i64, 2, 3]);
        assert!(matches!(
            s.set_data(&data, SignalOptions::new(1.0)),
            Err(Error::UnsupportedDataType(_))
        ));
    }

    #[test]
    fn test_big_endian_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "be.bin");
        s.set_attr("dataType", "int16")?;
        let fmt = Entry::misc("binFileFormat");
        fmt.set_attr("endianess", "BIG")?;
        s.add_entry(fmt)?;
        s.write_file(&[0x01, 0x00, 0xff, 0xfe])?;

        assert_eq!(s.get_data(false)?.as_slice(), &[256.0, -2.0]);
        assert_eq!(s.get_raw::<i16>()?.as_slice(), &[256, -2]);
        assert!(matches!(s.get_raw::<u16>(), Err(Error::TypeMismatch { .. })));
        Ok(())
    }

    #[test]
    fn test_scaling() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "scaled.bin");
        let lsb = 2.543e-6;
        s.set_data(&ramp(2, 20), SignalOptions::new(10.0).lsb_value(lsb))?;

        let raw = s.get_data(false)?;
        assert_eq!(s.get_data(true)?, raw.map(|v| v * lsb));

        s.set_attr("baseline", 3)?;
        assert_eq!(s.get_data(true)?, raw.map(|v| (v - 3.0) * lsb));
        Ok(())
    }

    #[test]
    fn test_csv_signal() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let s = signal_in(dir.path(), "sig.csv");
        let data = Matrix::from_rows(&[[0.5, 1.5], [2.25, -3.0]])?;
        let opts = SignalOptions::new(4.0).csv_format(CsvFormat::new(";", ",")?);
        s.set_data(&data, opts)?;

        let text = std::fs::read_to_string(s.path().unwrap())?;
        assert_eq!(text, "0,5;2,25\n1,5;-3,0\n");
        assert_eq!(
            s.child_named("csvFileFormat").unwrap().attr("decimalSeparator").as_deref(),
            Some(",")
        );
        assert!(s.child_named("binFileFormat").is_none());
        assert_eq!(s.get_data(false)?, data);
        Ok(())
    }
}
