//! Streaming reader for delimited categorical tables.
//!
//! The first non-blank record is the header. Every following record is one
//! observation with exactly as many fields as the header. Fields follow the
//! usual CSV quoting rules; values are opaque labels and nothing is parsed as
//! a number.

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use bn_common::{Error, Result};
use csv::{ErrorKind, ReaderBuilder, StringRecord};

/// Where tabular data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A file on disk.
    Path(PathBuf),
    /// Table text held in memory.
    Inline(String),
}

impl DataSource {
    /// Human-readable origin for errors and logs.
    pub fn origin(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Inline(_) => "<inline>".to_string(),
        }
    }

    fn open(&self) -> Result<Box<dyn Read>> {
        match self {
            DataSource::Path(path) => {
                let file = File::open(path).map_err(|e| Error::SourceUnavailable {
                    origin: self.origin(),
                    reason: e.to_string(),
                })?;
                Ok(Box::new(file))
            }
            DataSource::Inline(text) => Ok(Box::new(Cursor::new(text.clone().into_bytes()))),
        }
    }
}

impl From<PathBuf> for DataSource {
    fn from(path: PathBuf) -> Self {
        DataSource::Path(path)
    }
}

/// Single-byte field delimiter accepted by the CSV reader and writer.
pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8> {
    if !delimiter.is_ascii() || matches!(delimiter, '"' | '\n' | '\r') {
        return Err(Error::Config(format!(
            "delimiter {:?} must be a single ASCII character other than a quote or line break",
            delimiter
        )));
    }
    Ok(delimiter as u8)
}

/// Map a CSV error onto the engine's data errors.
pub(crate) fn csv_error(origin: &str, err: csv::Error) -> Error {
    let reason = err.to_string();
    match err.into_kind() {
        ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => Error::MalformedSource {
            line: pos.map_or(0, |p| p.line() as usize),
            expected: expected_len as usize,
            found: len as usize,
        },
        ErrorKind::Io(e) => Error::Io(e),
        _ => Error::SourceUnavailable {
            origin: origin.to_string(),
            reason,
        },
    }
}

/// Record reader over a [`DataSource`].
pub struct RecordReader {
    inner: csv::Reader<Box<dyn Read>>,
    record: StringRecord,
    origin: String,
    line: usize,
}

impl std::fmt::Debug for RecordReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordReader")
            .field("origin", &self.origin)
            .field("line", &self.line)
            .finish()
    }
}

impl RecordReader {
    /// Open the source and consume its header row.
    ///
    /// Returns the reader positioned at the first data row together with the
    /// column names.
    pub fn open(source: &DataSource, delimiter: char) -> Result<(Self, Vec<String>)> {
        let origin = source.origin();
        let mut inner = ReaderBuilder::new()
            .delimiter(delimiter_byte(delimiter)?)
            .has_headers(true)
            .flexible(false)
            .from_reader(source.open()?);

        let header: Vec<String> = inner
            .headers()
            .map_err(|e| csv_error(&origin, e))?
            .iter()
            .map(str::to_string)
            .collect();
        if header.is_empty() {
            return Err(Error::SourceUnavailable {
                origin,
                reason: "missing header row".to_string(),
            });
        }

        for (idx, name) in header.iter().enumerate() {
            if name.is_empty() {
                return Err(Error::SourceUnavailable {
                    origin,
                    reason: format!("header column {} is empty", idx + 1),
                });
            }
            if header[..idx].contains(name) {
                return Err(Error::SourceUnavailable {
                    origin,
                    reason: format!("duplicate column '{}'", name),
                });
            }
        }

        let reader = RecordReader {
            inner,
            record: StringRecord::new(),
            origin,
            line: 1,
        };
        Ok((reader, header))
    }

    /// Next data row, or `None` at end of input.
    pub fn next_record(&mut self) -> Result<Option<Vec<String>>> {
        let more = self
            .inner
            .read_record(&mut self.record)
            .map_err(|e| csv_error(&self.origin, e))?;
        if !more {
            return Ok(None);
        }
        if let Some(pos) = self.record.position() {
            self.line = pos.line() as usize;
        }
        Ok(Some(self.record.iter().map(str::to_string).collect()))
    }

    /// 1-based line on which the last record read starts.
    pub fn line(&self) -> usize {
        self.line
    }
}
