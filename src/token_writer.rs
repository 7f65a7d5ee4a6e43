//! Field-by-field record writer for the interchange file.
//!
//! Records are delimited by a configurable single-byte separator and
//! terminated by `\n`. Fields containing the separator, a quote or a line
//! break are wrapped in double quotes with embedded quotes doubled, so
//! distinct field sequences always encode to distinct bytes.

use crate::error::{ExportError, Result};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;

/// Writes one logical record at a time, one field per call.
///
/// Every record must have the same number of fields as the first one;
/// a mismatch surfaces as a CSV error instead of a ragged file.
pub struct TokenWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl<W: Write> TokenWriter<W> {
    /// Creates a writer over `sink` using `separator` between fields.
    pub fn new(sink: W, separator: char) -> Result<Self> {
        let delimiter = separator_byte(separator)?;
        let inner = WriterBuilder::new()
            .delimiter(delimiter)
            .quote(b'"')
            .double_quote(true)
            .quote_style(QuoteStyle::Necessary)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(sink);
        Ok(TokenWriter { inner })
    }

    /// Appends a field to the current record. `None` writes an empty field.
    pub fn write_token(&mut self, value: Option<&str>) -> Result<()> {
        self.inner.write_field(value.unwrap_or_default())?;
        Ok(())
    }

    /// Appends the last field and terminates the record.
    pub fn write_end_token(&mut self, value: Option<&str>) -> Result<()> {
        self.write_token(value)?;
        self.new_line()
    }

    /// Terminates the current record.
    pub fn new_line(&mut self) -> Result<()> {
        self.inner.write_record(None::<&[u8]>)?;
        Ok(())
    }

    /// Pushes buffered bytes to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying sink.
    pub fn into_inner(self) -> Result<W> {
        self.inner
            .into_inner()
            .map_err(|e| ExportError::Io(e.into_error()))
    }
}

/// Validates a separator for use as the CSV delimiter.
pub fn separator_byte(separator: char) -> Result<u8> {
    match separator {
        '"' | '\n' | '\r' => Err(ExportError::InvalidSeparator(separator)),
        c if c.is_ascii() => Ok(c as u8),
        c => Err(ExportError::InvalidSeparator(c)),
    }
}
