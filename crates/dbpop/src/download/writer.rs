//! CSV serialization of scanned rows.

use std::borrow::Cow;
use std::io::Write;

use tracing::warn;

use crate::core::{Column, RowSink, SqlValue, Table};
use crate::dataset::DataFileHeader;
use crate::error::Result;

/// Values larger than this are left out of downloads: characters for text,
/// bytes for binary.
pub const OVERSIZE_THRESHOLD: usize = 32 * 1024;

/// Writes scanned rows of one table as CSV records.
pub struct CsvRowSink<'a, W: Write> {
    writer: csv::Writer<W>,
    table: &'a Table,
    skipped: u64,
}

impl<'a, W: Write + Send> CsvRowSink<'a, W> {
    /// Start a data file, writing the header row immediately.
    ///
    /// `binary[i]` tells whether column `i` is exchanged as base64.
    pub fn new(output: W, table: &'a Table, binary: &[bool]) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(output);
        writer.write_record(
            table
                .columns
                .iter()
                .zip(binary.iter().copied().chain(std::iter::repeat(false)))
                .map(|(column, binary)| DataFileHeader::format(&column.name, binary)),
        )?;
        Ok(Self {
            writer,
            table,
            skipped: 0,
        })
    }

    /// Number of values dropped by the oversize policy.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Flush buffered records to the output.
    pub fn finish(mut self) -> Result<u64> {
        self.writer.flush()?;
        Ok(self.skipped)
    }

    fn format_cell<'v>(&mut self, value: &'v SqlValue<'_>, column: &Column) -> Option<Cow<'v, str>> {
        let size = match value {
            SqlValue::Text(s) if declared_oversize(column) => s.chars().count(),
            SqlValue::Bytes(b) => b.len(),
            _ => 0,
        };
        if size > OVERSIZE_THRESHOLD {
            warn!(
                "Data too large: {}.{} - {} KiB, value skipped",
                self.table.name,
                column.name,
                size / 1024
            );
            self.skipped += 1;
            return None;
        }
        value.to_invariant_string()
    }
}

/// Declared size above the threshold, `-1` meaning unbounded.
fn declared_oversize(column: &Column) -> bool {
    column.max_length < 0 || column.max_length as usize > OVERSIZE_THRESHOLD
}

impl<W: Write + Send> RowSink for CsvRowSink<'_, W> {
    fn accept_row(&mut self, row: &[SqlValue<'_>]) -> Result<()> {
        let table = self.table;
        let fields: Vec<Cow<'_, str>> = row
            .iter()
            .zip(&table.columns)
            .map(|(value, column)| self.format_cell(value, column).unwrap_or_default())
            .collect();
        self.writer
            .write_record(fields.iter().map(|f| f.as_bytes()))?;
        Ok(())
    }
}
