//! Batched, type-converting row inserter for one data file.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use csv::StringRecord;
use tracing::{debug, warn};

use crate::core::{Column, Database, SqlValue, Table, TableName};
use crate::dataset::DataFileHeader;
use crate::error::{DbPopError, Result};

/// Rows buffered before an intermediate bulk write.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Converts CSV records into typed rows and writes them in batches.
///
/// A flush happens once the buffer holds more than `batch_size` rows, and
/// [`close`](Inserter::close) writes whatever is left. Callers must close the
/// inserter on every path, including after a failed [`insert`](Inserter::insert).
///
/// Generated columns named in the header (computed, row version) are left out
/// of the insert; the server fills them.
#[derive(Debug)]
pub struct Inserter {
    table_name: TableName,
    columns: Vec<Column>,
    /// Record position of each bound column.
    positions: Vec<usize>,
    binary: Vec<bool>,
    buffer: Vec<Vec<SqlValue<'static>>>,
    batch_size: usize,
    rows_written: u64,
}

impl Inserter {
    /// Bind header positions to the table's columns by exact name.
    pub fn new(table: &Table, headers: Vec<DataFileHeader>) -> Result<Self> {
        let mut columns = Vec::with_capacity(headers.len());
        let mut positions = Vec::with_capacity(headers.len());
        let mut binary = Vec::with_capacity(headers.len());
        for (position, header) in headers.into_iter().enumerate() {
            let column = table.column(&header.column_name).ok_or_else(|| {
                DbPopError::column_not_found(table.name.qualified_name(), &header.column_name)
            })?;
            if column.is_generated {
                warn!(
                    "Ignoring generated column {}.{} in data file",
                    table.name, column.name
                );
                continue;
            }
            columns.push(column.clone());
            positions.push(position);
            binary.push(header.binary);
        }

        Ok(Self {
            table_name: table.name.clone(),
            columns,
            positions,
            binary,
            buffer: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            rows_written: 0,
        })
    }

    /// Override the batch threshold.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Columns written, in CSV position order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Convert one record. Missing and empty fields become NULL.
    ///
    /// Cells under a `*b64` header are base64 decoded and the bytes are read
    /// back as UTF-8 text before the column converter sees them, so a binary
    /// column receives the decoded text's bytes. Invalid UTF-8 is replaced.
    pub fn convert_record(&self, record: &StringRecord) -> Result<Vec<SqlValue<'static>>> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| match record.get(self.positions[i]) {
                None | Some("") => Ok(column.column_type.null()),
                Some(cell) if self.binary[i] => {
                    let bytes = BASE64.decode(cell).map_err(|e| {
                        self.invalid(column, format!("invalid base64: {}", e))
                    })?;
                    let text = String::from_utf8_lossy(&bytes);
                    column
                        .column_type
                        .convert(&text)
                        .map_err(|message| self.invalid(column, message))
                }
                Some(cell) => column
                    .column_type
                    .convert(cell)
                    .map_err(|message| self.invalid(column, message)),
            })
            .collect()
    }

    /// Buffer one record, flushing when the buffer exceeds the batch threshold.
    pub async fn insert(&mut self, database: &mut dyn Database, record: &StringRecord) -> Result<()> {
        let row = self.convert_record(record)?;
        self.buffer.push(row);
        if self.buffer.len() > self.batch_size {
            self.flush(database).await?;
        }
        Ok(())
    }

    /// Write the buffered rows, if any.
    pub async fn flush(&mut self, database: &mut dyn Database) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.buffer);
        let count = rows.len();
        debug!("Flushing {} rows into {}", count, self.table_name);
        self.rows_written += database
            .bulk_insert(&self.table_name, &self.columns, rows)
            .await?;
        Ok(())
    }

    /// Final flush. Returns the number of rows written over the inserter's lifetime.
    ///
    /// An empty buffer issues no bulk write, so a data file holding only a
    /// header never reaches the database.
    pub async fn close(mut self, database: &mut dyn Database) -> Result<u64> {
        self.flush(database).await?;
        Ok(self.rows_written)
    }

    fn invalid(&self, column: &Column, message: String) -> DbPopError {
        DbPopError::invalid_value(self.table_name.qualified_name(), &column.name, message)
    }
}
