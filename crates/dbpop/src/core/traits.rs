//! Core traits for dialect-independent population and download.
//!
//! - [`Database`]: one connection to one database product, with the quoting,
//!   introspection and bulk operations the engine needs
//! - [`PreparationStrategy`]: before/after hooks bracketing a bulk load
//! - [`RowSink`]: receives rows from a table scan
//! - [`DatabaseConnection`]: an open connection that can describe its product,
//!   used by [`DialectCatalog`](super::catalog::DialectCatalog) to pick a dialect

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::dataset::DataFileHeader;
use crate::error::Result;
use crate::populate::Inserter;

use super::identifier;
use super::preparation::DefaultPreparationStrategy;
use super::schema::{Column, Table, TableName};
use super::types::ColumnType;
use super::value::SqlValue;

/// Product metadata reported by an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductMetadata {
    /// Product name used for dialect lookup (e.g., "Microsoft SQL Server").
    pub product_name: String,

    /// Regular expression describing quoted identifiers, when the product reports one.
    pub quoted_identifier_pattern: Option<String>,
}

/// An open connection that has not been bound to a dialect yet.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Query the product name and identifier quoting rules.
    async fn product_metadata(&mut self) -> Result<ProductMetadata>;
}

/// Receives the rows of a table scan, one call per row, in column order.
pub trait RowSink: Send {
    fn accept_row(&mut self, row: &[SqlValue<'_>]) -> Result<()>;
}

/// A connected database dialect.
///
/// Every method runs on the one connection the dialect owns; calls are made
/// strictly one after another. Statements issued between
/// [`begin_transaction`](Database::begin_transaction) and
/// [`commit_transaction`](Database::commit_transaction) share that transaction.
#[async_trait]
pub trait Database: Send {
    /// Product name this dialect was registered under.
    fn product_name(&self) -> &str;

    /// Quote character derived when the dialect was constructed.
    fn quote_char(&self) -> char;

    /// Quote a single identifier.
    fn quote_ident(&self, name: &str) -> String {
        identifier::quote_ident(self.quote_char(), name)
    }

    /// Quote each present part of a table name.
    fn quote_table(&self, name: &TableName) -> String {
        identifier::quote_table(self.quote_char(), name)
    }

    /// Whether values of this type are exchanged as base64.
    fn is_binary_type(&self, column_type: &ColumnType) -> bool {
        column_type.is_binary()
    }

    /// Names of all catalogs on the server.
    async fn list_catalogs(&mut self) -> Result<Vec<String>>;

    /// Base tables of a catalog. Switches the session to that catalog first.
    async fn list_tables(&mut self, catalog: &str) -> Result<Vec<TableName>>;

    /// Base tables of one schema in a catalog. Switches the session to that catalog first.
    async fn list_schema_tables(&mut self, catalog: &str, schema: &str)
        -> Result<Vec<TableName>>;

    /// Resolve full definitions for `names`. Names that do not exist are absent from the result.
    async fn load_tables(&mut self, names: &BTreeSet<TableName>) -> Result<Vec<Table>>;

    /// Execute a statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Remove every row from a table.
    async fn truncate_table(&mut self, name: &TableName) -> Result<()> {
        let sql = format!("DELETE FROM {}", self.quote_table(name));
        self.execute(&sql).await?;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.execute("BEGIN TRANSACTION").await?;
        Ok(())
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.execute("COMMIT TRANSACTION").await?;
        Ok(())
    }

    /// Strategy bracketing a load over `all_tables`. The default only truncates.
    fn create_preparation_strategy(&self, all_tables: &[Table]) -> Box<dyn PreparationStrategy> {
        Box::new(DefaultPreparationStrategy::new(all_tables))
    }

    /// Inserter for one data file targeting `table`.
    fn create_inserter(&self, table: &Table, headers: Vec<DataFileHeader>) -> Result<Inserter> {
        Inserter::new(table, headers)
    }

    /// Write one batch of rows. `columns` gives the column for each row position.
    async fn bulk_insert(
        &mut self,
        table: &TableName,
        columns: &[Column],
        rows: Vec<Vec<SqlValue<'static>>>,
    ) -> Result<u64>;

    /// Stream every row of `table` into `sink`, returning the row count.
    async fn scan_table(&mut self, table: &Table, sink: &mut dyn RowSink) -> Result<u64>;
}

/// Hooks run before the first insert and after the last one.
///
/// `after_inserts` is invoked even when inserting failed part way.
#[async_trait]
pub trait PreparationStrategy: Send + Sync {
    async fn before_inserts(&self, database: &mut dyn Database) -> Result<()>;

    async fn after_inserts(&self, database: &mut dyn Database) -> Result<()>;
}
