//! Test doubles: an in-memory recording [`Database`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::{
    Column, ColumnType, Database, PreparationStrategy, RowSink, SqlValue, Table, TableName,
};
use crate::drivers::mssql::ReferentialIntegrityStrategy;
use crate::error::{DbPopError, Result};

pub fn make_test_column(name: &str, column_type: ColumnType) -> Column {
    Column {
        name: name.to_string(),
        column_type,
        data_type: format!("{:?}", column_type).to_lowercase(),
        max_length: 0,
        is_nullable: true,
        is_auto_increment: false,
        is_generated: false,
    }
}

pub fn make_test_table_with(catalog: &str, schema: &str, table: &str, columns: Vec<Column>) -> Table {
    Table {
        name: TableName::new(catalog, schema, table),
        columns,
        indexes: vec![],
        foreign_keys: vec![],
    }
}

/// Table whose columns are all text.
pub fn make_test_table(catalog: &str, schema: &str, table: &str, columns: &[&str]) -> Table {
    make_test_table_with(
        catalog,
        schema,
        table,
        columns
            .iter()
            .map(|c| make_test_column(c, ColumnType::Text))
            .collect(),
    )
}

#[derive(Default)]
struct MockState {
    log: Vec<String>,
    batch_sizes: Vec<usize>,
    rows: HashMap<TableName, Vec<Vec<SqlValue<'static>>>>,
    fail_inserts_into: Option<TableName>,
}

/// Shared view of a [`MockDatabase`]'s state, usable after the database was moved.
#[derive(Clone)]
pub struct MockHandle(Arc<Mutex<MockState>>);

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.0.lock().unwrap()
    }

    /// Executed statements and bulk writes, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    /// Row count of each bulk write, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    pub fn rows(&self, table: &TableName) -> Vec<Vec<SqlValue<'static>>> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    pub fn set_rows(&self, table: &TableName, rows: Vec<Vec<SqlValue<'static>>>) {
        self.lock().rows.insert(table.clone(), rows);
    }

    /// Make every bulk write into `table` fail.
    pub fn fail_inserts_into(&self, table: &TableName) {
        self.lock().fail_inserts_into = Some(table.clone());
    }
}

/// In-memory database that records what the engine asks of it.
pub struct MockDatabase {
    tables: Vec<Table>,
    quote: char,
    foreign_key_strategy: bool,
    state: MockHandle,
}

impl MockDatabase {
    pub fn new(tables: Vec<Table>) -> Self {
        Self {
            tables,
            quote: '"',
            foreign_key_strategy: false,
            state: MockHandle(Arc::new(Mutex::new(MockState::default()))),
        }
    }

    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Use the constraint-toggling preparation strategy instead of the default.
    pub fn with_foreign_key_strategy(mut self) -> Self {
        self.foreign_key_strategy = true;
        self
    }

    pub fn handle(&self) -> MockHandle {
        self.state.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.statements()
    }
}

#[async_trait]
impl Database for MockDatabase {
    fn product_name(&self) -> &str {
        "Mock"
    }

    fn quote_char(&self) -> char {
        self.quote
    }

    async fn list_catalogs(&mut self) -> Result<Vec<String>> {
        let catalogs: BTreeSet<String> =
            self.tables.iter().filter_map(|t| t.name.catalog.clone()).collect();
        Ok(catalogs.into_iter().collect())
    }

    async fn list_tables(&mut self, catalog: &str) -> Result<Vec<TableName>> {
        self.state.lock().log.push(format!("USE {}", catalog));
        Ok(self
            .tables
            .iter()
            .filter(|t| t.name.catalog.as_deref() == Some(catalog))
            .map(|t| t.name.clone())
            .collect())
    }

    async fn list_schema_tables(&mut self, catalog: &str, schema: &str) -> Result<Vec<TableName>> {
        let tables = self.list_tables(catalog).await?;
        Ok(tables
            .into_iter()
            .filter(|t| t.schema.as_deref() == Some(schema))
            .collect())
    }

    async fn load_tables(&mut self, names: &BTreeSet<TableName>) -> Result<Vec<Table>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| names.contains(&t.name))
            .cloned()
            .collect())
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.state.lock().log.push(sql.to_string());
        Ok(0)
    }

    async fn truncate_table(&mut self, name: &TableName) -> Result<()> {
        let sql = format!("DELETE FROM {}", self.quote_table(name));
        let mut state = self.state.lock();
        state.log.push(sql);
        state.rows.remove(name);
        Ok(())
    }

    fn create_preparation_strategy(&self, all_tables: &[Table]) -> Box<dyn PreparationStrategy> {
        if self.foreign_key_strategy {
            Box::new(ReferentialIntegrityStrategy::new(all_tables))
        } else {
            Box::new(crate::core::DefaultPreparationStrategy::new(all_tables))
        }
    }

    async fn bulk_insert(
        &mut self,
        table: &TableName,
        columns: &[Column],
        rows: Vec<Vec<SqlValue<'static>>>,
    ) -> Result<u64> {
        // SQL Server refuses explicit values for computed and rowversion columns
        if let Some(column) = columns.iter().find(|c| c.is_generated) {
            return Err(DbPopError::Io(std::io::Error::other(format!(
                "cannot insert into generated column {}.{}",
                table, column.name
            ))));
        }
        let mut state = self.state.lock();
        if state.fail_inserts_into.as_ref() == Some(table) {
            return Err(DbPopError::Io(std::io::Error::other(format!(
                "injected failure writing {}",
                table
            ))));
        }
        let count = rows.len();
        state.log.push(format!("INSERT {} rows INTO {}", count, table));
        state.batch_sizes.push(count);
        state.rows.entry(table.clone()).or_default().extend(rows);
        Ok(count as u64)
    }

    async fn scan_table(&mut self, table: &Table, sink: &mut dyn RowSink) -> Result<u64> {
        let rows = self.state.rows(&table.name);
        // Stored rows follow the full definition; project onto the requested columns.
        let positions: Vec<usize> = match self.tables.iter().find(|t| t.name == table.name) {
            Some(full) => table
                .columns
                .iter()
                .filter_map(|c| full.columns.iter().position(|f| f.name == c.name))
                .collect(),
            None => (0..table.columns.len()).collect(),
        };
        for row in &rows {
            let projected: Vec<SqlValue<'static>> =
                positions.iter().map(|&i| row[i].clone()).collect();
            sink.accept_row(&projected)?;
        }
        Ok(rows.len() as u64)
    }
}
