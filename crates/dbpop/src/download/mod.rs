//! Table extraction into dataset files.
//!
//! A [`Downloader`] writes each requested table to
//! `<directory>/<dataset>/<catalog>/<schema>/<table>.csv`, in the same layout
//! and header format the populator reads, so a downloaded dataset can be
//! loaded back as is. Values over [`OVERSIZE_THRESHOLD`] are skipped with a
//! warning instead of failing the download. Generated columns (computed, row
//! version) are left out, since the server would refuse them on the way back.

mod selector;
mod writer;

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::{Database, TableName};
use crate::dataset::{FileTree, LocalFileSystem, DATA_FILE_SUFFIX};
use crate::error::{DbPopError, Result};

pub use selector::TableSelector;
pub use writer::{CsvRowSink, OVERSIZE_THRESHOLD};

/// One downloaded table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadedTable {
    pub table: String,
    pub rows: u64,
    /// Values left out by the oversize policy.
    pub skipped_values: u64,
    pub file: String,
}

/// Summary of a download run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResult {
    pub dataset: String,
    pub tables: Vec<DownloadedTable>,
    pub rows: u64,
    pub duration_seconds: f64,
}

impl DownloadResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Extracts tables into one dataset directory.
pub struct Downloader {
    database: Box<dyn Database>,
    dataset: String,
    target: Box<dyn FileTree>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("database", &self.database.product_name())
            .field("dataset", &self.dataset)
            .field("target", &self.target)
            .finish()
    }
}

impl Downloader {
    /// Download into `<directory>/<dataset>`.
    pub fn new(database: Box<dyn Database>, directory: impl AsRef<Path>, dataset: &str) -> Self {
        Self::with_file_tree(database, &LocalFileSystem::from_path(directory.as_ref()), dataset)
    }

    /// Download into `<root>/<dataset>` of any file tree.
    pub fn with_file_tree(database: Box<dyn Database>, root: &dyn FileTree, dataset: &str) -> Self {
        Self {
            database,
            dataset: dataset.to_string(),
            target: root.cd(dataset),
        }
    }

    pub fn database(&mut self) -> &mut dyn Database {
        self.database.as_mut()
    }

    pub fn into_database(self) -> Box<dyn Database> {
        self.database
    }

    /// Download one table, returning its row count.
    pub async fn download(&mut self, name: &TableName) -> Result<u64> {
        Ok(self.download_table(name).await?.rows)
    }

    /// Download every table a selector expands to, in listing order.
    pub async fn download_selector(
        &mut self,
        selector: &TableSelector,
    ) -> Result<Vec<DownloadedTable>> {
        let names = selector.expand(self.database.as_mut()).await?;
        debug!("{} expands to {} tables", selector, names.len());

        let mut downloaded = Vec::with_capacity(names.len());
        for name in &names {
            downloaded.push(self.download_table(name).await?);
        }
        Ok(downloaded)
    }

    /// Download every selector in order and report totals.
    pub async fn download_all(&mut self, selectors: &[TableSelector]) -> Result<DownloadResult> {
        let started = Instant::now();
        let mut tables = Vec::new();
        for selector in selectors {
            tables.extend(self.download_selector(selector).await?);
        }
        let rows = tables.iter().map(|t| t.rows).sum();
        info!(
            "Downloaded {} rows from {} tables into {}",
            rows,
            tables.len(),
            self.target.location()
        );
        Ok(DownloadResult {
            dataset: self.dataset.clone(),
            tables,
            rows,
            duration_seconds: started.elapsed().as_secs_f64(),
        })
    }

    async fn download_table(&mut self, name: &TableName) -> Result<DownloadedTable> {
        let table = self
            .database
            .load_tables(&BTreeSet::from([name.clone()]))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbPopError::TableNotFound(name.qualified_name()))?
            .without_generated_columns();

        let file = self.data_file(name);
        let binary: Vec<bool> = table
            .columns
            .iter()
            .map(|c| self.database.is_binary_type(&c.column_type))
            .collect();

        let mut sink = CsvRowSink::new(file.create()?, &table, &binary)?;
        let rows = self.database.scan_table(&table, &mut sink).await?;
        let skipped_values = sink.finish()?;

        info!("Downloaded {} rows from {} to {}", rows, name, file.location());
        Ok(DownloadedTable {
            table: name.qualified_name(),
            rows,
            skipped_values,
            file: file.location(),
        })
    }

    /// `<catalog>/<schema>/<table>.csv` below the dataset directory, skipping absent parts.
    fn data_file(&self, name: &TableName) -> Box<dyn FileTree> {
        let mut path: Vec<&str> = Vec::with_capacity(3);
        path.extend(name.catalog.as_deref());
        path.extend(name.schema.as_deref());
        let file_name = format!("{}{}", name.table, DATA_FILE_SUFFIX);
        path.push(&file_name);
        self.target.cd(&path.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ColumnType, SqlNullType, SqlValue, Table};
    use crate::populate::Populator;
    use crate::testing::{make_test_column, make_test_table_with, MockDatabase};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::fs;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn products() -> Table {
        let mut description = make_test_column("description", ColumnType::Text);
        description.max_length = -1;
        make_test_table_with(
            "shop",
            "dbo",
            "products",
            vec![
                make_test_column("id", ColumnType::Int),
                make_test_column("name", ColumnType::Text),
                make_test_column("price", ColumnType::Decimal),
                make_test_column("added", ColumnType::DateTime),
                make_test_column("active", ColumnType::Boolean),
                make_test_column("image", ColumnType::Binary),
                description,
            ],
        )
    }

    fn product_rows() -> Vec<Vec<SqlValue<'static>>> {
        let added = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(9, 30, 0, 250)
            .unwrap();
        vec![
            vec![
                SqlValue::I32(1),
                SqlValue::from("Widget, large"),
                SqlValue::Decimal(Decimal::from_str("12.50").unwrap()),
                SqlValue::DateTime(added),
                SqlValue::Bool(true),
                SqlValue::bytes_owned(b"png bytes".to_vec()),
                SqlValue::from("says \"hello\""),
            ],
            vec![
                SqlValue::I32(2),
                SqlValue::from("Gadget"),
                SqlValue::Null(SqlNullType::Decimal),
                SqlValue::Null(SqlNullType::DateTime),
                SqlValue::Bool(false),
                SqlValue::Null(SqlNullType::Bytes),
                SqlValue::Null(SqlNullType::String),
            ],
        ]
    }

    #[tokio::test]
    async fn test_download_writes_dataset_layout() {
        let dir = TempDir::new().unwrap();
        let db = MockDatabase::new(vec![products()]);
        db.handle().set_rows(&products().name, product_rows());

        let mut downloader = Downloader::new(Box::new(db), dir.path(), "snapshot");
        let rows = downloader.download(&products().name).await.unwrap();
        assert_eq!(rows, 2);

        let content =
            fs::read_to_string(dir.path().join("snapshot/shop/dbo/products.csv")).unwrap();
        assert_eq!(
            content,
            "id,name,price,added,active,image*b64,description\n\
             1,\"Widget, large\",12.50,2024-03-01 09:30:00.250,true,cG5nIGJ5dGVz,\"says \"\"hello\"\"\"\n\
             2,Gadget,,,false,,\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let dir = TempDir::new().unwrap();
        let mut downloader =
            Downloader::new(Box::new(MockDatabase::new(vec![products()])), dir.path(), "snapshot");
        let err = downloader
            .download(&TableName::new("shop", "dbo", "ghosts"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbPopError::TableNotFound(ref t) if t == "shop.dbo.ghosts"));
        assert!(!dir.path().join("snapshot/shop/dbo/ghosts.csv").exists());
    }

    #[tokio::test]
    async fn test_oversize_values_do_not_fail_download() {
        let dir = TempDir::new().unwrap();
        let db = MockDatabase::new(vec![products()]);
        let mut rows = product_rows();
        rows[0][6] = SqlValue::text_owned("z".repeat(OVERSIZE_THRESHOLD + 10));
        db.handle().set_rows(&products().name, rows);

        let mut downloader = Downloader::new(Box::new(db), dir.path(), "snapshot");
        let result = downloader
            .download_all(&[TableSelector::parse("shop.dbo").unwrap()])
            .await
            .unwrap();
        assert_eq!(result.rows, 2);
        assert_eq!(result.tables[0].skipped_values, 1);
        assert!(result.to_json().unwrap().contains("\"dataset\": \"snapshot\""));

        let content =
            fs::read_to_string(dir.path().join("snapshot/shop/dbo/products.csv")).unwrap();
        assert!(!content.contains("zzz"));
    }

    #[tokio::test]
    async fn test_generated_columns_are_left_out() {
        let dir = TempDir::new().unwrap();
        let mut version = make_test_column("version", ColumnType::Binary);
        version.is_generated = true;
        let mut label = make_test_column("label", ColumnType::Text);
        label.is_generated = true;
        let table = make_test_table_with(
            "shop",
            "dbo",
            "stock",
            vec![
                make_test_column("id", ColumnType::Int),
                version,
                make_test_column("name", ColumnType::Text),
                label,
            ],
        );
        let source = MockDatabase::new(vec![table.clone()]);
        source.handle().set_rows(
            &table.name,
            vec![vec![
                SqlValue::I32(1),
                SqlValue::bytes_owned(vec![0, 0, 0, 0, 0, 0, 7, 209]),
                SqlValue::from("Bolt"),
                SqlValue::from("1-Bolt"),
            ]],
        );
        let mut downloader = Downloader::new(Box::new(source), dir.path(), "snapshot");
        downloader.download(&table.name).await.unwrap();

        let content = fs::read_to_string(dir.path().join("snapshot/shop/dbo/stock.csv")).unwrap();
        assert_eq!(content, "id,name\n1,Bolt\n");

        let target = MockDatabase::new(vec![table.clone()]);
        let handle = target.handle();
        let mut populator =
            Populator::new(Box::new(target), &LocalFileSystem::from_path(dir.path()))
                .await
                .unwrap();
        assert_eq!(populator.load(&["snapshot"]).await.unwrap(), 1);
        assert_eq!(
            handle.rows(&table.name),
            vec![vec![SqlValue::I32(1), SqlValue::from("Bolt")]]
        );
    }

    #[tokio::test]
    async fn test_download_then_populate_round_trips() {
        let dir = TempDir::new().unwrap();
        let source = MockDatabase::new(vec![products()]);
        source.handle().set_rows(&products().name, product_rows());
        let mut downloader = Downloader::new(Box::new(source), dir.path(), "snapshot");
        downloader
            .download_selector(&TableSelector::parse("shop").unwrap())
            .await
            .unwrap();

        let target = MockDatabase::new(vec![products()]);
        let handle = target.handle();
        let mut populator =
            Populator::new(Box::new(target), &LocalFileSystem::from_path(dir.path()))
                .await
                .unwrap();
        populator.load(&["snapshot"]).await.unwrap();

        assert_eq!(handle.rows(&products().name), product_rows());
    }
}
