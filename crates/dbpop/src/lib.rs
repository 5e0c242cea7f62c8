//! # dbpop
//!
//! Populate a database from CSV datasets, and download tables back into them.
//!
//! A dataset root is laid out as `<root>/<dataset>/<catalog>/<schema>/<table>.csv`.
//! Loading a dataset empties every table the datasets know about, then inserts
//! the requested datasets inside one transaction with foreign keys suspended:
//!
//! - **Dialect detection** picks the [`Database`] implementation from the
//!   connected product
//! - **Batched inserts** with per-column value conversion and `*b64` binary columns
//! - **Downloads** mirror the dataset layout, so a snapshot can be loaded back
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbpop::Populator;
//!
//! #[tokio::main]
//! async fn main() -> dbpop::Result<()> {
//!     let mut populator = Populator::builder().environment("qa").build().await?;
//!     let rows = populator.load(&["base", "customers"]).await?;
//!     println!("Loaded {} rows", rows);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod dataset;
pub mod download;
pub mod drivers;
pub mod error;
pub mod populate;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{ConnectionOverrides, ConnectionSettings, Env};
pub use core::{ColumnType, Database, DialectCatalog, SqlValue, Table, TableName};
pub use dataset::{FileTree, LocalFileSystem};
pub use download::{DownloadResult, Downloader, TableSelector};
pub use drivers::mssql::MssqlConnection;
pub use error::{DbPopError, Result};
pub use populate::{PopulateResult, Populator, PopulatorBuilder};
