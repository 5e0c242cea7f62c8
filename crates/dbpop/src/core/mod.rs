//! Core abstractions shared by the loader, the downloader and the drivers.
//!
//! - [`schema`]: table names, columns, indexes and foreign keys
//! - [`types`]: column value converters and the textual formats they accept
//! - [`value`]: SQL values exchanged with drivers
//! - [`identifier`]: quote character detection and identifier quoting
//! - [`traits`]: the [`Database`] dialect contract and its collaborators
//! - [`preparation`]: the truncate-only preparation strategy
//! - [`catalog`]: product-name keyed dialect registry

pub mod catalog;
pub mod identifier;
pub mod preparation;
pub mod schema;
pub mod traits;
pub mod types;
pub mod value;

pub use catalog::DialectCatalog;
pub use preparation::DefaultPreparationStrategy;
pub use schema::{Column, ForeignKey, Index, Table, TableName};
pub use traits::{Database, DatabaseConnection, PreparationStrategy, ProductMetadata, RowSink};
pub use types::ColumnType;
pub use value::{SqlNullType, SqlValue};
