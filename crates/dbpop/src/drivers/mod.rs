//! Database dialect implementations.
//!
//! - [`mssql`]: Microsoft SQL Server over TDS (tiberius)
//!
//! # Adding a dialect
//!
//! 1. Create a module under `drivers/` with a connection type implementing
//!    [`DatabaseConnection`](crate::core::DatabaseConnection)
//! 2. Implement [`Database`](crate::core::Database) for the dialect, overriding
//!    the default truncation and preparation strategy where the product needs it
//! 3. Register a factory for its product name in a
//!    [`DialectCatalog`](crate::core::DialectCatalog)

pub mod mssql;

use crate::config::ConnectionSettings;
use crate::core::{Database, DialectCatalog};
use crate::error::Result;

/// Open a connection and bind it to the dialect of the connected product.
pub async fn connect(settings: &ConnectionSettings) -> Result<Box<dyn Database>> {
    let connection = mssql::MssqlConnection::connect(settings).await?;
    DialectCatalog::with_builtins().detect(connection).await
}
