//! Dialect catalog for explicit dialect selection.
//!
//! The [`DialectCatalog`] maps database product names to factories that wrap an
//! open connection in the matching [`Database`] implementation. It is built
//! explicitly and handed to whoever connects, so adding a dialect means
//! registering one more factory.
//!
//! # Example
//!
//! ```rust,ignore
//! let catalog = DialectCatalog::with_builtins();
//! let connection = MssqlConnection::connect(&settings).await?;
//! let database = catalog.detect(connection).await?;
//! ```

use std::collections::HashMap;

use tracing::info;

use crate::drivers::mssql::{MssqlConnection, MssqlDatabase, SQL_SERVER_PRODUCT_NAME};
use crate::error::{DbPopError, Result};

use super::traits::{Database, DatabaseConnection, ProductMetadata};

/// Builds a dialect around an open connection.
pub type DialectFactory<C> = Box<dyn Fn(C, &ProductMetadata) -> Box<dyn Database> + Send + Sync>;

/// Registry of dialects keyed by product name.
pub struct DialectCatalog<C> {
    factories: HashMap<String, DialectFactory<C>>,
}

impl<C> Default for DialectCatalog<C> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }
}

impl<C: DatabaseConnection + 'static> DialectCatalog<C> {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dialect factory for a product name, replacing any previous one.
    pub fn register<F>(&mut self, product_name: impl Into<String>, factory: F)
    where
        F: Fn(C, &ProductMetadata) -> Box<dyn Database> + Send + Sync + 'static,
    {
        self.factories.insert(product_name.into(), Box::new(factory));
    }

    /// Check whether a product has a registered dialect.
    pub fn supports(&self, product_name: &str) -> bool {
        self.factories.contains_key(product_name)
    }

    /// Registered product names, sorted.
    pub fn product_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Inspect the connection's product metadata and wrap it in the matching dialect.
    pub async fn detect(&self, mut connection: C) -> Result<Box<dyn Database>> {
        let metadata = connection.product_metadata().await?;
        let factory = self.factories.get(&metadata.product_name).ok_or_else(|| {
            DbPopError::UnsupportedDatabase(format!(
                "{} (supported: {})",
                metadata.product_name,
                self.product_names().join(", ")
            ))
        })?;
        info!("Detected {}", metadata.product_name);
        Ok(factory(connection, &metadata))
    }
}

impl DialectCatalog<MssqlConnection> {
    /// Catalog with the built-in SQL Server dialect registered.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register(SQL_SERVER_PRODUCT_NAME, |connection, metadata| {
            Box::new(MssqlDatabase::new(connection, metadata))
        });
        catalog
    }
}
