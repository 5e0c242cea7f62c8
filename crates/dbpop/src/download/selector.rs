//! Download selectors: `catalog`, `catalog.schema` or `catalog.schema.table`.

use std::fmt;
use std::str::FromStr;

use crate::core::{Database, TableName};
use crate::error::{DbPopError, Result};

/// Which tables a download covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSelector {
    /// Every base table of a catalog.
    Catalog(String),
    /// Every base table of one schema.
    Schema { catalog: String, schema: String },
    /// One table.
    Table(TableName),
}

impl TableSelector {
    pub fn parse(selector: &str) -> Result<Self> {
        let parts: Vec<&str> = selector.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(DbPopError::InvalidSelector(selector.to_string()));
        }
        match parts.as_slice() {
            [catalog] => Ok(Self::Catalog(catalog.to_string())),
            [catalog, schema] => Ok(Self::Schema {
                catalog: catalog.to_string(),
                schema: schema.to_string(),
            }),
            [catalog, schema, table] => Ok(Self::Table(TableName::new(*catalog, *schema, *table))),
            _ => Err(DbPopError::InvalidSelector(selector.to_string())),
        }
    }

    /// Resolve to concrete table names using the dialect's listings.
    pub async fn expand(&self, database: &mut dyn Database) -> Result<Vec<TableName>> {
        match self {
            Self::Catalog(catalog) => database.list_tables(catalog).await,
            Self::Schema { catalog, schema } => database.list_schema_tables(catalog, schema).await,
            Self::Table(name) => Ok(vec![name.clone()]),
        }
    }
}

impl FromStr for TableSelector {
    type Err = DbPopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(catalog) => f.write_str(catalog),
            Self::Schema { catalog, schema } => write!(f, "{}.{}", catalog, schema),
            Self::Table(name) => write!(f, "{}", name),
        }
    }
}
