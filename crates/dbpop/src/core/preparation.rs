//! Truncate-only preparation strategy.

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;

use super::schema::{Table, TableName};
use super::traits::{Database, PreparationStrategy};

/// Empties every known table before a load and does nothing afterwards.
///
/// Acts on the whole table set, not only the tables a load touches.
#[derive(Debug, Clone)]
pub struct DefaultPreparationStrategy {
    tables: Vec<TableName>,
}

impl DefaultPreparationStrategy {
    pub fn new(all_tables: &[Table]) -> Self {
        Self {
            tables: all_tables.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

#[async_trait]
impl PreparationStrategy for DefaultPreparationStrategy {
    async fn before_inserts(&self, database: &mut dyn Database) -> Result<()> {
        for table in &self.tables {
            debug!("Deleting rows from {}", table);
            database.truncate_table(table).await?;
        }
        Ok(())
    }

    async fn after_inserts(&self, _database: &mut dyn Database) -> Result<()> {
        Ok(())
    }
}
