//! Constraint-toggling preparation for SQL Server.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{Database, ForeignKey, PreparationStrategy, Table, TableName};
use crate::error::Result;

/// Empties every known table, then disables the foreign keys touching them
/// for the duration of the load.
///
/// A constraint seen from both of its tables is toggled once. Re-enabling
/// uses `WITH CHECK` so the server revalidates the loaded rows.
#[derive(Debug, Clone)]
pub struct ReferentialIntegrityStrategy {
    tables: Vec<TableName>,
    foreign_keys: BTreeSet<ForeignKey>,
}

impl ReferentialIntegrityStrategy {
    pub fn new(all_tables: &[Table]) -> Self {
        Self {
            tables: all_tables.iter().map(|t| t.name.clone()).collect(),
            foreign_keys: all_tables
                .iter()
                .flat_map(|t| t.foreign_keys.iter().cloned())
                .collect(),
        }
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys.iter()
    }
}

#[async_trait]
impl PreparationStrategy for ReferentialIntegrityStrategy {
    async fn before_inserts(&self, database: &mut dyn Database) -> Result<()> {
        for table in &self.tables {
            debug!("Deleting rows from {}", table);
            database.truncate_table(table).await?;
        }
        for fk in &self.foreign_keys {
            let sql = format!(
                "ALTER TABLE {} NOCHECK CONSTRAINT {}",
                database.quote_table(&fk.fk_table),
                database.quote_ident(&fk.name)
            );
            debug!("Disabling {} on {}", fk.name, fk.fk_table);
            database.execute(&sql).await?;
        }
        Ok(())
    }

    async fn after_inserts(&self, database: &mut dyn Database) -> Result<()> {
        for fk in &self.foreign_keys {
            let sql = format!(
                "ALTER TABLE {} WITH CHECK CHECK CONSTRAINT {}",
                database.quote_table(&fk.fk_table),
                database.quote_ident(&fk.name)
            );
            debug!("Enabling {} on {}", fk.name, fk.fk_table);
            database.execute(&sql).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{make_test_table, MockDatabase};

    fn tables() -> Vec<Table> {
        let customers_name = TableName::new("shop", "dbo", "customers");
        let orders_name = TableName::new("shop", "dbo", "orders");
        let fk = ForeignKey::new(
            "fk_orders_customers",
            customers_name,
            vec!["id".into()],
            orders_name,
            vec!["customer_id".into()],
        )
        .unwrap();

        let mut customers = make_test_table("shop", "dbo", "customers", &["id"]);
        let mut orders = make_test_table("shop", "dbo", "orders", &["id", "customer_id"]);
        customers.foreign_keys.push(fk.clone());
        orders.foreign_keys.push(fk);
        vec![customers, orders]
    }

    #[test]
    fn test_shared_constraint_collapses() {
        let strategy = ReferentialIntegrityStrategy::new(&tables());
        assert_eq!(strategy.foreign_keys().count(), 1);
    }

    #[tokio::test]
    async fn test_truncate_then_disable_then_enable() {
        let tables = tables();
        let mut db = MockDatabase::new(tables.clone());
        let strategy = ReferentialIntegrityStrategy::new(&tables);

        strategy.before_inserts(&mut db).await.unwrap();
        strategy.after_inserts(&mut db).await.unwrap();

        assert_eq!(
            db.statements(),
            vec![
                r#"DELETE FROM "shop"."dbo"."customers""#,
                r#"DELETE FROM "shop"."dbo"."orders""#,
                r#"ALTER TABLE "shop"."dbo"."orders" NOCHECK CONSTRAINT "fk_orders_customers""#,
                r#"ALTER TABLE "shop"."dbo"."orders" WITH CHECK CHECK CONSTRAINT "fk_orders_customers""#,
            ]
        );
    }

    #[tokio::test]
    async fn test_no_constraints_only_truncates() {
        let tables = vec![make_test_table("shop", "dbo", "notes", &["id"])];
        let mut db = MockDatabase::new(tables.clone());
        let strategy = ReferentialIntegrityStrategy::new(&tables);

        strategy.before_inserts(&mut db).await.unwrap();
        strategy.after_inserts(&mut db).await.unwrap();

        assert_eq!(db.statements(), vec!["DELETE FROM \"shop\".\"dbo\".\"notes\""]);
    }
}
