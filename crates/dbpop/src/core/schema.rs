//! Schema metadata: table names, columns, indexes and foreign keys.
//!
//! A fresh snapshot is loaded from the live database at the start of every
//! population or download run and is never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Name of a table qualified by optional catalog and schema.
///
/// Equality, hashing and ordering cover all three parts, so names can be used
/// directly as map and set keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableName {
    /// Catalog (database) name.
    pub catalog: Option<String>,

    /// Schema name.
    pub schema: Option<String>,

    /// Table name.
    pub table: String,
}

impl TableName {
    /// Create a fully qualified name.
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Create a name with no catalog or schema.
    pub fn unqualified(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// The present parts in catalog, schema, table order.
    pub fn parts(&self) -> impl Iterator<Item = &str> {
        self.catalog
            .as_deref()
            .into_iter()
            .chain(self.schema.as_deref())
            .chain(std::iter::once(self.table.as_str()))
    }

    /// Dotted name joining only the parts that are present.
    pub fn qualified_name(&self) -> String {
        self.parts().collect::<Vec<_>>().join(".")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Value converter used when loading CSV cells into this column.
    pub column_type: ColumnType,

    /// Native data type name (e.g., "int", "nvarchar", "datetime2").
    pub data_type: String,

    /// Maximum length for character/binary types (-1 for max, 0 when not applicable).
    pub max_length: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the server generates the column value (identity).
    pub is_auto_increment: bool,

    /// Whether the server computes the value and rejects explicit writes
    /// (computed and row version columns).
    #[serde(default)]
    pub is_generated: bool,
}

/// Index metadata. Carried for completeness; loading never orders by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,

    /// Table the index belongs to.
    pub table_name: TableName,

    /// Whether the index enforces uniqueness.
    pub is_unique: bool,

    /// Whether the index backs the primary key.
    pub is_primary_key: bool,

    /// Key columns in key order.
    pub columns: Vec<String>,
}

/// Foreign key constraint.
///
/// Compared by full value, so the same constraint seen from both the
/// referencing and the referenced table collapses to one set entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,

    /// Readable definition, e.g. `FOREIGN KEY (customer_id) REFERENCES dbo.customers (id)`.
    pub constraint_definition: String,

    /// Referenced (primary key side) table.
    pub pk_table: TableName,

    /// Referenced columns, paired positionally with `fk_columns`.
    pub pk_columns: Vec<String>,

    /// Referencing table that owns the constraint.
    pub fk_table: TableName,

    /// Referencing columns.
    pub fk_columns: Vec<String>,
}

impl ForeignKey {
    /// Build a foreign key, rejecting mismatched column lists.
    pub fn new(
        name: impl Into<String>,
        pk_table: TableName,
        pk_columns: Vec<String>,
        fk_table: TableName,
        fk_columns: Vec<String>,
    ) -> Option<Self> {
        if pk_columns.len() != fk_columns.len() || pk_columns.is_empty() {
            return None;
        }
        let constraint_definition = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            fk_columns.join(", "),
            pk_table,
            pk_columns.join(", ")
        );
        Some(Self {
            name: name.into(),
            constraint_definition,
            pk_table,
            pk_columns,
            fk_table,
            fk_columns,
        })
    }
}

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Qualified table name.
    pub name: TableName,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Indexes, including the primary key.
    pub indexes: Vec<Index>,

    /// Foreign keys owned or referenced by this table.
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    /// Find a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether any column is server generated.
    pub fn has_auto_increment(&self) -> bool {
        self.columns.iter().any(|c| c.is_auto_increment)
    }

    /// Copy of the table without generated columns, the shape a data file
    /// for it can hold.
    pub fn without_generated_columns(&self) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .filter(|c| !c.is_generated)
                .cloned()
                .collect(),
            ..self.clone()
        }
    }

    /// The primary key index, if the table has one.
    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.is_primary_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn make_test_column(name: &str, column_type: ColumnType) -> Column {
        Column {
            name: name.to_string(),
            column_type,
            data_type: "int".to_string(),
            max_length: 0,
            is_nullable: true,
            is_auto_increment: false,
            is_generated: false,
        }
    }

    #[test]
    fn test_qualified_name_skips_missing_parts() {
        assert_eq!(
            TableName::new("shop", "dbo", "orders").qualified_name(),
            "shop.dbo.orders"
        );
        assert_eq!(TableName::unqualified("orders").to_string(), "orders");

        let no_catalog = TableName {
            catalog: None,
            schema: Some("dbo".into()),
            table: "orders".into(),
        };
        assert_eq!(no_catalog.qualified_name(), "dbo.orders");
    }

    #[test]
    fn test_table_name_equality_covers_all_parts() {
        let a = TableName::new("shop", "dbo", "orders");
        let b = TableName::new("shop", "sales", "orders");
        assert_ne!(a, b);
        assert_eq!(a, TableName::new("shop", "dbo", "orders"));
    }

    #[test]
    fn test_foreign_key_value_dedup() {
        let customers = TableName::new("shop", "dbo", "customers");
        let orders = TableName::new("shop", "dbo", "orders");
        let make = || {
            ForeignKey::new(
                "fk_orders_customers",
                customers.clone(),
                vec!["id".into()],
                orders.clone(),
                vec!["customer_id".into()],
            )
            .unwrap()
        };

        let set: HashSet<ForeignKey> = [make(), make()].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(
            make().constraint_definition,
            "FOREIGN KEY (customer_id) REFERENCES shop.dbo.customers (id)"
        );
    }

    #[test]
    fn test_foreign_key_rejects_mismatched_columns() {
        let t = TableName::unqualified("t");
        assert!(ForeignKey::new("fk", t.clone(), vec!["a".into()], t, vec![]).is_none());
    }

    #[test]
    fn test_column_lookup_is_exact() {
        let table = Table {
            name: TableName::new("shop", "dbo", "orders"),
            columns: vec![
                make_test_column("id", ColumnType::Int),
                make_test_column("Total", ColumnType::Decimal),
            ],
            indexes: vec![],
            foreign_keys: vec![],
        };
        assert!(table.column("Total").is_some());
        assert!(table.column("total").is_none());
        assert!(!table.has_auto_increment());
        assert!(table.primary_key().is_none());
    }

    #[test]
    fn test_without_generated_columns() {
        let mut version = make_test_column("version", ColumnType::Binary);
        version.is_generated = true;
        let table = Table {
            name: TableName::new("shop", "dbo", "orders"),
            columns: vec![make_test_column("id", ColumnType::Int), version],
            indexes: vec![],
            foreign_keys: vec![],
        };
        let writable = table.without_generated_columns();
        assert_eq!(writable.name, table.name);
        assert_eq!(writable.columns.len(), 1);
        assert_eq!(writable.columns[0].name, "id");
        assert_eq!(table.columns.len(), 2);
    }
}
