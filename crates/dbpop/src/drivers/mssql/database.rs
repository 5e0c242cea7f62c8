//! SQL Server implementation of [`Database`].

use std::borrow::Cow;
use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{Query, Row, ToSql};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::identifier::detect_quote_char;
use crate::core::{
    Column, ColumnType, Database, ForeignKey, Index, PreparationStrategy, ProductMetadata, RowSink,
    SqlNullType, SqlValue, Table, TableName,
};
use crate::error::{DbPopError, Result};

use super::connection::{MssqlClient, MssqlConnection};
use super::preparation::ReferentialIntegrityStrategy;
use super::types::{column_type_for, is_row_version};

/// Parameters per INSERT statement, below SQL Server's limit of 2100.
const MAX_PARAMETERS: usize = 2000;

/// Rows per INSERT statement, SQL Server's limit for a VALUES list.
const MAX_ROWS_PER_INSERT: usize = 1000;

/// Default schema for names without one.
const DEFAULT_SCHEMA: &str = "dbo";

/// A SQL Server connection bound to the SQL Server dialect.
pub struct MssqlDatabase {
    client: MssqlClient,
    product_name: String,
    quote: char,
}

impl MssqlDatabase {
    pub fn new(connection: MssqlConnection, metadata: &ProductMetadata) -> Self {
        let quote = detect_quote_char(metadata.quoted_identifier_pattern.as_deref());
        debug!("Quoting identifiers with {}", quote);
        Self {
            client: connection.into_client(),
            product_name: metadata.product_name.clone(),
            quote,
        }
    }

    /// Run a plain batch. Session settings such as `USE` and
    /// `SET IDENTITY_INSERT` only outlive the statement when sent this way.
    async fn batch(&mut self, sql: &str) -> Result<()> {
        debug!("{}", sql);
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn use_catalog(&mut self, catalog: &str) -> Result<()> {
        let sql = format!("USE {}", self.quote_ident(catalog));
        self.batch(&sql).await
    }

    async fn query_table_names(
        &mut self,
        catalog: &str,
        schema: Option<&str>,
    ) -> Result<Vec<TableName>> {
        self.use_catalog(catalog).await?;

        let mut sql = String::from(
            "SELECT TABLE_SCHEMA, TABLE_NAME FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'",
        );
        if schema.is_some() {
            sql.push_str(" AND TABLE_SCHEMA = @P1");
        }
        sql.push_str(" ORDER BY TABLE_SCHEMA, TABLE_NAME");

        let mut query = Query::new(sql);
        if let Some(schema) = schema {
            query.bind(schema);
        }
        let rows = query.query(&mut self.client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| {
                TableName::new(
                    catalog,
                    row.get::<&str, _>(0).unwrap_or_default(),
                    row.get::<&str, _>(1).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn load_columns(&mut self, name: &TableName) -> Result<Vec<Column>> {
        let query = r#"
            SELECT
                COLUMN_NAME,
                DATA_TYPE,
                CAST(ISNULL(CHARACTER_MAXIMUM_LENGTH, 0) AS INT),
                CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END,
                ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsIdentity'), 0),
                ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(TABLE_SCHEMA) + '.' + QUOTENAME(TABLE_NAME)), COLUMN_NAME, 'IsComputed'), 0)
            FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2
            ORDER BY ORDINAL_POSITION
        "#;

        let mut query = Query::new(query);
        query.bind(name.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        query.bind(name.table.as_str());
        let rows = query.query(&mut self.client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| {
                let data_type = row.get::<&str, _>(1).unwrap_or_default();
                Column {
                    name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                    column_type: column_type_for(data_type),
                    data_type: data_type.to_string(),
                    max_length: row.get::<i32, _>(2).unwrap_or(0),
                    is_nullable: row.get::<i32, _>(3).unwrap_or(0) == 1,
                    is_auto_increment: row.get::<i32, _>(4).unwrap_or(0) == 1,
                    is_generated: row.get::<i32, _>(5).unwrap_or(0) == 1
                        || is_row_version(data_type),
                }
            })
            .collect())
    }

    async fn load_indexes(&mut self, name: &TableName) -> Result<Vec<Index>> {
        let query = r#"
            SELECT
                i.name,
                i.is_unique,
                i.is_primary_key,
                STUFF((
                    SELECT ',' + c2.name
                    FROM sys.index_columns ic2
                    JOIN sys.columns c2 ON ic2.object_id = c2.object_id AND ic2.column_id = c2.column_id
                    WHERE ic2.object_id = i.object_id AND ic2.index_id = i.index_id AND ic2.is_included_column = 0
                    ORDER BY ic2.key_ordinal
                    FOR XML PATH('')
                ), 1, 1, '') AS columns
            FROM sys.indexes i
            JOIN sys.tables tb ON i.object_id = tb.object_id
            JOIN sys.schemas s ON tb.schema_id = s.schema_id
            WHERE s.name = @P1
              AND tb.name = @P2
              AND i.type > 0
            ORDER BY i.name
        "#;

        let mut query = Query::new(query);
        query.bind(name.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        query.bind(name.table.as_str());
        let rows = query.query(&mut self.client).await?.into_first_result().await?;

        Ok(rows
            .iter()
            .map(|row| Index {
                name: row.get::<&str, _>(0).unwrap_or_default().to_string(),
                table_name: name.clone(),
                is_unique: row.get::<bool, _>(1).unwrap_or(false),
                is_primary_key: row.get::<bool, _>(2).unwrap_or(false),
                columns: split_columns(row.get::<&str, _>(3).unwrap_or_default()),
            })
            .collect())
    }

    /// Foreign keys on either side of the table, so that the referenced table
    /// also knows which constraints block its truncation.
    async fn load_foreign_keys(&mut self, name: &TableName) -> Result<Vec<ForeignKey>> {
        let query = r#"
            SELECT
                fk.name AS fk_name,
                ps.name AS fk_schema,
                pt.name AS fk_table,
                STUFF((
                    SELECT ',' + pc2.name
                    FROM sys.foreign_key_columns fkc2
                    JOIN sys.columns pc2 ON fkc2.parent_object_id = pc2.object_id AND fkc2.parent_column_id = pc2.column_id
                    WHERE fkc2.constraint_object_id = fk.object_id
                    ORDER BY fkc2.constraint_column_id
                    FOR XML PATH('')
                ), 1, 1, '') AS fk_columns,
                rs.name AS pk_schema,
                rt.name AS pk_table,
                STUFF((
                    SELECT ',' + rc2.name
                    FROM sys.foreign_key_columns fkc2
                    JOIN sys.columns rc2 ON fkc2.referenced_object_id = rc2.object_id AND fkc2.referenced_column_id = rc2.column_id
                    WHERE fkc2.constraint_object_id = fk.object_id
                    ORDER BY fkc2.constraint_column_id
                    FOR XML PATH('')
                ), 1, 1, '') AS pk_columns
            FROM sys.foreign_keys fk
            JOIN sys.tables pt ON fk.parent_object_id = pt.object_id
            JOIN sys.schemas ps ON pt.schema_id = ps.schema_id
            JOIN sys.tables rt ON fk.referenced_object_id = rt.object_id
            JOIN sys.schemas rs ON rt.schema_id = rs.schema_id
            WHERE (ps.name = @P1 AND pt.name = @P2)
               OR (rs.name = @P1 AND rt.name = @P2)
            ORDER BY fk.name
        "#;

        let mut query = Query::new(query);
        query.bind(name.schema.as_deref().unwrap_or(DEFAULT_SCHEMA));
        query.bind(name.table.as_str());
        let rows = query.query(&mut self.client).await?.into_first_result().await?;

        let mut foreign_keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let fk_name = row.get::<&str, _>(0).unwrap_or_default();
            let fk_table = sibling(
                name,
                row.get::<&str, _>(1).unwrap_or_default(),
                row.get::<&str, _>(2).unwrap_or_default(),
            );
            let pk_table = sibling(
                name,
                row.get::<&str, _>(4).unwrap_or_default(),
                row.get::<&str, _>(5).unwrap_or_default(),
            );
            let fk_columns = split_columns(row.get::<&str, _>(3).unwrap_or_default());
            let pk_columns = split_columns(row.get::<&str, _>(6).unwrap_or_default());

            match ForeignKey::new(fk_name, pk_table, pk_columns, fk_table, fk_columns) {
                Some(fk) => foreign_keys.push(fk),
                None => debug!("Skipping foreign key {} with mismatched columns", fk_name),
            }
        }
        Ok(foreign_keys)
    }

    /// Multi-row parameterized INSERTs, chunked to stay within the parameter limit.
    async fn insert_rows(
        &mut self,
        qualified_table: &str,
        columns: &[Column],
        rows: &[Vec<SqlValue<'static>>],
    ) -> Result<u64> {
        let cols_per_row = columns.len();
        if cols_per_row == 0 {
            return Err(DbPopError::invalid_value(
                qualified_table,
                "",
                "cannot insert with zero columns",
            ));
        }

        let col_str = columns
            .iter()
            .map(|c| self.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let max_rows_per_insert = (MAX_PARAMETERS / cols_per_row).clamp(1, MAX_ROWS_PER_INSERT);
        let mut total_inserted = 0u64;

        for chunk in rows.chunks(max_rows_per_insert) {
            let mut value_groups = Vec::with_capacity(chunk.len());
            let mut param_idx = 1;
            for _ in chunk {
                let placeholders: Vec<String> = (0..cols_per_row)
                    .map(|_| {
                        let p = format!("@P{}", param_idx);
                        param_idx += 1;
                        p
                    })
                    .collect();
                value_groups.push(format!("({})", placeholders.join(", ")));
            }

            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                qualified_table,
                col_str,
                value_groups.join(", ")
            );

            let params: Vec<Box<dyn ToSql>> = chunk
                .iter()
                .flat_map(|row| row.iter().map(sql_value_to_sql_param))
                .collect();
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();

            self.client.execute(sql.as_str(), &param_refs).await?;
            total_inserted += chunk.len() as u64;
        }

        Ok(total_inserted)
    }
}

#[async_trait]
impl Database for MssqlDatabase {
    fn product_name(&self) -> &str {
        &self.product_name
    }

    fn quote_char(&self) -> char {
        self.quote
    }

    async fn list_catalogs(&mut self) -> Result<Vec<String>> {
        let rows = self
            .client
            .simple_query("SELECT name FROM sys.databases ORDER BY name")
            .await?
            .into_first_result()
            .await?;
        Ok(rows
            .iter()
            .map(|row| row.get::<&str, _>(0).unwrap_or_default().to_string())
            .collect())
    }

    async fn list_tables(&mut self, catalog: &str) -> Result<Vec<TableName>> {
        self.query_table_names(catalog, None).await
    }

    async fn list_schema_tables(
        &mut self,
        catalog: &str,
        schema: &str,
    ) -> Result<Vec<TableName>> {
        self.query_table_names(catalog, Some(schema)).await
    }

    async fn load_tables(&mut self, names: &BTreeSet<TableName>) -> Result<Vec<Table>> {
        let mut tables = Vec::with_capacity(names.len());
        let mut current_catalog: Option<&str> = None;

        for name in names {
            if let Some(catalog) = name.catalog.as_deref() {
                if current_catalog != Some(catalog) {
                    self.use_catalog(catalog).await?;
                    current_catalog = Some(catalog);
                }
            }

            let columns = self.load_columns(name).await?;
            if columns.is_empty() {
                debug!("Table {} not found", name);
                continue;
            }
            let indexes = self.load_indexes(name).await?;
            let foreign_keys = self.load_foreign_keys(name).await?;

            debug!(
                "Loaded {}: {} columns, {} indexes, {} foreign keys",
                name,
                columns.len(),
                indexes.len(),
                foreign_keys.len()
            );
            tables.push(Table {
                name: name.clone(),
                columns,
                indexes,
                foreign_keys,
            });
        }

        info!("Loaded {} of {} tables", tables.len(), names.len());
        Ok(tables)
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("{}", sql);
        let result = self.client.execute(sql, &[]).await?;
        Ok(result.total())
    }

    async fn begin_transaction(&mut self) -> Result<()> {
        self.batch("BEGIN TRANSACTION").await
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.batch("COMMIT TRANSACTION").await
    }

    fn create_preparation_strategy(&self, all_tables: &[Table]) -> Box<dyn PreparationStrategy> {
        Box::new(ReferentialIntegrityStrategy::new(all_tables))
    }

    async fn bulk_insert(
        &mut self,
        table: &TableName,
        columns: &[Column],
        rows: Vec<Vec<SqlValue<'static>>>,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let qualified_table = self.quote_table(table);
        let identity_insert = columns.iter().any(|c| c.is_auto_increment);

        if identity_insert {
            self.batch(&format!("SET IDENTITY_INSERT {} ON", qualified_table))
                .await?;
        }
        let inserted = self.insert_rows(&qualified_table, columns, &rows).await;
        if identity_insert {
            let reset = self
                .batch(&format!("SET IDENTITY_INSERT {} OFF", qualified_table))
                .await;
            if inserted.is_ok() {
                reset?;
            }
        }

        let inserted = inserted?;
        debug!("Inserted {} rows into {}", inserted, table);
        Ok(inserted)
    }

    async fn scan_table(&mut self, table: &Table, sink: &mut dyn RowSink) -> Result<u64> {
        let select_list = table
            .columns
            .iter()
            .map(|c| {
                let quoted = self.quote_ident(&c.name);
                match c.column_type {
                    ColumnType::Other => format!("CONVERT(nvarchar(max), {}) AS {}", quoted, quoted),
                    _ => quoted,
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT {} FROM {}", select_list, self.quote_table(&table.name));
        debug!("{}", sql);

        let mut stream = self.client.simple_query(sql).await?.into_row_stream();
        let mut count = 0u64;
        while let Some(row) = stream.try_next().await? {
            let values = table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| decode_value(&row, idx, column.column_type))
                .collect::<Result<Vec<_>>>()?;
            sink.accept_row(&values)?;
            count += 1;
        }
        Ok(count)
    }
}

fn sibling(name: &TableName, schema: &str, table: &str) -> TableName {
    TableName {
        catalog: name.catalog.clone(),
        schema: Some(schema.to_string()),
        table: table.to_string(),
    }
}

fn split_columns(list: &str) -> Vec<String> {
    list.split(',')
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Decode one scanned cell, borrowing text and bytes from the row.
fn decode_value(row: &Row, idx: usize, column_type: ColumnType) -> Result<SqlValue<'_>> {
    let value = match column_type {
        ColumnType::Text | ColumnType::Other => row
            .try_get::<&str, _>(idx)?
            .map(|s| SqlValue::Text(Cow::Borrowed(s))),
        ColumnType::Boolean => row.try_get::<bool, _>(idx)?.map(SqlValue::Bool),
        ColumnType::TinyInt => row.try_get::<u8, _>(idx)?.map(SqlValue::U8),
        ColumnType::SmallInt => row.try_get::<i16, _>(idx)?.map(SqlValue::I16),
        ColumnType::Int => row.try_get::<i32, _>(idx)?.map(SqlValue::I32),
        ColumnType::BigInt => row.try_get::<i64, _>(idx)?.map(SqlValue::I64),
        ColumnType::Real => row.try_get::<f32, _>(idx)?.map(SqlValue::F32),
        ColumnType::Float => row.try_get::<f64, _>(idx)?.map(SqlValue::F64),
        ColumnType::Decimal => match row.try_get::<Decimal, _>(idx) {
            Ok(value) => value.map(SqlValue::Decimal),
            // money and smallmoney arrive as floats
            Err(_) => row.try_get::<f64, _>(idx)?.map(|f| {
                Decimal::try_from(f)
                    .map(SqlValue::Decimal)
                    .unwrap_or(SqlValue::F64(f))
            }),
        },
        ColumnType::Uuid => row.try_get::<Uuid, _>(idx)?.map(SqlValue::Uuid),
        ColumnType::Date => row.try_get::<NaiveDate, _>(idx)?.map(SqlValue::Date),
        ColumnType::Time => row.try_get::<NaiveTime, _>(idx)?.map(SqlValue::Time),
        ColumnType::DateTime => row.try_get::<NaiveDateTime, _>(idx)?.map(SqlValue::DateTime),
        ColumnType::DateTimeOffset => row
            .try_get::<DateTime<FixedOffset>, _>(idx)?
            .map(SqlValue::DateTimeOffset),
        ColumnType::Binary => row
            .try_get::<&[u8], _>(idx)?
            .map(|b| SqlValue::Bytes(Cow::Borrowed(b))),
    };
    Ok(value.unwrap_or_else(|| column_type.null()))
}

fn sql_value_to_sql_param(value: &SqlValue<'_>) -> Box<dyn ToSql> {
    match value {
        SqlValue::Null(null_type) => null_param(*null_type),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::U8(i) => Box::new(*i),
        SqlValue::I16(i) => Box::new(*i),
        SqlValue::I32(i) => Box::new(*i),
        SqlValue::I64(i) => Box::new(*i),
        SqlValue::F32(f) => Box::new(*f),
        SqlValue::F64(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.to_string()),
        SqlValue::Bytes(b) => Box::new(b.to_vec()),
        SqlValue::Uuid(u) => Box::new(*u),
        SqlValue::Decimal(d) => Box::new(*d),
        SqlValue::DateTime(dt) => Box::new(*dt),
        SqlValue::DateTimeOffset(dto) => Box::new(*dto),
        SqlValue::Date(d) => Box::new(*d),
        SqlValue::Time(t) => Box::new(*t),
    }
}

/// Typed NULL so the server does not have to convert from nvarchar.
fn null_param(null_type: SqlNullType) -> Box<dyn ToSql> {
    match null_type {
        SqlNullType::Bool => Box::new(Option::<bool>::None),
        SqlNullType::U8 => Box::new(Option::<u8>::None),
        SqlNullType::I16 => Box::new(Option::<i16>::None),
        SqlNullType::I32 => Box::new(Option::<i32>::None),
        SqlNullType::I64 => Box::new(Option::<i64>::None),
        SqlNullType::F32 => Box::new(Option::<f32>::None),
        SqlNullType::F64 => Box::new(Option::<f64>::None),
        SqlNullType::String => Box::new(Option::<String>::None),
        SqlNullType::Bytes => Box::new(Option::<Vec<u8>>::None),
        SqlNullType::Uuid => Box::new(Option::<Uuid>::None),
        SqlNullType::Decimal => Box::new(Option::<Decimal>::None),
        SqlNullType::DateTime => Box::new(Option::<NaiveDateTime>::None),
        SqlNullType::DateTimeOffset => Box::new(Option::<DateTime<FixedOffset>>::None),
        SqlNullType::Date => Box::new(Option::<NaiveDate>::None),
        SqlNullType::Time => Box::new(Option::<NaiveTime>::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_columns() {
        assert_eq!(split_columns("a,b"), vec!["a", "b"]);
        assert!(split_columns("").is_empty());
    }

    #[test]
    fn test_sibling_keeps_catalog() {
        let name = TableName::new("shop", "dbo", "orders");
        assert_eq!(
            sibling(&name, "sales", "customers"),
            TableName::new("shop", "sales", "customers")
        );
    }

    #[test]
    fn test_insert_chunk_size() {
        assert_eq!((MAX_PARAMETERS / 3).clamp(1, MAX_ROWS_PER_INSERT), 666);
        assert_eq!(MAX_PARAMETERS.clamp(1, MAX_ROWS_PER_INSERT), 1000);
        assert_eq!((MAX_PARAMETERS / 2500).clamp(1, MAX_ROWS_PER_INSERT), 1);
    }
}
