//! SQL Server data type to converter mapping.

use crate::core::ColumnType;

/// Pick the converter for a native SQL Server data type name.
pub fn column_type_for(data_type: &str) -> ColumnType {
    match data_type.to_lowercase().as_str() {
        "char" | "varchar" | "nchar" | "nvarchar" | "text" | "ntext" | "sysname" => {
            ColumnType::Text
        }
        "bit" => ColumnType::Boolean,
        "tinyint" => ColumnType::TinyInt,
        "smallint" => ColumnType::SmallInt,
        "int" => ColumnType::Int,
        "bigint" => ColumnType::BigInt,
        "real" => ColumnType::Real,
        "float" => ColumnType::Float,
        "decimal" | "numeric" | "money" | "smallmoney" => ColumnType::Decimal,
        "uniqueidentifier" => ColumnType::Uuid,
        "date" => ColumnType::Date,
        "time" => ColumnType::Time,
        "datetime" | "datetime2" | "smalldatetime" => ColumnType::DateTime,
        "datetimeoffset" => ColumnType::DateTimeOffset,
        "binary" | "varbinary" | "image" | "timestamp" | "rowversion" => ColumnType::Binary,
        _ => ColumnType::Other,
    }
}

/// `timestamp`/`rowversion` values are assigned by the server on every write.
pub fn is_row_version(data_type: &str) -> bool {
    matches!(data_type.to_lowercase().as_str(), "timestamp" | "rowversion")
}
