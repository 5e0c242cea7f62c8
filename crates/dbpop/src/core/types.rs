//! Column value converters.
//!
//! A [`ColumnType`] turns the textual content of a CSV cell into a value in the
//! column's native representation. Drivers decide which variant a native data
//! type maps to.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value::{SqlNullType, SqlValue};

/// Date format used on both sides of a CSV file.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format; fractional seconds are written only when non-zero.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Timestamp format.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Timestamp with offset format.
pub const DATETIME_OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %:z";

/// Converter from CSV text to a native column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// Character data; the text is used as is.
    Text,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Float,
    Decimal,
    Uuid,
    Date,
    Time,
    DateTime,
    DateTimeOffset,
    /// Binary data; receives the UTF-8 bytes of the cell text.
    Binary,
    /// Anything without a dedicated converter. Read and written as text.
    Other,
}

impl ColumnType {
    /// Whether values of this type are written base64 encoded with a `*b64` header tag.
    pub fn is_binary(&self) -> bool {
        matches!(self, ColumnType::Binary)
    }

    /// Type hint for NULLs in a column of this type.
    pub fn null_type(&self) -> SqlNullType {
        match self {
            ColumnType::Text | ColumnType::Other => SqlNullType::String,
            ColumnType::Boolean => SqlNullType::Bool,
            ColumnType::TinyInt => SqlNullType::U8,
            ColumnType::SmallInt => SqlNullType::I16,
            ColumnType::Int => SqlNullType::I32,
            ColumnType::BigInt => SqlNullType::I64,
            ColumnType::Real => SqlNullType::F32,
            ColumnType::Float => SqlNullType::F64,
            ColumnType::Decimal => SqlNullType::Decimal,
            ColumnType::Uuid => SqlNullType::Uuid,
            ColumnType::Date => SqlNullType::Date,
            ColumnType::Time => SqlNullType::Time,
            ColumnType::DateTime => SqlNullType::DateTime,
            ColumnType::DateTimeOffset => SqlNullType::DateTimeOffset,
            ColumnType::Binary => SqlNullType::Bytes,
        }
    }

    /// NULL of this column's type.
    pub fn null(&self) -> SqlValue<'static> {
        SqlValue::Null(self.null_type())
    }

    /// Parse a non-empty CSV cell into this type's native representation.
    ///
    /// Numbers use `.` as the decimal separator regardless of locale.
    pub fn convert(&self, s: &str) -> Result<SqlValue<'static>, String> {
        let value = match self {
            ColumnType::Text | ColumnType::Other => SqlValue::Text(Cow::Owned(s.to_string())),
            ColumnType::Boolean => SqlValue::Bool(parse_bool(s)?),
            ColumnType::TinyInt => SqlValue::U8(parse_num(s, "tinyint")?),
            ColumnType::SmallInt => SqlValue::I16(parse_num(s, "smallint")?),
            ColumnType::Int => SqlValue::I32(parse_num(s, "int")?),
            ColumnType::BigInt => SqlValue::I64(parse_num(s, "bigint")?),
            ColumnType::Real => SqlValue::F32(parse_num(s, "real")?),
            ColumnType::Float => SqlValue::F64(parse_num(s, "float")?),
            ColumnType::Decimal => SqlValue::Decimal(parse_decimal(s)?),
            ColumnType::Uuid => SqlValue::Uuid(
                Uuid::parse_str(s.trim()).map_err(|e| format!("invalid uuid '{}': {}", s, e))?,
            ),
            ColumnType::Date => SqlValue::Date(
                NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                    .map_err(|e| format!("invalid date '{}': {}", s, e))?,
            ),
            ColumnType::Time => SqlValue::Time(
                NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
                    .map_err(|e| format!("invalid time '{}': {}", s, e))?,
            ),
            ColumnType::DateTime => SqlValue::DateTime(parse_datetime(s)?),
            ColumnType::DateTimeOffset => SqlValue::DateTimeOffset(
                DateTime::parse_from_str(s.trim(), DATETIME_OFFSET_FORMAT)
                    .or_else(|_| DateTime::parse_from_rfc3339(s.trim()))
                    .map_err(|e| format!("invalid datetimeoffset '{}': {}", s, e))?,
            ),
            ColumnType::Binary => SqlValue::Bytes(Cow::Owned(s.as_bytes().to_vec())),
        };
        Ok(value)
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("invalid boolean '{}'", s)),
    }
}

fn parse_num<T>(s: &str, type_name: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.trim()
        .parse::<T>()
        .map_err(|e| format!("invalid {} '{}': {}", type_name, s, e))
}

fn parse_decimal(s: &str) -> Result<Decimal, String> {
    let trimmed = s.trim();
    trimmed
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| format!("invalid decimal '{}': {}", s, e))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    let trimmed = s.trim();
    NaiveDateTime::parse_from_str(trimmed, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| format!("invalid datetime '{}': {}", s, e))
}
