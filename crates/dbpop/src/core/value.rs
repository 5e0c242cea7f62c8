//! SQL value types shared by the loader and the downloader.
//!
//! Values travel in two directions: CSV cell -> [`SqlValue`] -> bulk insert
//! parameter, and scanned row -> [`SqlValue`] -> CSV field. The textual forms
//! produced by [`SqlValue::to_invariant_string`] are the ones
//! [`ColumnType::convert`](super::types::ColumnType::convert) parses back.

use std::borrow::Cow;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::types::{DATETIME_FORMAT, DATETIME_OFFSET_FORMAT, DATE_FORMAT, TIME_FORMAT};

/// Type hint for NULL values so parameters are bound with the right TDS type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlNullType {
    Bool,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Decimal,
    DateTime,
    DateTimeOffset,
    Date,
    Time,
}

/// SQL value with borrowed-or-owned text and bytes.
///
/// The `'a` lifetime lets scanned rows borrow from the driver's buffers while
/// they are serialized; use [`SqlValue::into_owned`] to keep a value around.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL with type hint.
    Null(SqlNullType),

    /// Boolean value (bit).
    Bool(bool),

    /// Unsigned byte (tinyint).
    U8(u8),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real).
    F32(f32),

    /// 64-bit floating point (float).
    F64(f64),

    /// Text data.
    Text(Cow<'a, str>),

    /// Binary data.
    Bytes(Cow<'a, [u8]>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null(t) => SqlValue::Null(t),
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::U8(v) => SqlValue::U8(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    /// Get the SqlNullType for this value.
    #[must_use]
    pub fn null_type(&self) -> SqlNullType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlNullType::Bool,
            SqlValue::U8(_) => SqlNullType::U8,
            SqlValue::I16(_) => SqlNullType::I16,
            SqlValue::I32(_) => SqlNullType::I32,
            SqlValue::I64(_) => SqlNullType::I64,
            SqlValue::F32(_) => SqlNullType::F32,
            SqlValue::F64(_) => SqlNullType::F64,
            SqlValue::Text(_) => SqlNullType::String,
            SqlValue::Bytes(_) => SqlNullType::Bytes,
            SqlValue::Uuid(_) => SqlNullType::Uuid,
            SqlValue::Decimal(_) => SqlNullType::Decimal,
            SqlValue::DateTime(_) => SqlNullType::DateTime,
            SqlValue::DateTimeOffset(_) => SqlNullType::DateTimeOffset,
            SqlValue::Date(_) => SqlNullType::Date,
            SqlValue::Time(_) => SqlNullType::Time,
        }
    }

    /// Locale-invariant text for a CSV field. `None` for NULL.
    ///
    /// Bytes are rendered as standard base64.
    pub fn to_invariant_string(&self) -> Option<Cow<'_, str>> {
        let s = match self {
            SqlValue::Null(_) => return None,
            SqlValue::Text(s) => return Some(Cow::Borrowed(s.as_ref())),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::U8(v) => v.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Bytes(b) => BASE64.encode(b),
            SqlValue::Uuid(v) => v.hyphenated().to_string(),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::DateTime(v) => v.format(DATETIME_FORMAT).to_string(),
            SqlValue::DateTimeOffset(v) => v.format(DATETIME_OFFSET_FORMAT).to_string(),
            SqlValue::Date(v) => v.format(DATE_FORMAT).to_string(),
            SqlValue::Time(v) => v.format(TIME_FORMAT).to_string(),
        };
        Some(Cow::Owned(s))
    }
}

// Convenience constructors for common cases
impl<'a> SqlValue<'a> {
    /// Create a text value from a borrowed string slice.
    #[must_use]
    pub fn text_borrowed(s: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(s))
    }

    /// Create a text value from an owned String.
    #[must_use]
    pub fn text_owned(s: String) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(s))
    }

    /// Create a bytes value from an owned Vec<u8>.
    #[must_use]
    pub fn bytes_owned(b: Vec<u8>) -> SqlValue<'static> {
        SqlValue::Bytes(Cow::Owned(b))
    }
}

impl From<i32> for SqlValue<'static> {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_into_owned() {
        let borrowed: SqlValue<'_> = SqlValue::Text(Cow::Borrowed("hello"));
        let owned: SqlValue<'static> = borrowed.into_owned();
        assert_eq!(owned, SqlValue::Text(Cow::Owned("hello".to_string())));
    }

    #[test]
    fn test_null_has_no_text() {
        assert!(SqlValue::Null(SqlNullType::String).to_invariant_string().is_none());
        assert!(SqlValue::Null(SqlNullType::I32).is_null());
        assert!(!SqlValue::I32(42).is_null());
    }

    #[test]
    fn test_invariant_formatting() {
        let text = |v: SqlValue<'_>| v.to_invariant_string().map(|s| s.into_owned());

        assert_eq!(text(SqlValue::Bool(true)), Some("true".into()));
        assert_eq!(text(SqlValue::F64(1234.5)), Some("1234.5".into()));
        assert_eq!(
            text(SqlValue::Decimal(Decimal::new(-123456, 3))),
            Some("-123.456".into())
        );
        assert_eq!(
            text(SqlValue::Bytes(Cow::Borrowed(b"hi"))),
            Some("aGk=".into())
        );

        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_milli_opt(13, 5, 9, 250)
            .unwrap();
        assert_eq!(
            text(SqlValue::DateTime(dt)),
            Some("2024-02-29 13:05:09.250".into())
        );
        assert_eq!(text(SqlValue::Date(dt.date())), Some("2024-02-29".into()));
    }

    #[test]
    fn test_null_type_follows_value() {
        assert_eq!(SqlValue::U8(1).null_type(), SqlNullType::U8);
        assert_eq!(SqlValue::from("x").null_type(), SqlNullType::String);
        assert_eq!(SqlValue::from(3).null_type(), SqlNullType::I32);
    }
}
