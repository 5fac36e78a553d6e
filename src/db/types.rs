//! Row decoding into [`Record`]s.
//!
//! Every column is decoded through the Rust type its declared SQL type maps
//! to ([`ColumnType`]) and then turned into JSON. Temporal and uuid columns
//! come out in the text form their chrono and uuid serde impls read, so a
//! record deserializes back into the instance that was written. A non-NULL
//! value the driver cannot decode is a [`DbError::Decode`] naming the column.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Record};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::error::BoxDynError;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo, ValueRef};
use std::fmt::{self, Write as _};
use uuid::Uuid;

/// Decoding strategy for a column, chosen from its exact type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    UnsignedBigInt,
    Real,
    Double,
    Numeric,
    Text,
    Binary,
    Json,
    Uuid,
    /// Date and time without zone
    Timestamp,
    /// Instant in time, read as UTC
    TimestampTz,
    Date,
    Time,
    Interval,
    /// Anything else: read as text on the servers, by storage class on SQLite
    Other,
}

impl ColumnType {
    /// Classify a driver type name, e.g. `INT8` on PostgreSQL or
    /// `BIGINT UNSIGNED` on MySQL.
    pub fn of(type_name: &str, db: DatabaseType) -> Self {
        let name = type_name.to_ascii_uppercase();
        match db {
            DatabaseType::PostgreSQL => Self::postgres(&name),
            DatabaseType::MySQL => Self::mysql(&name),
            DatabaseType::SQLite => Self::sqlite(&name),
        }
    }

    fn postgres(name: &str) -> Self {
        match name {
            "BOOL" => Self::Bool,
            "INT2" => Self::SmallInt,
            "INT4" => Self::Int,
            "INT8" => Self::BigInt,
            "FLOAT4" => Self::Real,
            "FLOAT8" => Self::Double,
            "NUMERIC" => Self::Numeric,
            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => Self::Text,
            "BYTEA" => Self::Binary,
            "JSON" | "JSONB" => Self::Json,
            "UUID" => Self::Uuid,
            "TIMESTAMP" => Self::Timestamp,
            "TIMESTAMPTZ" => Self::TimestampTz,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            "INTERVAL" => Self::Interval,
            _ => Self::Other,
        }
    }

    fn mysql(name: &str) -> Self {
        match name {
            "BOOLEAN" => Self::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Self::BigInt,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => Self::UnsignedBigInt,
            "FLOAT" => Self::Real,
            "DOUBLE" => Self::Double,
            "DECIMAL" => Self::Numeric,
            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM"
            | "SET" => Self::Text,
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                Self::Binary
            }
            "JSON" => Self::Json,
            "DATETIME" => Self::Timestamp,
            "TIMESTAMP" => Self::TimestampTz,
            "DATE" => Self::Date,
            "TIME" => Self::Time,
            _ => Self::Other,
        }
    }

    /// SQLite values carry their own storage class; only the declared
    /// boolean affinity changes how one is read.
    fn sqlite(name: &str) -> Self {
        match name {
            "BOOLEAN" => Self::Bool,
            _ => Self::Other,
        }
    }
}

/// Trait for converting database rows to backend-independent records.
pub trait RowToRecord {
    fn to_record(&self) -> DbResult<Record>;
}

impl RowToRecord for MySqlRow {
    fn to_record(&self) -> DbResult<Record> {
        collect(self, DatabaseType::MySQL, mysql::decode)
    }
}

impl RowToRecord for PgRow {
    fn to_record(&self) -> DbResult<Record> {
        collect(self, DatabaseType::PostgreSQL, postgres::decode)
    }
}

impl RowToRecord for SqliteRow {
    fn to_record(&self) -> DbResult<Record> {
        collect(self, DatabaseType::SQLite, sqlite::decode)
    }
}

fn collect<R, F>(row: &R, db: DatabaseType, decode: F) -> DbResult<Record>
where
    R: Row,
    F: Fn(&R, usize, ColumnType) -> DbResult<JsonValue>,
{
    row.columns()
        .iter()
        .map(|column| {
            let ty = ColumnType::of(column.type_info().name(), db);
            let value = decode(row, column.ordinal(), ty)?;
            Ok((column.name().to_string(), value))
        })
        .collect()
}

// =============================================================================
// Shared decoding helpers
// =============================================================================

/// Decode column `idx` as `T` and serialize it; SQL NULL becomes JSON null.
fn decode_as<'r, R, T>(row: &'r R, idx: usize) -> DbResult<JsonValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database> + Serialize,
{
    let value = row
        .try_get::<Option<T>, _>(idx)
        .map_err(|e| column_error(row, idx, e))?;
    serde_json::to_value(value).map_err(|e| column_error(row, idx, e))
}

/// Decode column `idx` as `T` and convert it with `to_json`.
fn decode_with<'r, R, T>(
    row: &'r R,
    idx: usize,
    to_json: impl FnOnce(T) -> JsonValue,
) -> DbResult<JsonValue>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    match row.try_get::<Option<T>, _>(idx) {
        Ok(Some(value)) => Ok(to_json(value)),
        Ok(None) => Ok(JsonValue::Null),
        Err(e) => Err(column_error(row, idx, e)),
    }
}

fn column_error<R: Row>(row: &R, idx: usize, err: impl fmt::Display) -> DbError {
    match row.columns().get(idx) {
        Some(column) => DbError::decode(format!(
            "Failed to decode column '{}' ({}): {}",
            column.name(),
            column.type_info().name(),
            err
        )),
        None => DbError::decode(format!("Failed to decode column {}: {}", idx, err)),
    }
}

/// Binary columns travel as base64 strings, which `Vec<u8>` fields with a
/// base64 serde adapter read back.
pub fn encode_binary(bytes: Vec<u8>) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Exact decimals
// =============================================================================

/// DECIMAL/NUMERIC value in its exact decimal text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Numeric(pub String);

impl Type<sqlx::Postgres> for Numeric {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("NUMERIC")
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        ty.name() == "NUMERIC"
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for Numeric {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        match value.format() {
            PgValueFormat::Text => Ok(Self(value.as_str()?.to_string())),
            PgValueFormat::Binary => numeric_from_binary(value.as_bytes()?).map(Self),
        }
    }
}

impl Type<sqlx::MySql> for Numeric {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        ty.name() == "DECIMAL"
    }
}

impl<'r> Decode<'r, sqlx::MySql> for Numeric {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, BoxDynError> {
        // DECIMAL arrives as text in both protocols
        let text = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(Self(text.to_string()))
    }
}

/// Render PostgreSQL's binary NUMERIC: a header of digit count, weight of the
/// first digit, sign and display scale, then base-10000 digits.
fn numeric_from_binary(buf: &[u8]) -> Result<String, BoxDynError> {
    let word = |i: usize| -> Result<i16, BoxDynError> {
        match buf.get(i * 2..i * 2 + 2) {
            Some(&[hi, lo]) => Ok(i16::from_be_bytes([hi, lo])),
            _ => Err("truncated NUMERIC value".into()),
        }
    };

    let ndigits = usize::try_from(word(0)?)?;
    let weight = i32::from(word(1)?);
    let sign = word(2)? as u16;
    let scale = usize::try_from(word(3)?)?;
    match sign {
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        _ => {}
    }
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |pos: i32| -> i16 {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        write!(out, "{}", digit(0))?;
        for pos in 1..=weight {
            write!(out, "{:04}", digit(pos))?;
        }
    }
    if scale > 0 {
        let mut fraction = String::new();
        let mut pos = weight + 1;
        while fraction.len() < scale {
            write!(fraction, "{:04}", digit(pos))?;
            pos += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

/// ISO 8601 duration, e.g. `P1M2DT3.5S`.
fn format_interval(interval: &PgInterval) -> String {
    let sign = if interval.microseconds < 0 { "-" } else { "" };
    let micros = interval.microseconds.unsigned_abs();
    let mut out = format!(
        "P{}M{}DT{}{}",
        interval.months,
        interval.days,
        sign,
        micros / 1_000_000
    );
    let fraction = micros % 1_000_000;
    if fraction != 0 {
        let digits = format!("{:06}", fraction);
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out.push('S');
    out
}

// =============================================================================
// Per-backend decoders
// =============================================================================

mod postgres {
    use super::*;

    pub(super) fn decode(row: &PgRow, idx: usize, ty: ColumnType) -> DbResult<JsonValue> {
        match ty {
            ColumnType::Bool => decode_as::<_, bool>(row, idx),
            ColumnType::SmallInt => decode_as::<_, i16>(row, idx),
            ColumnType::Int => decode_as::<_, i32>(row, idx),
            ColumnType::BigInt | ColumnType::UnsignedBigInt => decode_as::<_, i64>(row, idx),
            ColumnType::Real => decode_as::<_, f32>(row, idx),
            ColumnType::Double => decode_as::<_, f64>(row, idx),
            ColumnType::Numeric => decode_with(row, idx, |v: Numeric| JsonValue::String(v.0)),
            ColumnType::Binary => decode_with(row, idx, encode_binary),
            ColumnType::Json => decode_as::<_, JsonValue>(row, idx),
            ColumnType::Uuid => decode_as::<_, Uuid>(row, idx),
            ColumnType::Timestamp => decode_as::<_, NaiveDateTime>(row, idx),
            ColumnType::TimestampTz => decode_as::<_, DateTime<Utc>>(row, idx),
            ColumnType::Date => decode_as::<_, NaiveDate>(row, idx),
            ColumnType::Time => decode_as::<_, NaiveTime>(row, idx),
            ColumnType::Interval => {
                decode_with(row, idx, |v: PgInterval| JsonValue::String(format_interval(&v)))
            }
            ColumnType::Text | ColumnType::Other => decode_as::<_, String>(row, idx),
        }
    }
}

mod mysql {
    use super::*;

    pub(super) fn decode(row: &MySqlRow, idx: usize, ty: ColumnType) -> DbResult<JsonValue> {
        match ty {
            ColumnType::Bool => decode_as::<_, bool>(row, idx),
            ColumnType::UnsignedBigInt => decode_as::<_, u64>(row, idx),
            ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
                decode_as::<_, i64>(row, idx)
            }
            ColumnType::Real => decode_as::<_, f32>(row, idx),
            ColumnType::Double => decode_as::<_, f64>(row, idx),
            ColumnType::Numeric => decode_with(row, idx, |v: Numeric| JsonValue::String(v.0)),
            ColumnType::Binary => decode_with(row, idx, encode_binary),
            ColumnType::Json => decode_as::<_, JsonValue>(row, idx),
            ColumnType::Timestamp => decode_as::<_, NaiveDateTime>(row, idx),
            ColumnType::TimestampTz => decode_as::<_, DateTime<Utc>>(row, idx),
            ColumnType::Date => decode_as::<_, NaiveDate>(row, idx),
            ColumnType::Time => decode_as::<_, NaiveTime>(row, idx),
            ColumnType::Uuid | ColumnType::Interval | ColumnType::Text | ColumnType::Other => {
                decode_as::<_, String>(row, idx)
            }
        }
    }
}

mod sqlite {
    use super::*;

    pub(super) fn decode(row: &SqliteRow, idx: usize, ty: ColumnType) -> DbResult<JsonValue> {
        if ty == ColumnType::Bool {
            return decode_as::<_, bool>(row, idx);
        }

        let raw = row.try_get_raw(idx).map_err(|e| column_error(row, idx, e))?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let storage = raw.type_info().name().to_string();
        match storage.as_str() {
            "INTEGER" => decode_as::<_, i64>(row, idx),
            "REAL" => decode_as::<_, f64>(row, idx),
            "BLOB" => decode_with(row, idx, encode_binary),
            _ => decode_as::<_, String>(row, idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_postgres_type_names() {
        let pg = |name| ColumnType::of(name, DatabaseType::PostgreSQL);
        assert_eq!(pg("INT2"), ColumnType::SmallInt);
        assert_eq!(pg("int8"), ColumnType::BigInt);
        assert_eq!(pg("TIMESTAMPTZ"), ColumnType::TimestampTz);
        assert_eq!(pg("UUID"), ColumnType::Uuid);
        assert_eq!(pg("INTERVAL"), ColumnType::Interval);
        // Ranges and points contain "INT" but are not integers
        assert_eq!(pg("INT4RANGE"), ColumnType::Other);
        assert_eq!(pg("INT8RANGE"), ColumnType::Other);
        assert_eq!(pg("POINT"), ColumnType::Other);
    }

    #[test]
    fn test_mysql_type_names() {
        let my = |name| ColumnType::of(name, DatabaseType::MySQL);
        assert_eq!(my("TINYINT"), ColumnType::BigInt);
        assert_eq!(my("BIGINT UNSIGNED"), ColumnType::UnsignedBigInt);
        assert_eq!(my("BOOLEAN"), ColumnType::Bool);
        assert_eq!(my("TINYTEXT"), ColumnType::Text);
        assert_eq!(my("TINYBLOB"), ColumnType::Binary);
        assert_eq!(my("DECIMAL"), ColumnType::Numeric);
        assert_eq!(my("DATETIME"), ColumnType::Timestamp);
        assert_eq!(my("TIMESTAMP"), ColumnType::TimestampTz);
    }

    #[test]
    fn test_sqlite_type_names() {
        assert_eq!(ColumnType::of("BOOLEAN", DatabaseType::SQLite), ColumnType::Bool);
        assert_eq!(ColumnType::of("INTEGER", DatabaseType::SQLite), ColumnType::Other);
        assert_eq!(ColumnType::of("DATETIME", DatabaseType::SQLite), ColumnType::Other);
    }

    /// Binary NUMERIC: ndigits, weight, sign, dscale, then base-10000 digits.
    fn numeric(weight: i16, sign: u16, scale: i16, digits: &[i16]) -> Vec<u8> {
        let mut buf = Vec::new();
        for word in [digits.len() as i16, weight, sign as i16, scale]
            .into_iter()
            .chain(digits.iter().copied())
        {
            buf.extend_from_slice(&word.to_be_bytes());
        }
        buf
    }

    #[test]
    fn test_numeric_from_binary() {
        let cases = [
            (numeric(0, 0, 2, &[123, 4500]), "123.45"),
            (numeric(1, 0, 0, &[1]), "10000"),
            (numeric(-1, 0, 3, &[10]), "0.001"),
            (numeric(0, 0x4000, 1, &[7, 5000]), "-7.5"),
            (numeric(0, 0, 0, &[]), "0"),
            (numeric(0, 0xC000, 0, &[]), "NaN"),
        ];
        for (buf, expected) in cases {
            assert_eq!(numeric_from_binary(&buf).unwrap(), expected);
        }
        assert!(numeric_from_binary(&[0, 1]).is_err());
    }

    #[test]
    fn test_format_interval() {
        let interval = PgInterval {
            months: 1,
            days: 2,
            microseconds: 3_500_000,
        };
        assert_eq!(format_interval(&interval), "P1M2DT3.5S");

        let negative = PgInterval {
            months: 0,
            days: 0,
            microseconds: -250_000,
        };
        assert_eq!(format_interval(&negative), "P0M0DT-0.25S");
    }

    #[test]
    fn test_encode_binary() {
        assert_eq!(encode_binary(b"hello world".to_vec()), json!("aGVsbG8gd29ybGQ="));
        assert_eq!(encode_binary(Vec::new()), json!(""));
    }

    #[tokio::test]
    async fn test_sqlite_row_to_record() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, active BOOLEAN, raw BLOB, n INTEGER, at DATETIME)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO t VALUES (1, 'ada', 2.5, 1, x'6869', NULL, '2024-05-01T12:30:00+00:00')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let row = sqlx::query("SELECT id, name, score, active, raw, n, at FROM t")
            .fetch_one(&pool)
            .await
            .unwrap();
        let record = row.to_record().unwrap();

        assert_eq!(record.get("id"), Some(&json!(1)));
        assert_eq!(record.get("name"), Some(&json!("ada")));
        assert_eq!(record.get("score"), Some(&json!(2.5)));
        assert_eq!(record.get("active"), Some(&json!(true)));
        assert_eq!(record.get("raw"), Some(&json!("aGk=")));
        assert_eq!(record.get("n"), Some(&JsonValue::Null));
        assert_eq!(record.get("at"), Some(&json!("2024-05-01T12:30:00+00:00")));
    }

    #[tokio::test]
    async fn test_sqlite_undecodable_value_is_decode_error() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE flags (id INTEGER PRIMARY KEY, on_off BOOLEAN)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO flags VALUES (1, 'not a bool')")
            .execute(&pool)
            .await
            .unwrap();

        let row = sqlx::query("SELECT on_off FROM flags")
            .fetch_one(&pool)
            .await
            .unwrap();
        let err = row.to_record().unwrap_err();
        match err {
            DbError::Decode { message } => assert!(message.contains("on_off"), "{message}"),
            other => panic!("expected Decode, got {other:?}"),
        }
    }
}
