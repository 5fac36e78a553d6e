//! Driver encoding for [`QueryParam`].
//!
//! `QueryParam` implements `Encode` for each backend and reports the SQL
//! type of the variant it holds through `Encode::produces`, so a positional
//! argument list binds with one `bind` call per value on every driver.

use crate::models::QueryParam;
use serde_json::Value as JsonValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::mysql::MySqlTypeInfo;
use sqlx::postgres::types::Oid;
use sqlx::postgres::PgTypeInfo;
use sqlx::query::Query;
use sqlx::sqlite::SqliteTypeInfo;
use sqlx::types::Json;
use sqlx::{Database, Encode, MySql, Postgres, Sqlite, Type};

/// Build a query with `params` bound in placeholder order.
pub(crate) fn bind<'q, DB>(
    sql: &'q str,
    params: &'q [QueryParam],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    QueryParam: Encode<'q, DB> + Type<DB>,
{
    params
        .iter()
        .fold(sqlx::query(sql), |query, param| query.bind(param))
}

// =============================================================================
// PostgreSQL
// =============================================================================

/// A parameter declared with OID 0 takes its type from the statement context.
fn unspecified() -> PgTypeInfo {
    PgTypeInfo::with_oid(Oid(0))
}

impl Type<Postgres> for QueryParam {
    fn type_info() -> PgTypeInfo {
        unspecified()
    }
}

impl<'q> Encode<'q, Postgres> for QueryParam {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Int(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Float(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::String(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Json(v) => Encode::<Postgres>::encode(Json(v), buf),
            Self::Timestamp(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Date(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Uuid(v) => Encode::<Postgres>::encode_by_ref(v, buf),
            Self::Bytes(v) => Encode::<Postgres>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(postgres_type(self))
    }
}

fn postgres_type(param: &QueryParam) -> PgTypeInfo {
    match param {
        QueryParam::Null => unspecified(),
        QueryParam::Bool(_) => <bool as Type<Postgres>>::type_info(),
        QueryParam::Int(_) => <i64 as Type<Postgres>>::type_info(),
        QueryParam::Float(_) => <f64 as Type<Postgres>>::type_info(),
        QueryParam::String(_) => <String as Type<Postgres>>::type_info(),
        QueryParam::Json(_) => <Json<JsonValue> as Type<Postgres>>::type_info(),
        QueryParam::Timestamp(_) => <chrono::DateTime<chrono::Utc> as Type<Postgres>>::type_info(),
        QueryParam::Date(_) => <chrono::NaiveDate as Type<Postgres>>::type_info(),
        QueryParam::Uuid(_) => <uuid::Uuid as Type<Postgres>>::type_info(),
        QueryParam::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
    }
}

// =============================================================================
// MySQL
// =============================================================================

impl Type<MySql> for QueryParam {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }
}

impl<'q> Encode<'q, MySql> for QueryParam {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::Int(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::Float(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::String(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::Json(v) => Encode::<MySql>::encode(Json(v), buf),
            Self::Timestamp(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::Date(v) => Encode::<MySql>::encode_by_ref(v, buf),
            Self::Uuid(v) => Encode::<MySql>::encode(v.hyphenated().to_string(), buf),
            Self::Bytes(v) => Encode::<MySql>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            Self::Null | Self::String(_) | Self::Uuid(_) => <str as Type<MySql>>::type_info(),
            Self::Bool(_) => <bool as Type<MySql>>::type_info(),
            Self::Int(_) => <i64 as Type<MySql>>::type_info(),
            Self::Float(_) => <f64 as Type<MySql>>::type_info(),
            Self::Json(_) => <Json<JsonValue> as Type<MySql>>::type_info(),
            Self::Timestamp(_) => <chrono::DateTime<chrono::Utc> as Type<MySql>>::type_info(),
            Self::Date(_) => <chrono::NaiveDate as Type<MySql>>::type_info(),
            Self::Bytes(_) => <Vec<u8> as Type<MySql>>::type_info(),
        })
    }
}

// =============================================================================
// SQLite
// =============================================================================

impl Type<Sqlite> for QueryParam {
    fn type_info() -> SqliteTypeInfo {
        <str as Type<Sqlite>>::type_info()
    }
}

impl<'q> Encode<'q, Sqlite> for QueryParam {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        match self {
            Self::Null => Ok(IsNull::Yes),
            Self::Bool(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            Self::Int(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            Self::Float(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            Self::String(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            // No JSON storage class; stored as text
            Self::Json(v) => Encode::<Sqlite>::encode(v.to_string(), buf),
            Self::Timestamp(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            Self::Date(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
            Self::Uuid(v) => Encode::<Sqlite>::encode(v.hyphenated().to_string(), buf),
            Self::Bytes(v) => Encode::<Sqlite>::encode_by_ref(v, buf),
        }
    }
}
