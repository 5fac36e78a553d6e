//! Query execution engine.
//!
//! This module runs compiled SQL on a single [`ScopedConnection`] with support for:
//! - Positional parameters
//! - Optional per-call timeouts
//! - Row decoding into [`Record`]s
//! - Command status synthesis for writes
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific query and write operations
//! - `postgres`: PostgreSQL-specific query and write operations
//! - `sqlite`: SQLite-specific query and write operations
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::params::bind;
use crate::db::pool::ScopedConnection;
use crate::db::types::RowToRecord;
use crate::error::{DbError, DbResult};
use crate::models::{CommandStatus, QueryParam, Record, StatementKind};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles database query execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryExecutor {
    default_timeout: Option<Duration>,
}

impl QueryExecutor {
    /// Create an executor. `None` means calls run without a time limit.
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Fetch at most one row.
    pub async fn fetch_optional(
        &self,
        conn: &mut ScopedConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Record>> {
        debug!(sql = %sql, params = params.len(), "Fetching single row");

        let record = impl_db_dispatch!(conn, ScopedConnection, {
            MySql(c) => mysql::fetch_optional(c, sql, params, self.default_timeout).await?,
            Postgres(c) => postgres::fetch_optional(c, sql, params, self.default_timeout).await?,
            SQLite(c) => sqlite::fetch_optional(c, sql, params, self.default_timeout).await?,
        });
        Ok(record)
    }

    /// Fetch every row produced by the statement.
    pub async fn fetch_all(
        &self,
        conn: &mut ScopedConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Record>> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), "Fetching rows");

        let records = impl_db_dispatch!(conn, ScopedConnection, {
            MySql(c) => mysql::fetch_all(c, sql, params, self.default_timeout).await?,
            Postgres(c) => postgres::fetch_all(c, sql, params, self.default_timeout).await?,
            SQLite(c) => sqlite::fetch_all(c, sql, params, self.default_timeout).await?,
        });

        debug!(
            rows = records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Rows fetched"
        );
        Ok(records)
    }

    /// Execute a write statement and return its command status.
    pub async fn execute(
        &self,
        conn: &mut ScopedConnection,
        sql: &str,
        params: &[QueryParam],
        kind: StatementKind,
    ) -> DbResult<CommandStatus> {
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let rows_affected = impl_db_dispatch!(conn, ScopedConnection, {
            MySql(c) => mysql::execute(c, sql, params, self.default_timeout).await?,
            Postgres(c) => postgres::execute(c, sql, params, self.default_timeout).await?,
            SQLite(c) => sqlite::execute(c, sql, params, self.default_timeout).await?,
        });

        let status = CommandStatus::from_rows_affected(kind, rows_affected);
        debug!(status = %status, "Statement executed");
        Ok(status)
    }
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Await a driver future, bounded by `limit` when one is set.
async fn run_with_timeout<T, F>(operation: &str, limit: Option<Duration>, fut: F) -> DbResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match limit {
        Some(limit) => match timeout(limit, fut).await {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(timeout_error(operation, limit)),
        },
        None => fut.await.map_err(DbError::from),
    }
}

fn timeout_error(operation: &str, limit: Duration) -> DbError {
    DbError::timeout(operation, limit)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.
// The code structure is intentionally parallel to make differences obvious.

mod mysql {
    use super::*;
    use sqlx::MySql;
    use sqlx::pool::PoolConnection;

    pub async fn fetch_optional(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Option<Record>> {
        // When params is empty, use raw SQL to avoid prepared statement issues
        let row = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_optional(sql)).await?
        } else {
            let query = bind::<MySql>(sql, params);
            run_with_timeout("query execution", limit, query.fetch_optional(&mut **conn)).await?
        };
        row.as_ref().map(RowToRecord::to_record).transpose()
    }

    pub async fn fetch_all(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_all(sql)).await?
        } else {
            let query = bind::<MySql>(sql, params);
            run_with_timeout("query execution", limit, query.fetch_all(&mut **conn)).await?
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute(
        conn: &mut PoolConnection<MySql>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("write operation", limit, (&mut **conn).execute(sql)).await?
        } else {
            let query = bind::<MySql>(sql, params);
            run_with_timeout("write operation", limit, query.execute(&mut **conn)).await?
        };
        Ok(result.rows_affected())
    }
}

mod postgres {
    use super::*;
    use sqlx::Postgres;
    use sqlx::pool::PoolConnection;

    /// The driver caches prepared statements by SQL text. A statement
    /// prepared with an untyped NULL gets its parameter types from the server,
    /// which may differ from the types later non-NULL values are sent with.
    fn cacheable(params: &[QueryParam]) -> bool {
        !params.iter().any(QueryParam::is_null)
    }

    pub async fn fetch_optional(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Option<Record>> {
        let row = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_optional(sql)).await?
        } else {
            let query = bind::<Postgres>(sql, params).persistent(cacheable(params));
            run_with_timeout("query execution", limit, query.fetch_optional(&mut **conn)).await?
        };
        row.as_ref().map(RowToRecord::to_record).transpose()
    }

    pub async fn fetch_all(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_all(sql)).await?
        } else {
            let query = bind::<Postgres>(sql, params).persistent(cacheable(params));
            run_with_timeout("query execution", limit, query.fetch_all(&mut **conn)).await?
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute(
        conn: &mut PoolConnection<Postgres>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("write operation", limit, (&mut **conn).execute(sql)).await?
        } else {
            let query = bind::<Postgres>(sql, params).persistent(cacheable(params));
            run_with_timeout("write operation", limit, query.execute(&mut **conn)).await?
        };
        Ok(result.rows_affected())
    }
}

mod sqlite {
    use super::*;
    use sqlx::Sqlite;
    use sqlx::pool::PoolConnection;

    pub async fn fetch_optional(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Option<Record>> {
        let row = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_optional(sql)).await?
        } else {
            let query = bind::<Sqlite>(sql, params);
            run_with_timeout("query execution", limit, query.fetch_optional(&mut **conn)).await?
        };
        row.as_ref().map(RowToRecord::to_record).transpose()
    }

    pub async fn fetch_all(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<Vec<Record>> {
        let rows = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("query execution", limit, (&mut **conn).fetch_all(sql)).await?
        } else {
            let query = bind::<Sqlite>(sql, params);
            run_with_timeout("query execution", limit, query.fetch_all(&mut **conn)).await?
        };
        rows.iter().map(RowToRecord::to_record).collect()
    }

    pub async fn execute(
        conn: &mut PoolConnection<Sqlite>,
        sql: &str,
        params: &[QueryParam],
        limit: Option<Duration>,
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            run_with_timeout("write operation", limit, (&mut **conn).execute(sql)).await?
        } else {
            let query = bind::<Sqlite>(sql, params);
            run_with_timeout("write operation", limit, query.execute(&mut **conn)).await?
        };
        Ok(result.rows_affected())
    }
}
