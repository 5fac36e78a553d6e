//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate database-specific
//! implementations while maintaining linear readability. The macros expand
//! at compile time with zero runtime overhead.

/// Macro for generating database dispatch match arms.
///
/// Works for any per-backend enum in [`crate::db::pool`] (`DbPool`,
/// `ScopedConnection`), reducing the need to manually write repetitive match
/// statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(pool, DbPool, {
///     MySql(p) => do_mysql(p),
///     Postgres(p) => do_postgres(p),
///     SQLite(p) => do_sqlite(p),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($value:expr, $kind:ident, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $crate::db::pool::$kind::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
