//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Database dispatch macros for reducing code duplication
//! - Lazy, shared connection pool management
//! - Query execution with optional timeouts
//! - Row to [`Record`](crate::models::Record) type mappings

#[macro_use]
pub mod macros;
pub mod executor;
pub mod params;
pub mod pool;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{DbPool, PoolProvider, PoolSnapshot, ScopedConnection};
pub use types::RowToRecord;
