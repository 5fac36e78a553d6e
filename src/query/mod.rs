//! Query building, compilation and caching.
//!
//! - `builder`: the abstract [`Query`] and its builder functions
//! - `compiler`: dialect rendering and parameter binding
//! - `validate`: sqlparser-based statement checks
//! - `cache`: per-repository template cache

pub mod builder;
pub mod cache;
pub mod compiler;
pub mod validate;

pub use builder::{Query, delete_from, insert_into, select, update};
pub use cache::{CacheStats, QueryCache, QueryKey};
pub use compiler::{CompiledQuery, Dialect, compile};
