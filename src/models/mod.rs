//! Data models for the service.
//!
//! This module re-exports all model types used throughout the application.

pub mod command;
pub mod connection;
pub mod query;
pub mod record;

// Re-export commonly used types
pub use command::{CommandStatus, StatementKind, parse_row_count};
pub use connection::{DatabaseType, mask_connection_string};
pub use query::{Params, QueryParam};
pub use record::Record;
