//! Execution status models.
//!
//! Write operations report their outcome as a PostgreSQL-style command tag
//! (`"UPDATE 3"`, `"INSERT 0 5"`, `"DELETE 12"`). `sqlx` only exposes an
//! affected-row count, so the executor builds the tag from the statement kind
//! and that count; callers then parse the count back out of the tag.

use crate::error::{DbError, DbResult};
use serde::Serialize;

/// Kind of SQL statement, as classified by the statement validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Anything else (DDL, utility statements, ...)
    Other,
}

impl StatementKind {
    /// Command tag verb for this statement kind.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Other => "EXECUTE",
        }
    }
}

/// Textual status returned by an executed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandStatus(String);

impl CommandStatus {
    /// Wrap a raw status string.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Build a command tag from a statement kind and an affected-row count.
    ///
    /// INSERT tags carry a leading OID field (always 0), matching PostgreSQL.
    pub fn from_rows_affected(kind: StatementKind, rows_affected: u64) -> Self {
        match kind {
            StatementKind::Insert => Self(format!("INSERT 0 {}", rows_affected)),
            other => Self(format!("{} {}", other.verb(), rows_affected)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Affected-row count: the integer after the final space.
    pub fn row_count(&self) -> DbResult<u64> {
        parse_row_count(&self.0)
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse the affected-row count out of a command tag such as `"UPDATE 3"`.
pub fn parse_row_count(status: &str) -> DbResult<u64> {
    let last = status.rsplit(' ').next().unwrap_or_default();
    last.parse::<u64>()
        .map_err(|_| DbError::malformed_status(status))
}
