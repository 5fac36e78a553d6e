//! Connection-related data models.
//!
//! This module defines the supported database backends and helpers for
//! handling connection strings safely.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Backend named by the URL scheme, e.g. `postgres` in `postgres://host/db`.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let (scheme, _) = connection_string.split_once(':')?;
        match scheme.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::PostgreSQL),
            "mysql" | "mariadb" => Some(Self::MySQL),
            "sqlite" => Some(Self::SQLite),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        })
    }
}

/// Replace the password in a connection URL so it can be logged.
///
/// Strings that do not parse as URLs lose everything before the last `@`.
pub fn mask_connection_string(connection_string: &str) -> String {
    match Url::parse(connection_string) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                connection_string.to_string()
            }
        }
        Err(_) => match connection_string.rfind('@') {
            Some(at) => format!("****{}", &connection_string[at..]),
            None => connection_string.to_string(),
        },
    }
}
