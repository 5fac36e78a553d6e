//! Error types for the service.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver and query-template errors pass through unmodified in meaning; the only
//! error kind the repository layer raises on its own is [`DbError::NotFound`].

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {limit:?}")]
    Timeout { operation: String, limit: Duration },

    #[error("Not found in {repository}: {id}")]
    NotFound { repository: String, id: String },

    #[error("Missing parameter '{parameter}' for query '{query}'")]
    Binding { query: String, parameter: String },

    #[error("Failed to compile query '{query}': {message}")]
    Compilation { query: String, message: String },

    #[error("Malformed command status: '{status}'")]
    MalformedStatus { status: String },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error for an operation bounded by `limit`.
    pub fn timeout(operation: impl Into<String>, limit: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            limit,
        }
    }

    /// Create a not-found error for a repository lookup.
    pub fn not_found(repository: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            repository: repository.into(),
            id: id.into(),
        }
    }

    /// Create a binding error for a parameter the template needs but was not supplied.
    pub fn binding(query: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::Binding {
            query: query.into(),
            parameter: parameter.into(),
        }
    }

    /// Create a query compilation error.
    pub fn compilation(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Compilation {
            query: query.into(),
            message: message.into(),
        }
    }

    /// Create a malformed command status error.
    pub fn malformed_status(status: impl Into<String>) -> Self {
        Self::MalformedStatus {
            status: status.into(),
        }
    }

    /// Create a row decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::Binding { .. } => Some("Supply every parameter the query template references"),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// HTTP status used when this error escapes a request handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Driver errors keep their meaning: database failures stay `Database`,
/// column decoding stays `Decode`, everything transport-related is `Connection`.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::database(
                db_err.message(),
                db_err.code().map(|c| c.to_string()),
                "Check the SQL syntax and referenced objects",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::decode(source.to_string()),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Raise max_connections or acquire_timeout",
            ),
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_) => DbError::connection(
                err.to_string(),
                "Check network connectivity and database server status",
            ),
            other => DbError::internal(format!("Unexpected database error: {}", other)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that reach a handler become JSON error bodies.
impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let Some(suggestion) = self.suggestion() {
            body["suggestion"] = serde_json::Value::String(suggestion.to_string());
        }
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}
