//! Process health reporting.

use crate::db::{PoolProvider, PoolSnapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Health report returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Status {
    pub status: &'static str,
    pub version: &'static str,
    /// RFC 3339, UTC
    pub started_at: String,
    pub uptime_secs: u64,
    /// Absent until the pool has been established
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PoolSnapshot>,
}

impl Status {
    /// JSON form of the status, as served.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Source of the current process status.
pub trait HealthCheckService: Send + Sync {
    fn get_status(&self) -> Status;
}

/// Reports version, uptime and pool usage of this process.
#[derive(Debug)]
pub struct ProcessHealthService {
    started_at: DateTime<Utc>,
    provider: Option<Arc<PoolProvider>>,
}

impl ProcessHealthService {
    pub fn new(provider: Option<Arc<PoolProvider>>) -> Self {
        Self {
            started_at: Utc::now(),
            provider,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl HealthCheckService for ProcessHealthService {
    fn get_status(&self) -> Status {
        let uptime = Utc::now().signed_duration_since(self.started_at);
        Status {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            uptime_secs: uptime.num_seconds().max(0) as u64,
            database: self.provider.as_ref().and_then(|p| p.snapshot()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbPool;
    use crate::models::DatabaseType;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_status_without_database() {
        let service = ProcessHealthService::new(None);
        let status = service.get_status();
        assert_eq!(status.status, "ok");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
        assert!(status.database.is_none());
        assert!(DateTime::parse_from_rfc3339(&status.started_at).is_ok());

        let json = status.to_json();
        assert!(json.get("database").is_none());
        assert_eq!(json, serde_json::to_value(&status).unwrap());
    }

    #[tokio::test]
    async fn test_status_reports_pool() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let provider = Arc::new(PoolProvider::from_pool(DbPool::SQLite(pool)));
        let service = ProcessHealthService::new(Some(provider));

        let database = service.get_status().database.unwrap();
        assert_eq!(database.db_type, DatabaseType::SQLite);
        assert!(!database.closed);
    }
}
