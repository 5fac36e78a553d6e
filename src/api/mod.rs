//! HTTP application: route registry and router construction.

pub mod health;

use crate::db::PoolProvider;
use crate::health::HealthCheckService;
use crate::repository::{Repository, RepositorySpec};
use axum::Router;
use axum::routing::{MethodRouter, get};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<PoolProvider>,
    pub health: Arc<dyn HealthCheckService>,
    /// Applied to every repository built from this state
    pub query_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(provider: Arc<PoolProvider>, health: Arc<dyn HealthCheckService>) -> Self {
        Self {
            provider,
            health,
            query_timeout: None,
        }
    }

    pub fn with_query_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Repository over the shared pool, using the configured query timeout.
    pub fn repository<S: RepositorySpec>(&self, spec: S) -> Repository<S> {
        Repository::new(self.provider.clone(), spec).with_timeout(self.query_timeout)
    }
}

/// Every URL the service answers, with its handlers.
pub fn routes() -> Vec<(&'static str, MethodRouter<AppState>)> {
    vec![("/health", get(health::get_health))]
}

/// Build the application router with request tracing.
pub fn router(state: AppState) -> Router {
    routes()
        .into_iter()
        .fold(Router::new(), |router, (path, handler)| {
            router.route(path, handler)
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::error::DbResult;
    use crate::health::ProcessHealthService;
    use crate::models::{Params, Record};
    use crate::query::{Query, delete_from, insert_into, select, update};

    struct Counter;

    impl RepositorySpec for Counter {
        type Instance = i64;
        type Id = i64;

        fn name(&self) -> &str {
            "CounterRepository"
        }

        fn get_by_id_query(&self) -> DbResult<Query> {
            Ok(select("counters").filter_eq("id", "id").into())
        }

        fn insert_query(&self) -> DbResult<Query> {
            Ok(insert_into("counters").values(["id"]).into())
        }

        fn update_query(&self) -> DbResult<Query> {
            Ok(update("counters").set("id", "id").filter_eq("id", "instance_id").into())
        }

        fn delete_all_query(&self) -> DbResult<Query> {
            Ok(delete_from("counters").into())
        }

        fn serialize_id(&self, id: &i64) -> DbResult<Params> {
            Ok(Params::new().with("id", *id))
        }

        fn serialize_instance(&self, instance: &i64) -> DbResult<Params> {
            Ok(Params::new().with("id", *instance))
        }

        fn deserialize_instance(&self, record: &Record) -> DbResult<i64> {
            record.get("id").and_then(|v| v.as_i64()).ok_or_else(|| {
                crate::error::DbError::decode("counter row without an integer id")
            })
        }
    }

    #[test]
    fn test_routes_registry() {
        let paths: Vec<&str> = routes().into_iter().map(|(path, _)| path).collect();
        assert_eq!(paths, vec!["/health"]);
    }

    #[test]
    fn test_repository_inherits_query_timeout() {
        let config = DatabaseConfig::parse("sqlite::memory:").unwrap();
        let provider = Arc::new(PoolProvider::new(config));
        let health = Arc::new(ProcessHealthService::new(None));
        let state = AppState::new(provider, health)
            .with_query_timeout(Some(Duration::from_secs(3)));

        let repo = state.repository(Counter);
        assert_eq!(repo.name(), "CounterRepository");
        assert_eq!(repo.timeout(), Some(Duration::from_secs(3)));
    }
}
