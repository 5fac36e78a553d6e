//! Generic asynchronous repository over the shared pool.
//!
//! A concrete repository implements [`RepositorySpec`] to describe its table:
//! the query builders for each operation and how instances map to and from
//! parameters and rows. [`Repository`] supplies the operations themselves,
//! compiling each builder once per repository and caching the template under a
//! stable [`QueryKey`].
//!
//! ```ignore
//! let users = Repository::new(provider.clone(), UserSpec).with_timeout(Some(Duration::from_secs(5)));
//! users.insert(&user).await?;
//! let found = users.get_or_raise_by_id(&user.id).await?;
//! ```

use crate::db::{PoolProvider, QueryExecutor};
use crate::error::{DbError, DbResult};
use crate::models::{CommandStatus, Params, QueryParam, Record};
use crate::query::{CompiledQuery, Dialect, Query, QueryCache, QueryKey, compile};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Built-in repository operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetById,
    Insert,
    Update,
    DeleteAll,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetById => "get_by_id",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::DeleteAll => "delete_all",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Table-specific behavior of a repository.
///
/// Instances are usually plain serde types, in which case
/// [`Params::from_serialize`] and [`Record::decode`] cover the mapping.
pub trait RepositorySpec: Send + Sync + 'static {
    type Instance: Send + Sync;
    type Id: fmt::Display + Send + Sync;

    /// Name reported in [`DbError::NotFound`].
    fn name(&self) -> &str;

    /// Select one row, filtered by the parameters from [`serialize_id`](Self::serialize_id).
    fn get_by_id_query(&self) -> DbResult<Query>;

    fn insert_query(&self) -> DbResult<Query>;

    /// Update one row. The instance's `id` is also bound as `instance_id`.
    fn update_query(&self) -> DbResult<Query>;

    fn delete_all_query(&self) -> DbResult<Query>;

    fn serialize_id(&self, id: &Self::Id) -> DbResult<Params>;

    fn serialize_instance(&self, instance: &Self::Instance) -> DbResult<Params>;

    fn deserialize_instance(&self, record: &Record) -> DbResult<Self::Instance>;

    /// Cache key for a built-in operation.
    ///
    /// Keys must be unique per query shape within a repository: the cache
    /// serves whatever template was stored first under a key, with no check
    /// that a later builder would produce the same SQL.
    fn query_key(&self, operation: Operation) -> QueryKey {
        QueryKey::from_static(operation.name())
    }
}

/// A compiled template together with its positional arguments.
#[derive(Debug, Clone)]
pub struct BoundQuery {
    pub compiled: Arc<CompiledQuery>,
    pub args: Vec<QueryParam>,
}

impl BoundQuery {
    pub fn sql(&self) -> &str {
        self.compiled.sql()
    }
}

/// CRUD operations for one [`RepositorySpec`].
pub struct Repository<S: RepositorySpec> {
    provider: Arc<PoolProvider>,
    spec: S,
    cache: QueryCache,
    executor: QueryExecutor,
}

impl<S: RepositorySpec> Repository<S> {
    pub fn new(provider: Arc<PoolProvider>, spec: S) -> Self {
        Self {
            provider,
            spec,
            cache: QueryCache::new(),
            executor: QueryExecutor::default(),
        }
    }

    /// Apply a time limit to every call. `None` removes it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = QueryExecutor::new(timeout);
        self
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn spec(&self) -> &S {
        &self.spec
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.executor.default_timeout()
    }

    /// Resolve the template for `key` and bind `params` against it.
    ///
    /// With `cache` set, a stored template is reused and `builder` only runs on
    /// the first call for `key`. Without it, `builder` runs every time and the
    /// result is not stored.
    pub fn compile_and_bind<F>(
        &self,
        key: &QueryKey,
        builder: F,
        params: &Params,
        cache: bool,
    ) -> DbResult<BoundQuery>
    where
        F: FnOnce() -> DbResult<Query>,
    {
        let cached = if cache { self.cache.get(key) } else { None };

        let compiled = match cached {
            Some(compiled) => {
                debug!(repository = %self.name(), key = %key, "Query cache hit");
                compiled
            }
            None => {
                let dialect = self.dialect()?;
                let query = builder()?;
                let compiled = compile(&query, dialect)?;
                if cache {
                    debug!(repository = %self.name(), key = %key, "Caching compiled query");
                    self.cache.insert(key.clone(), compiled)
                } else {
                    Arc::new(compiled)
                }
            }
        };

        let args = compiled.bind(params).map_err(|e| match e {
            DbError::Binding { parameter, .. } => DbError::binding(key.as_str(), parameter),
            other => other,
        })?;

        Ok(BoundQuery { compiled, args })
    }

    pub async fn get_by_id(&self, id: &S::Id) -> DbResult<Option<S::Instance>> {
        let params = self.spec.serialize_id(id)?;
        let key = self.spec.query_key(Operation::GetById);
        let bound = self.compile_and_bind(&key, || self.spec.get_by_id_query(), &params, true)?;

        match self.fetch_optional(&bound).await? {
            Some(record) => self.spec.deserialize_instance(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`get_by_id`](Self::get_by_id), but a missing row is [`DbError::NotFound`].
    pub async fn get_or_raise_by_id(&self, id: &S::Id) -> DbResult<S::Instance> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found(self.name(), id.to_string()))
    }

    /// Insert one instance and return the reported row count.
    pub async fn insert(&self, instance: &S::Instance) -> DbResult<u64> {
        let params = self.spec.serialize_instance(instance)?;
        let key = self.spec.query_key(Operation::Insert);
        let status = self
            .execute_status(key, || self.spec.insert_query(), &params)
            .await?;
        status.row_count()
    }

    /// Update one instance and return the reported row count.
    pub async fn update(&self, instance: &S::Instance) -> DbResult<u64> {
        let mut params = self.spec.serialize_instance(instance)?;
        if let Some(id) = params.get("id").cloned() {
            params.insert("instance_id", id);
        }
        let key = self.spec.query_key(Operation::Update);
        let status = self
            .execute_status(key, || self.spec.update_query(), &params)
            .await?;
        status.row_count()
    }

    /// Delete every row and return the reported row count.
    pub async fn delete_all(&self) -> DbResult<u64> {
        let key = self.spec.query_key(Operation::DeleteAll);
        let status = self
            .execute_status(key, || self.spec.delete_all_query(), &Params::new())
            .await?;
        status.row_count()
    }

    /// Run a cached, repository-specific query and map every row.
    pub async fn fetch_all<F>(
        &self,
        key: impl Into<QueryKey>,
        builder: F,
        params: &Params,
    ) -> DbResult<Vec<S::Instance>>
    where
        F: FnOnce() -> DbResult<Query>,
    {
        let key: QueryKey = key.into();
        let bound = self.compile_and_bind(&key, builder, params, true)?;

        let pool = self.provider.get_pool().await?;
        let mut conn = pool.acquire().await?;
        let records = self
            .executor
            .fetch_all(&mut conn, bound.sql(), &bound.args)
            .await?;
        drop(conn);

        records
            .iter()
            .map(|record| self.spec.deserialize_instance(record))
            .collect()
    }

    /// Run a cached write and return the unparsed command status.
    pub async fn execute_status<F>(
        &self,
        key: impl Into<QueryKey>,
        builder: F,
        params: &Params,
    ) -> DbResult<CommandStatus>
    where
        F: FnOnce() -> DbResult<Query>,
    {
        let key: QueryKey = key.into();
        let bound = self.compile_and_bind(&key, builder, params, true)?;

        let pool = self.provider.get_pool().await?;
        let mut conn = pool.acquire().await?;
        self.executor
            .execute(&mut conn, bound.sql(), &bound.args, bound.compiled.kind())
            .await
    }

    async fn fetch_optional(&self, bound: &BoundQuery) -> DbResult<Option<Record>> {
        let pool = self.provider.get_pool().await?;
        let mut conn = pool.acquire().await?;
        self.executor
            .fetch_optional(&mut conn, bound.sql(), &bound.args)
            .await
    }

    fn dialect(&self) -> DbResult<Dialect> {
        self.provider
            .db_type()
            .map(Dialect::from)
            .ok_or_else(|| DbError::internal("Pool provider has no database type"))
    }
}

impl<S: RepositorySpec> fmt::Debug for Repository<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name())
            .field("cached_queries", &self.cache.len())
            .field("timeout", &self.timeout())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbPool;
    use crate::query::{delete_from, insert_into, select, update};
    use serde::{Deserialize, Serialize};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: i64,
        body: String,
    }

    #[derive(Default)]
    struct NoteSpec {
        get_by_id_builds: AtomicUsize,
    }

    impl RepositorySpec for NoteSpec {
        type Instance = Note;
        type Id = i64;

        fn name(&self) -> &str {
            "NoteRepository"
        }

        fn get_by_id_query(&self) -> DbResult<Query> {
            self.get_by_id_builds.fetch_add(1, Ordering::SeqCst);
            Ok(select("notes").filter_eq("id", "id").into())
        }

        fn insert_query(&self) -> DbResult<Query> {
            Ok(insert_into("notes").values(["id", "body"]).into())
        }

        fn update_query(&self) -> DbResult<Query> {
            Ok(update("notes")
                .set("body", "body")
                .filter_eq("id", "instance_id")
                .into())
        }

        fn delete_all_query(&self) -> DbResult<Query> {
            Ok(delete_from("notes").into())
        }

        fn serialize_id(&self, id: &i64) -> DbResult<Params> {
            Ok(Params::new().with("id", *id))
        }

        fn serialize_instance(&self, instance: &Note) -> DbResult<Params> {
            Params::from_serialize(instance)
        }

        fn deserialize_instance(&self, record: &Record) -> DbResult<Note> {
            record.decode()
        }
    }

    async fn repository() -> Repository<NoteSpec> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let provider = Arc::new(PoolProvider::from_pool(DbPool::SQLite(pool)));
        Repository::new(provider, NoteSpec::default())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let repo = repository().await;
        let note = Note {
            id: 1,
            body: "hello".to_string(),
        };
        assert_eq!(repo.insert(&note).await.unwrap(), 1);
        assert_eq!(repo.get_by_id(&1).await.unwrap(), Some(note));
        assert_eq!(repo.get_by_id(&2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cached_builder_runs_once() {
        let repo = repository().await;
        for _ in 0..3 {
            repo.get_by_id(&1).await.unwrap();
        }
        assert_eq!(repo.spec().get_by_id_builds.load(Ordering::SeqCst), 1);
        assert!(repo.cache().contains(&QueryKey::from("get_by_id")));
    }

    #[tokio::test]
    async fn test_binding_error_names_operation() {
        let repo = repository().await;
        let key = QueryKey::from("by_body");
        let err = repo
            .compile_and_bind(
                &key,
                || Ok(select("notes").filter_eq("body", "body").into()),
                &Params::new(),
                false,
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing parameter 'body' for query 'by_body'"
        );
        assert!(repo.cache().is_empty());
    }

    #[test]
    fn test_operation_names() {
        assert_eq!(Operation::GetById.name(), "get_by_id");
        assert_eq!(Operation::DeleteAll.to_string(), "delete_all");
    }
}
