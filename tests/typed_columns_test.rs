//! Instances with nullable, timestamp and uuid fields on every backend.
//!
//! PostgreSQL and MySQL run only when `TEST_POSTGRES_URL` or
//! `TEST_MYSQL_URL` point at a scratch database.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sql_repo_service::config::DatabaseConfig;
use sql_repo_service::db::PoolProvider;
use sql_repo_service::models::{Params, Record};
use sql_repo_service::query::{Query, delete_from, insert_into, select, update};
use sql_repo_service::{DbResult, Repository, RepositorySpec};
use std::sync::Arc;
use tempfile::NamedTempFile;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Event {
    id: i64,
    attendees: Option<i64>,
    at: DateTime<Utc>,
    uid: Uuid,
}

struct EventSpec;

impl RepositorySpec for EventSpec {
    type Instance = Event;
    type Id = i64;

    fn name(&self) -> &str {
        "EventRepository"
    }

    fn get_by_id_query(&self) -> DbResult<Query> {
        Ok(select("typed_events")
            .columns(["id", "attendees", "at", "uid"])
            .filter_eq("id", "id")
            .into())
    }

    fn insert_query(&self) -> DbResult<Query> {
        Ok(insert_into("typed_events")
            .values(["id", "attendees", "at", "uid"])
            .into())
    }

    fn update_query(&self) -> DbResult<Query> {
        Ok(update("typed_events")
            .set("attendees", "attendees")
            .set("at", "at")
            .set("uid", "uid")
            .filter_eq("id", "instance_id")
            .into())
    }

    fn delete_all_query(&self) -> DbResult<Query> {
        Ok(delete_from("typed_events").into())
    }

    fn serialize_id(&self, id: &i64) -> DbResult<Params> {
        Ok(Params::new().with("id", *id))
    }

    fn serialize_instance(&self, event: &Event) -> DbResult<Params> {
        Ok(Params::from_serialize(event)?
            .with("at", event.at)
            .with("uid", event.uid))
    }

    fn deserialize_instance(&self, record: &Record) -> DbResult<Event> {
        record.decode()
    }
}

async fn repository(url: &str, ddl: &'static str) -> (Arc<PoolProvider>, Repository<EventSpec>) {
    let config = DatabaseConfig::parse(url).unwrap();
    let provider = Arc::new(PoolProvider::new(config));
    let repo = Repository::new(provider.clone(), EventSpec);

    repo.execute_status(
        "drop_table",
        || Ok(Query::text("DROP TABLE IF EXISTS typed_events")),
        &Params::new(),
    )
    .await
    .unwrap();
    repo.execute_status("create_table", || Ok(Query::text(ddl)), &Params::new())
        .await
        .unwrap();

    (provider, repo)
}

/// Insert, read back, update and read back again.
async fn assert_round_trip(repo: &Repository<EventSpec>) {
    let event = Event {
        id: 1,
        attendees: None,
        at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
        uid: Uuid::from_u128(0x5a17_0000_0000_0000_0000_0000_0000_0001),
    };
    assert_eq!(repo.insert(&event).await.unwrap(), 1);
    assert_eq!(repo.get_by_id(&1).await.unwrap(), Some(event.clone()));

    let moved = Event {
        attendees: Some(40),
        at: Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap(),
        ..event.clone()
    };
    assert_eq!(repo.update(&moved).await.unwrap(), 1);
    assert_eq!(repo.get_or_raise_by_id(&1).await.unwrap(), moved);

    let cleared = Event {
        attendees: None,
        ..moved
    };
    assert_eq!(repo.update(&cleared).await.unwrap(), 1);
    assert_eq!(repo.get_by_id(&1).await.unwrap(), Some(cleared));
}

async fn drop_table(repo: &Repository<EventSpec>) {
    repo.execute_status(
        "drop_table",
        || Ok(Query::text("DROP TABLE typed_events")),
        &Params::new(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_sqlite_typed_round_trip() {
    let temp_file = NamedTempFile::new().unwrap();
    let url = format!("sqlite:{}", temp_file.path().display());
    let (provider, repo) = repository(
        &url,
        "CREATE TABLE typed_events (id INTEGER PRIMARY KEY, attendees INTEGER, at TEXT NOT NULL, uid TEXT NOT NULL)",
    )
    .await;

    assert_round_trip(&repo).await;

    provider.close().await;
}

#[tokio::test]
async fn test_postgres_typed_round_trip() {
    let url = match std::env::var("TEST_POSTGRES_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_POSTGRES_URL not set");
            return;
        }
    };
    let (provider, repo) = repository(
        &url,
        "CREATE TABLE typed_events (id BIGINT PRIMARY KEY, attendees BIGINT NULL, at TIMESTAMPTZ NOT NULL, uid UUID NOT NULL)",
    )
    .await;

    assert_round_trip(&repo).await;

    // Untyped NULL in a raw template takes the column's type
    let status = repo
        .execute_status(
            "clear_attendees",
            || Ok(Query::text("UPDATE typed_events SET attendees = :n WHERE uid = :uid")),
            &Params::new()
                .with("n", None::<i64>)
                .with("uid", Uuid::from_u128(0x5a17_0000_0000_0000_0000_0000_0000_0001)),
        )
        .await
        .unwrap();
    assert_eq!(status.row_count().unwrap(), 1);

    drop_table(&repo).await;
    provider.close().await;
}

#[tokio::test]
async fn test_mysql_typed_round_trip() {
    let url = match std::env::var("TEST_MYSQL_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: TEST_MYSQL_URL not set");
            return;
        }
    };
    let (provider, repo) = repository(
        &url,
        "CREATE TABLE typed_events (id BIGINT PRIMARY KEY, attendees BIGINT NULL, at TIMESTAMP NOT NULL, uid CHAR(36) NOT NULL)",
    )
    .await;

    assert_round_trip(&repo).await;

    drop_table(&repo).await;
    provider.close().await;
}
