//! SQL Repository Service Library
//!
//! A web-service scaffold: an HTTP application exposing a health check, and a
//! generic asynchronous repository layer that maps typed domain objects to
//! rows in SQLite, PostgreSQL or MySQL through compiled, cached query templates.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod models;
pub mod query;
pub mod repository;
pub mod server;

pub use config::Config;
pub use error::{DbError, DbResult};
pub use repository::{Operation, Repository, RepositorySpec};
