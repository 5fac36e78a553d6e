//! Statement validation for compiled templates.
//!
//! Every compiled template is parsed with [sqlparser](https://docs.rs/sqlparser/)
//! under its target dialect before it is cached, so malformed builder output or
//! raw text fails at compile time instead of on the first round trip.

use crate::error::{DbError, DbResult};
use crate::models::StatementKind;
use crate::query::compiler::Dialect;
use sqlparser::ast::Statement;
use sqlparser::dialect::{
    Dialect as SqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;

/// Get the sqlparser dialect for the given target.
fn get_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql => Box::new(MySqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Parse `sql` under `dialect` and classify it.
///
/// Exactly one statement is accepted; anything else is a
/// [`DbError::Compilation`].
pub fn classify(sql: &str, dialect: Dialect) -> DbResult<StatementKind> {
    let parser_dialect = get_dialect(dialect);

    let statements = Parser::parse_sql(parser_dialect.as_ref(), sql)
        .map_err(|e| DbError::compilation(sql, format!("Failed to parse SQL statement: {}", e)))?;

    match statements.as_slice() {
        [stmt] => Ok(statement_kind(stmt)),
        [] => Err(DbError::compilation(sql, "Empty SQL statement")),
        _ => Err(DbError::compilation(
            sql,
            format!("Expected one statement, found {}", statements.len()),
        )),
    }
}

fn statement_kind(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query { .. } => StatementKind::Select,
        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}
