//! Compile [`Query`] values into dialect-bound SQL templates.
//!
//! A [`CompiledQuery`] holds the rendered SQL and the parameter name behind
//! each positional placeholder, in order. Binding a [`Params`] mapping against
//! it yields the positional argument list the driver expects.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Params, QueryParam, StatementKind};
use crate::query::builder::{Assignment, Delete, Filter, Insert, Query, Select, Update};
use crate::query::validate;
use tracing::debug;

/// SQL flavour a template is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
}

impl Dialect {
    /// Placeholder for the 1-based position `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::MySql | Dialect::Sqlite => "?".to_string(),
        }
    }

    /// Quote an identifier, one part per `.`-separated segment.
    pub fn quote_identifier(&self, ident: &str) -> String {
        let quote = match self {
            Dialect::Postgres | Dialect::Sqlite => '"',
            Dialect::MySql => '`',
        };
        ident
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    let escaped = part.replace(quote, &format!("{quote}{quote}"));
                    format!("{quote}{escaped}{quote}")
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl From<DatabaseType> for Dialect {
    fn from(db_type: DatabaseType) -> Self {
        match db_type {
            DatabaseType::PostgreSQL => Dialect::Postgres,
            DatabaseType::MySQL => Dialect::MySql,
            DatabaseType::SQLite => Dialect::Sqlite,
        }
    }
}

/// Dialect-bound SQL plus the parameter name behind each placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    sql: String,
    positions: Vec<String>,
    kind: StatementKind,
    dialect: Dialect,
}

impl CompiledQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in placeholder order. A name used twice appears twice.
    pub fn positions(&self) -> &[String] {
        &self.positions
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Resolve every position against `params`.
    ///
    /// Fails with [`DbError::Binding`] on the first missing name. Extra names in
    /// `params` are ignored.
    pub fn bind(&self, params: &Params) -> DbResult<Vec<QueryParam>> {
        self.positions
            .iter()
            .map(|name| {
                params
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DbError::binding(self.sql.as_str(), name.as_str()))
            })
            .collect()
    }
}

/// Render `query` for `dialect` and validate the result.
pub fn compile(query: &Query, dialect: Dialect) -> DbResult<CompiledQuery> {
    let mut renderer = Renderer::new(dialect);
    match query {
        Query::Select(q) => renderer.select(q)?,
        Query::Insert(q) => renderer.insert(q)?,
        Query::Update(q) => renderer.update(q)?,
        Query::Delete(q) => renderer.delete(q)?,
        Query::Text(template) => renderer.text(template),
    }

    let Renderer { sql, positions, .. } = renderer;
    let kind = validate::classify(&sql, dialect)?;

    debug!(sql = %sql, positions = positions.len(), kind = ?kind, "Compiled query");

    Ok(CompiledQuery {
        sql,
        positions,
        kind,
        dialect,
    })
}

struct Renderer {
    dialect: Dialect,
    sql: String,
    positions: Vec<String>,
}

impl Renderer {
    fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            positions: Vec::new(),
        }
    }

    fn param(&mut self, name: &str) -> String {
        self.positions.push(name.to_string());
        self.dialect.placeholder(self.positions.len())
    }

    fn ident(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn table(&self, verb: &str, table: &str) -> DbResult<String> {
        if table.trim().is_empty() {
            return Err(DbError::compilation(verb, "Statement has no target table"));
        }
        Ok(self.ident(table))
    }

    fn filters(&mut self, filters: &[Filter]) {
        if filters.is_empty() {
            return;
        }
        let clauses: Vec<String> = filters
            .iter()
            .map(|f| {
                let column = self.ident(&f.column);
                let placeholder = self.param(&f.param);
                format!("{} = {}", column, placeholder)
            })
            .collect();
        self.sql.push_str(" WHERE ");
        self.sql.push_str(&clauses.join(" AND "));
    }

    fn assignments(&mut self, assignments: &[Assignment]) -> Vec<(String, String)> {
        assignments
            .iter()
            .map(|a| (self.ident(&a.column), self.param(&a.param)))
            .collect()
    }

    fn select(&mut self, q: &Select) -> DbResult<()> {
        let table = self.table("SELECT", &q.table)?;
        let columns = if q.columns.is_empty() {
            "*".to_string()
        } else {
            q.columns
                .iter()
                .map(|c| self.ident(c))
                .collect::<Vec<_>>()
                .join(", ")
        };
        self.sql = format!("SELECT {} FROM {}", columns, table);
        self.filters(&q.filters);
        if !q.order_by.is_empty() {
            let order: Vec<String> = q.order_by.iter().map(|c| self.ident(c)).collect();
            self.sql.push_str(" ORDER BY ");
            self.sql.push_str(&order.join(", "));
        }
        if let Some(limit) = q.limit {
            self.sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(())
    }

    fn insert(&mut self, q: &Insert) -> DbResult<()> {
        let table = self.table("INSERT", &q.table)?;
        if q.values.is_empty() {
            return Err(DbError::compilation(
                format!("INSERT INTO {}", q.table),
                "INSERT has no columns",
            ));
        }
        let (columns, placeholders): (Vec<String>, Vec<String>) =
            self.assignments(&q.values).into_iter().unzip();
        self.sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok(())
    }

    fn update(&mut self, q: &Update) -> DbResult<()> {
        let table = self.table("UPDATE", &q.table)?;
        if q.assignments.is_empty() {
            return Err(DbError::compilation(
                format!("UPDATE {}", q.table),
                "UPDATE has no SET columns",
            ));
        }
        let sets: Vec<String> = self
            .assignments(&q.assignments)
            .into_iter()
            .map(|(column, placeholder)| format!("{} = {}", column, placeholder))
            .collect();
        self.sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        self.filters(&q.filters);
        Ok(())
    }

    fn delete(&mut self, q: &Delete) -> DbResult<()> {
        let table = self.table("DELETE", &q.table)?;
        self.sql = format!("DELETE FROM {}", table);
        self.filters(&q.filters);
        Ok(())
    }

    /// Replace `:name` placeholders in raw SQL.
    ///
    /// Quoted strings and identifiers, comments, PostgreSQL dollar-quoted
    /// bodies and `::` casts pass through untouched.
    fn text(&mut self, template: &str) {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(c) = rest.chars().next() {
            if let Some(len) = verbatim_len(rest, self.dialect) {
                out.push_str(&rest[..len]);
                rest = &rest[len..];
                continue;
            }
            if let Some(tail) = rest.strip_prefix("::") {
                out.push_str("::");
                rest = tail;
                continue;
            }
            let named = rest
                .strip_prefix(':')
                .filter(|tail| tail.starts_with(|n: char| n.is_ascii_alphabetic() || n == '_'));
            if let Some(tail) = named {
                let len = tail
                    .find(|n: char| !(n.is_ascii_alphanumeric() || n == '_'))
                    .unwrap_or(tail.len());
                out.push_str(&self.param(&tail[..len]));
                rest = &tail[len..];
                continue;
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }

        self.sql = out;
    }
}

/// Length of the quoted span, comment or dollar-quoted body opening `sql`.
/// An unterminated span runs to the end of the input.
fn verbatim_len(sql: &str, dialect: Dialect) -> Option<usize> {
    let until = |open: usize, close: &str| {
        sql[open..]
            .find(close)
            .map_or(sql.len(), |end| open + end + close.len())
    };

    match sql.chars().next()? {
        '\'' | '"' | '`' => Some(until(1, &sql[..1])),
        '-' if sql.starts_with("--") => Some(until(2, "\n")),
        '/' if sql.starts_with("/*") => Some(until(2, "*/")),
        // $$ or $tag$; $1 is a positional parameter, not a tag
        '$' if dialect == Dialect::Postgres
            && !sql[1..].starts_with(|c: char| c.is_ascii_digit()) =>
        {
            let tag_len = sql[1..].find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))? + 2;
            let tag = sql.get(..tag_len).filter(|tag| tag.ends_with('$'))?;
            Some(until(tag_len, tag))
        }
        _ => None,
    }
}
