//! Abstract statement representation.
//!
//! A [`Query`] is an uncompiled statement that refers to parameters by name.
//! Builders produce one; [`compile`](crate::query::compile) renders it for a
//! concrete dialect.
//!
//! ```
//! use sql_repo_service::query::{Query, select};
//!
//! let query: Query = select("users")
//!     .columns(["id", "name"])
//!     .filter_eq("id", "id")
//!     .limit(1)
//!     .into();
//! assert_eq!(query.table(), Some("users"));
//! ```

/// Equality predicate `column = :param`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: String,
    pub param: String,
}

/// `column = :param` pair used by INSERT and UPDATE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub column: String,
    pub param: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: String,
    /// Empty means every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub table: String,
    pub values: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<Assignment>,
    pub filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub table: String,
    pub filters: Vec<Filter>,
}

/// An uncompiled statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Select(Select),
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    /// Raw SQL with `:name` placeholders.
    Text(String),
}

impl Query {
    /// Raw SQL template. Named placeholders use the `:name` form.
    pub fn text(sql: impl Into<String>) -> Self {
        Query::Text(sql.into())
    }

    /// Target table for builder statements, `None` for text templates.
    pub fn table(&self) -> Option<&str> {
        match self {
            Query::Select(q) => Some(&q.table),
            Query::Insert(q) => Some(&q.table),
            Query::Update(q) => Some(&q.table),
            Query::Delete(q) => Some(&q.table),
            Query::Text(_) => None,
        }
    }
}

pub fn select(table: impl Into<String>) -> Select {
    Select {
        table: table.into(),
        columns: Vec::new(),
        filters: Vec::new(),
        order_by: Vec::new(),
        limit: None,
    }
}

pub fn insert_into(table: impl Into<String>) -> Insert {
    Insert {
        table: table.into(),
        values: Vec::new(),
    }
}

pub fn update(table: impl Into<String>) -> Update {
    Update {
        table: table.into(),
        assignments: Vec::new(),
        filters: Vec::new(),
    }
}

pub fn delete_from(table: impl Into<String>) -> Delete {
    Delete {
        table: table.into(),
        filters: Vec::new(),
    }
}

fn filter(column: impl Into<String>, param: impl Into<String>) -> Filter {
    Filter {
        column: column.into(),
        param: param.into(),
    }
}

fn assignment(column: impl Into<String>, param: impl Into<String>) -> Assignment {
    Assignment {
        column: column.into(),
        param: param.into(),
    }
}

impl Select {
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, param: impl Into<String>) -> Self {
        self.filters.push(filter(column, param));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(column.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Insert {
    pub fn value(mut self, column: impl Into<String>, param: impl Into<String>) -> Self {
        self.values.push(assignment(column, param));
        self
    }

    /// Add columns whose parameter shares the column's name.
    pub fn values<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            self.values.push(assignment(column.clone(), column));
        }
        self
    }
}

impl Update {
    pub fn set(mut self, column: impl Into<String>, param: impl Into<String>) -> Self {
        self.assignments.push(assignment(column, param));
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, param: impl Into<String>) -> Self {
        self.filters.push(filter(column, param));
        self
    }
}

impl Delete {
    pub fn filter_eq(mut self, column: impl Into<String>, param: impl Into<String>) -> Self {
        self.filters.push(filter(column, param));
        self
    }
}

impl From<Select> for Query {
    fn from(q: Select) -> Self {
        Query::Select(q)
    }
}

impl From<Insert> for Query {
    fn from(q: Insert) -> Self {
        Query::Insert(q)
    }
}

impl From<Update> for Query {
    fn from(q: Update) -> Self {
        Query::Update(q)
    }
}

impl From<Delete> for Query {
    fn from(q: Delete) -> Self {
        Query::Delete(q)
    }
}
