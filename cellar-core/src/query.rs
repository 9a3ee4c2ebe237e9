use crate::{Value, truncate_long};
use std::fmt::{self, Display};

/// SQL text with its positional parameters.
///
/// A query without SQL text (see [`Query::params`]) only carries parameters and
/// is meant for an already prepared statement.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Parameters only, to rebind a prepared statement.
    pub fn params(params: Vec<Value>) -> Self {
        Self {
            sql: String::new(),
            params,
        }
    }

    /// Append a parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::new(value)
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::new(value)
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for Query {
    fn from((sql, params): (S, Vec<Value>)) -> Self {
        Query::with_params(sql, params)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncate_long!(self.sql))?;
        if !self.params.is_empty() {
            f.write_str(" [")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", param)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

/// What a statement produced: rows, or the number of rows it modified.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    Rows(T),
    Affected(u64),
}

impl<T> QueryResult<T> {
    pub fn rows(self) -> Option<T> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Affected(..) => None,
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryResult::Rows(..) => None,
            QueryResult::Affected(count) => Some(*count),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryResult<U> {
        match self {
            QueryResult::Rows(rows) => QueryResult::Rows(f(rows)),
            QueryResult::Affected(count) => QueryResult::Affected(count),
        }
    }
}

impl<R> QueryResult<Option<R>> {
    /// The row, if the statement produced at least one.
    pub fn row(self) -> Option<R> {
        self.rows().flatten()
    }
}
