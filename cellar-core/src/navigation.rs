use crate::{
    Executor, Failure, KeyedRow, Options, Query, QueryResult, RowOf, SetOf, Strategy, Transform,
    Value, column::unqualified, execute, execute_one,
};
use std::{collections::HashMap, fmt, ops::Deref, sync::Arc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// Target of a navigable key: the rows of `table` whose `key` column equals
/// the navigated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub table: String,
    pub key: String,
    pub cardinality: Cardinality,
}

impl Relation {
    pub fn one(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            cardinality: Cardinality::One,
        }
    }

    pub fn many(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
            cardinality: Cardinality::Many,
        }
    }
}

/// How row keys lead to related rows.
///
/// Keys found in the explicit schema use the relation registered for them.
/// Any other key whose label ends in `id` or `_id` (case insensitive, but not
/// `id` alone) references the primary key of the table named by the rest of
/// the label: `fruit.grade_id` and `gradeid` both lead to `grade.id`.
#[derive(Clone)]
pub struct Navigation {
    schema: HashMap<String, Relation>,
    table_fn: Option<Transform>,
    column_fn: Option<Transform>,
    primary_key: String,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            schema: HashMap::new(),
            table_fn: None,
            column_fn: None,
            primary_key: "id".into(),
        }
    }
}

impl Navigation {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn relation(mut self, key: impl Into<String>, relation: Relation) -> Self {
        self.schema.insert(key.into(), relation);
        self
    }

    /// Applied to table names when building the related query.
    pub fn table_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.table_fn = Some(Arc::new(f));
        self
    }

    /// Applied to column names when building the related query.
    pub fn column_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.column_fn = Some(Arc::new(f));
        self
    }

    pub fn primary_key(mut self, primary_key: impl Into<String>) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn resolve(&self, key: &str) -> Option<Relation> {
        self.schema
            .get(key)
            .cloned()
            .or_else(|| self.convention(key))
    }

    fn convention(&self, key: &str) -> Option<Relation> {
        let label = unqualified(key);
        if label.len() <= 2 || !label.to_ascii_lowercase().ends_with("id") {
            return None;
        }
        let stem = &label[..label.len() - 2];
        let table = stem
            .strip_suffix('_')
            .filter(|v| !v.is_empty())
            .unwrap_or(stem);
        Some(Relation::one(table, self.primary_key.clone()))
    }

    /// `SELECT * FROM {table} WHERE {key} = ?` bound to `value`.
    pub fn query(&self, relation: &Relation, value: Value) -> Query {
        let table = match &self.table_fn {
            Some(f) => f(&relation.table),
            None => relation.table.clone(),
        };
        let column = match &self.column_fn {
            Some(f) => f(&relation.key),
            None => relation.key.clone(),
        };
        Query::new(format!("SELECT * FROM {} WHERE {} = ?", table, column)).bind(value)
    }
}

impl fmt::Debug for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigation")
            .field("schema", &self.schema)
            .field("table_fn", &self.table_fn.is_some())
            .field("column_fn", &self.column_fn.is_some())
            .field("primary_key", &self.primary_key)
            .finish()
    }
}

/// Outcome of a navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigated<R, C> {
    /// The key leads nowhere, or the related query failed.
    Value(Value),
    One(Option<R>),
    Many(C),
}

/// Follow `key` from a row whose value at that key is `value`.
///
/// Never fails: when no relation can be resolved or the related query fails,
/// the value comes back unchanged (failures are logged).
pub async fn navigate<X: Executor, S: Strategy>(
    executor: &mut X,
    navigation: &Navigation,
    options: &Options<S>,
    key: &str,
    value: Value,
) -> Navigated<RowOf<S>, SetOf<S>> {
    let Some(relation) = navigation.resolve(key) else {
        return Navigated::Value(value);
    };
    let query = navigation.query(&relation, value.clone());
    let result = match relation.cardinality {
        Cardinality::One => execute_one(executor, query, options)
            .await
            .and_then(|result| match result {
                QueryResult::Rows(row) => Ok(Navigated::One(row)),
                QueryResult::Affected(..) => Err(Failure::misuse(
                    "The related query did not produce a result set",
                )),
            }),
        Cardinality::Many => {
            execute(executor, query, options)
                .await
                .and_then(|result| match result {
                    QueryResult::Rows(rows) => Ok(Navigated::Many(rows)),
                    QueryResult::Affected(..) => Err(Failure::misuse(
                        "The related query did not produce a result set",
                    )),
                })
        }
    };
    result.unwrap_or_else(|e| {
        log::warn!("Could not navigate `{}` to `{}`: {:#}", key, relation.table, e);
        Navigated::Value(value)
    })
}

/// A materialized row that can follow its keys to related rows.
#[derive(Debug, Clone)]
pub struct Navigable<R> {
    row: R,
    navigation: Arc<Navigation>,
}

impl<R> Navigable<R> {
    pub fn new(row: R, navigation: Arc<Navigation>) -> Self {
        Self { row, navigation }
    }

    pub fn row(&self) -> &R {
        &self.row
    }

    pub fn into_row(self) -> R {
        self.row
    }

    pub fn navigation(&self) -> &Arc<Navigation> {
        &self.navigation
    }
}

impl<R: KeyedRow> Navigable<R> {
    /// Navigate from the value this row holds at `key` (NULL when missing).
    pub async fn nav<X: Executor, S: Strategy>(
        &self,
        executor: &mut X,
        key: &str,
        options: &Options<S>,
    ) -> Navigated<RowOf<S>, SetOf<S>> {
        let value = self.row.value(key).cloned().unwrap_or_default();
        navigate(executor, &self.navigation, options, key, value).await
    }
}

impl<R> Deref for Navigable<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.row
    }
}
