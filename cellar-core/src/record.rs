use crate::{AsValue, Error, Result, Value};
use std::sync::Arc;

/// Shared reference-counted list of keys or column names.
pub type RowNames = Arc<[String]>;
/// Owned row values, aligned with a `RowNames`.
pub type Row = Box<[Value]>;

/// Materialized map-like row: unique keys with their values, in column order.
///
/// Immutable: `with` and `without` return a new record. Keys are shared with
/// every other record built from the same result set.
#[derive(Debug, Clone)]
pub struct Record {
    keys: RowNames,
    values: Row,
}

impl Record {
    pub fn new(keys: RowNames, values: Row) -> Self {
        debug_assert_eq!(keys.len(), values.len());
        Self { keys, values }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.values[i])
    }

    /// Convert the value at `key`, fails when the key is missing.
    pub fn get_as<T: AsValue>(&self, key: &str) -> Result<T> {
        let value = self
            .get(key)
            .ok_or_else(|| Error::msg(format!("The row has no key `{}`", key)))?;
        T::try_from_value(value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.keys
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Copy of this record with `key` set to `value`, appended when new.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Record {
        let key = key.into();
        let value = value.into();
        let mut values = self.values.into_vec();
        match self.keys.iter().position(|k| *k == key) {
            Some(i) => {
                values[i] = value;
                Record::new(self.keys, values.into())
            }
            None => {
                let mut keys = self.keys.to_vec();
                keys.push(key);
                values.push(value);
                Record::new(keys.into(), values.into())
            }
        }
    }

    /// Copy of this record without `key`.
    pub fn without(self, key: &str) -> Record {
        let Some(i) = self.position(key) else {
            return self;
        };
        let mut keys = self.keys.to_vec();
        let mut values = self.values.into_vec();
        keys.remove(i);
        values.remove(i);
        Record::new(keys.into(), values.into())
    }
}

/// Structural equality: same keys mapped to the same values, in any order.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|v| v == value))
    }
}

/// Rows that can be read by key, the requirement for navigation.
pub trait KeyedRow {
    fn value(&self, key: &str) -> Option<&Value>;
}

impl KeyedRow for Record {
    fn value(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

/// Materialized result set in array form: the column names, then one value
/// vector per row.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: RowNames,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The leading-header form: the first vector holds the column names.
    pub fn into_vectors(self) -> Vec<Vec<Value>> {
        let mut result = Vec::with_capacity(self.rows.len() + 1);
        result.push(
            self.columns
                .iter()
                .map(|c| Value::Varchar(Some(c.clone())))
                .collect(),
        );
        result.extend(self.rows.into_iter().map(|row| row.into_vec()));
        result
    }
}
