use crate::{ColumnMeta, Columns, Failure, Result, Value};
use std::{collections::VecDeque, future::Future};

/// Read access to the row a cursor is positioned on.
///
/// Object safe so that row builders and row adapters can work with any driver
/// cursor without being generic over it.
pub trait ColumnSource {
    /// Metadata of the result set, identical for every row.
    fn columns(&self) -> &[ColumnMeta];
    /// Value of the column at `index`, starting from 1.
    fn column(&self, index: usize) -> Result<Value>;
    /// Position (from 1) of the first column with the given label.
    fn column_index(&self, label: &str) -> Option<usize> {
        self.columns()
            .iter()
            .position(|c| c.label == label)
            .map(|i| i + 1)
    }
    fn column_by_label(&self, label: &str) -> Result<Option<Value>> {
        match self.column_index(label) {
            Some(index) => self.column(index).map(Some),
            None => Ok(None),
        }
    }
}

/// Forward only sequence of rows produced by a statement.
///
/// A fresh cursor is positioned before the first row: `advance` must be called
/// before reading any column. Once `advance` returned `false` the cursor is
/// exhausted and stays so.
pub trait Cursor: ColumnSource + Send {
    fn advance(&mut self) -> impl Future<Output = Result<bool>> + Send;
}

/// Cursor over rows already in memory.
///
/// Drivers return it for generated keys, tests use it in place of a backend.
#[derive(Debug, Clone)]
pub struct RowsCursor {
    columns: Columns,
    rows: VecDeque<Vec<Value>>,
    current: Option<Vec<Value>>,
}

impl RowsCursor {
    pub fn new(columns: impl Into<Columns>, rows: impl IntoIterator<Item = Vec<Value>>) -> Self {
        Self {
            columns: columns.into(),
            rows: rows.into_iter().collect(),
            current: None,
        }
    }

    /// Rows not yet reached by `advance`.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn step(&mut self) -> bool {
        self.current = self.rows.pop_front();
        self.current.is_some()
    }
}

impl ColumnSource for RowsCursor {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn column(&self, index: usize) -> Result<Value> {
        let Some(row) = &self.current else {
            return Err(Failure::misuse("The cursor is not positioned on a row"));
        };
        if index == 0 || index > row.len() {
            return Err(Failure::misuse(format!(
                "Column index {} is out of range, the row has {} columns",
                index,
                row.len()
            )));
        }
        Ok(row[index - 1].clone())
    }
}

impl Cursor for RowsCursor {
    async fn advance(&mut self) -> Result<bool> {
        Ok(self.step())
    }
}
