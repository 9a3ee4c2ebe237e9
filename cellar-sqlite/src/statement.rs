use crate::{
    CBox, Handle, sqlite_error,
    extract::{bind_value, extract_columns, extract_value},
};
use cellar_core::{
    ColumnMeta, ColumnSource, Columns, Context, Cursor, Error, Failure, Result, RowsCursor,
    Statement, StatementOptions, Value, truncate_long,
};
use libsqlite3_sys::*;
use std::{
    ffi::{CString, c_char, c_int},
    ptr,
};

/// Prepare the first statement in `sql`, skipping the empty ones. Returns the
/// statement (`None` when `sql` has nothing to run) and the SQL left after it.
pub(crate) fn prepare_raw(
    connection: *mut sqlite3,
    sql: &str,
) -> Result<(Option<CBox<*mut sqlite3_stmt>>, String)> {
    let mut rest = sql;
    loop {
        if rest.trim().is_empty() {
            return Ok((None, String::new()));
        }
        let sql = CString::new(rest).context("Could not create a CString from the query")?;
        let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_finalize(p);
        });
        let mut tail: *const c_char = ptr::null();
        let rc = unsafe {
            sqlite3_prepare_v2(connection, sql.as_ptr(), -1, &mut *statement, &mut tail)
        };
        if rc != SQLITE_OK {
            let error = sqlite_error(connection)
                .context(format!("While preparing `{}`", truncate_long!(rest)));
            log::error!("{:#}", error);
            return Err(error);
        }
        let consumed = if tail.is_null() {
            rest.len()
        } else {
            unsafe { tail.offset_from(sql.as_ptr()) as usize }
        };
        let next = &rest[consumed..];
        if statement.is_null() {
            rest = next;
            continue;
        }
        return Ok((Some(statement), next.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Result set not started yet.
    Ready,
    /// Positioned on a row.
    Row,
    /// Nothing left to read.
    Done,
}

/// Statement over a SQLite connection.
///
/// Text containing multiple statements runs one at a time: `execute` runs the
/// first, `more_results` prepares and runs the next. Every run records one
/// generated key: the `last_insert_rowid()` of the row it inserted, or NULL
/// when it inserted nothing.
pub struct SqliteStatement {
    connection: Handle<sqlite3>,
    sql: String,
    statement: Option<CBox<*mut sqlite3_stmt>>,
    tail: String,
    advanced: bool,
    columns: Columns,
    has_rows: bool,
    step: Step,
    bindings: Vec<Value>,
    batch: Vec<Vec<Value>>,
    return_keys: bool,
    generated: Vec<Option<i64>>,
    update_count: Option<u64>,
    max_rows: Option<u64>,
    fetched: u64,
}

impl SqliteStatement {
    pub(crate) fn new(
        connection: *mut sqlite3,
        sql: String,
        statement: Option<CBox<*mut sqlite3_stmt>>,
        tail: String,
        options: &StatementOptions,
    ) -> Self {
        Self {
            connection: Handle::new(connection),
            sql,
            statement,
            tail,
            advanced: false,
            columns: Vec::new().into(),
            has_rows: false,
            step: Step::Done,
            bindings: Vec::new(),
            batch: Vec::new(),
            return_keys: options.return_keys.is_requested(),
            generated: Vec::new(),
            update_count: None,
            max_rows: options.max_rows.filter(|max| *max > 0),
            fetched: 0,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn error(&self) -> Error {
        let error = sqlite_error(self.connection.get())
            .context(format!("While executing `{}`", truncate_long!(self.sql)));
        log::error!("{:#}", error);
        error
    }

    fn current(&self) -> Result<*mut sqlite3_stmt> {
        self.statement
            .as_ref()
            .map(|statement| **statement)
            .ok_or_else(|| Failure::misuse("The statement has no SQL to execute"))
    }

    /// Go back to the first statement after `more_results` moved past it.
    fn rewind(&mut self) -> Result<()> {
        if self.advanced {
            let (statement, tail) = prepare_raw(self.connection.get(), &self.sql)?;
            self.statement = statement;
            self.tail = tail;
            self.advanced = false;
        }
        Ok(())
    }

    fn finish(&mut self) {
        self.columns = Vec::new().into();
        self.has_rows = false;
        self.update_count = None;
        self.step = Step::Done;
    }

    /// Start the current statement. Result sets are stepped lazily by the
    /// cursor, anything else runs to completion here.
    fn start(&mut self) -> Result<bool> {
        let Some(statement) = self.statement.as_ref().map(|statement| **statement) else {
            self.finish();
            return Ok(false);
        };
        self.fetched = 0;
        if unsafe { sqlite3_column_count(statement) } > 0 {
            self.columns = extract_columns(self.connection.get(), statement)?;
            self.has_rows = true;
            self.update_count = None;
            self.step = Step::Ready;
            return Ok(true);
        }
        let count = self.run_to_completion(statement)?;
        self.finish();
        self.update_count = Some(count);
        Ok(false)
    }

    /// Step a statement without a result set until it is done. Returns the rows
    /// it changed directly, not counting the ones changed by triggers.
    fn run_to_completion(&mut self, statement: *mut sqlite3_stmt) -> Result<u64> {
        let connection = self.connection.get();
        unsafe {
            let total = sqlite3_total_changes64(connection);
            let rowid = sqlite3_last_insert_rowid(connection);
            sqlite3_set_last_insert_rowid(connection, 0);
            loop {
                match sqlite3_step(statement) {
                    SQLITE_DONE => break,
                    SQLITE_ROW => continue,
                    _ => {
                        let error = self.error();
                        sqlite3_reset(statement);
                        sqlite3_set_last_insert_rowid(connection, rowid);
                        return Err(error);
                    }
                }
            }
            // sqlite3_changes64 still holds an earlier statement's count when
            // this one changed nothing.
            let changes = if sqlite3_total_changes64(connection) == total {
                0
            } else {
                sqlite3_changes64(connection).max(0) as u64
            };
            sqlite3_reset(statement);
            let last = sqlite3_last_insert_rowid(connection);
            let key = if changes > 0 && last != 0 {
                Some(last)
            } else {
                sqlite3_set_last_insert_rowid(connection, rowid);
                None
            };
            if self.return_keys {
                self.generated.push(key);
            }
            Ok(changes)
        }
    }

    fn bind_current(&self, statement: *mut sqlite3_stmt, values: &[Value]) -> Result<()> {
        unsafe {
            sqlite3_reset(statement);
            sqlite3_clear_bindings(statement);
        }
        for (i, value) in values.iter().enumerate() {
            bind_value(statement, i as c_int + 1, value)?;
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        if !matches!(self.step, Step::Ready | Step::Row) {
            return Ok(false);
        }
        if self.max_rows.is_some_and(|max| self.fetched >= max) {
            self.step = Step::Done;
            return Ok(false);
        }
        let statement = self.current()?;
        match unsafe { sqlite3_step(statement) } {
            SQLITE_ROW => {
                self.fetched += 1;
                self.step = Step::Row;
                Ok(true)
            }
            SQLITE_DONE => {
                self.step = Step::Done;
                Ok(false)
            }
            _ => {
                self.step = Step::Done;
                Err(self.error())
            }
        }
    }

    fn column(&self, index: usize) -> Result<Value> {
        if self.step != Step::Row {
            return Err(Failure::misuse("The cursor is not positioned on a row"));
        }
        if index == 0 || index > self.columns.len() {
            return Err(Failure::misuse(format!(
                "Column index {} is out of range, the row has {} columns",
                index,
                self.columns.len()
            )));
        }
        extract_value(self.current()?, index as c_int - 1)
    }
}

impl Statement for SqliteStatement {
    type Cursor<'s> = SqliteCursor<'s>;

    fn clear_bindings(&mut self) -> Result<()> {
        self.bindings.clear();
        Ok(())
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        if index == 0 {
            return Err(Failure::misuse("Parameter indexes start from 1"));
        }
        if self.bindings.len() < index {
            self.bindings.resize(index, Value::Null);
        }
        self.bindings[index - 1] = value;
        Ok(())
    }

    async fn execute(&mut self) -> Result<bool> {
        self.rewind()?;
        let statement = self.current()?;
        self.generated.clear();
        self.bind_current(statement, &self.bindings)?;
        self.start()
    }

    async fn execute_sql(&mut self, sql: &str) -> Result<bool> {
        let (statement, tail) = prepare_raw(self.connection.get(), sql)?;
        self.sql = sql.to_string();
        self.statement = statement;
        self.tail = tail;
        self.advanced = false;
        self.generated.clear();
        self.start()
    }

    fn result_set(&mut self) -> Result<SqliteCursor<'_>> {
        if !self.has_rows {
            return Err(Failure::misuse("The current result is not a result set"));
        }
        Ok(SqliteCursor::Rows(self))
    }

    fn generated_keys(&mut self) -> Result<SqliteCursor<'_>> {
        if !self.return_keys {
            return Err(Failure::misuse(
                "Generated keys were not requested when the statement was created",
            ));
        }
        Ok(SqliteCursor::Keys(RowsCursor::new(
            vec![ColumnMeta::new("last_insert_rowid()")],
            self.generated.iter().map(|key| vec![Value::Int64(*key)]),
        )))
    }

    fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    async fn more_results(&mut self) -> Result<bool> {
        if let Some(statement) = &self.statement {
            unsafe {
                sqlite3_reset(**statement);
            }
        }
        let tail = std::mem::take(&mut self.tail);
        let (statement, tail) = prepare_raw(self.connection.get(), &tail)?;
        self.statement = statement;
        self.tail = tail;
        self.advanced = true;
        self.start()
    }

    fn add_batch(&mut self) -> Result<()> {
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    async fn execute_large_batch(&mut self) -> Result<Vec<i64>> {
        let groups = std::mem::take(&mut self.batch);
        self.rewind()?;
        let statement = self.current()?;
        if unsafe { sqlite3_column_count(statement) } > 0 {
            return Err(Failure::misuse("A batched statement cannot return rows"));
        }
        self.generated.clear();
        let mut counts = Vec::with_capacity(groups.len());
        for group in &groups {
            self.bind_current(statement, group)?;
            counts.push(self.run_to_completion(statement)? as i64);
        }
        self.finish();
        Ok(counts)
    }
}

/// Cursor handed out by [`SqliteStatement`]: either the rows of the current
/// result, stepped on the statement itself, or the generated keys.
pub enum SqliteCursor<'s> {
    Rows(&'s mut SqliteStatement),
    Keys(RowsCursor),
}

impl ColumnSource for SqliteCursor<'_> {
    fn columns(&self) -> &[ColumnMeta] {
        match self {
            SqliteCursor::Rows(statement) => &statement.columns,
            SqliteCursor::Keys(keys) => keys.columns(),
        }
    }

    fn column(&self, index: usize) -> Result<Value> {
        match self {
            SqliteCursor::Rows(statement) => statement.column(index),
            SqliteCursor::Keys(keys) => keys.column(index),
        }
    }
}

impl Cursor for SqliteCursor<'_> {
    async fn advance(&mut self) -> Result<bool> {
        match self {
            SqliteCursor::Rows(statement) => statement.advance(),
            SqliteCursor::Keys(keys) => keys.advance().await,
        }
    }
}
