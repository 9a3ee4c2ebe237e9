#![allow(dead_code)]
//! Scripted in-memory driver: every SQL text is mapped to a canned response and
//! every call the core makes is recorded as an event.

use cellar_core::{
    ColumnMeta, ColumnSource, Columns, Connection, Cursor, DataSource, Error, Failure, Isolation,
    Query, Result, ReturnKeys, RowsCursor, Savepoint, Statement, StatementOptions, Value,
};
use log::LevelFilter;
use std::{
    collections::{HashMap, VecDeque},
    env,
    sync::{Arc, Mutex, MutexGuard},
};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

#[derive(Debug, Clone)]
pub enum Response {
    Rows(Columns, Vec<Vec<Value>>),
    Count(u64),
    Fail(String),
    /// Several results for one execution, in order.
    Results(Vec<Response>),
}

impl Response {
    pub fn rows(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> Self {
        Response::Rows(columns.into(), rows)
    }
}

#[derive(Debug)]
pub struct State {
    pub responses: HashMap<String, Response>,
    pub events: Vec<String>,
    pub column_reads: usize,
    pub unsupported_named_keys: bool,
    pub unsupported_generic_keys: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub fail_set_isolation: bool,
    pub fail_restore_read_only: bool,
    pub fail_close: bool,
    pub auto_commit: bool,
    pub isolation: Isolation,
    pub read_only: bool,
    pub next_key: i64,
    pub opened: usize,
    pub closed: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            responses: HashMap::new(),
            events: Vec::new(),
            column_reads: 0,
            unsupported_named_keys: false,
            unsupported_generic_keys: false,
            fail_commit: false,
            fail_rollback: false,
            fail_set_isolation: false,
            fail_restore_read_only: false,
            fail_close: false,
            auto_commit: true,
            isolation: Isolation::ReadCommitted,
            read_only: false,
            next_key: 1,
            opened: 0,
            closed: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MockDb(Arc<Mutex<State>>);

impl MockDb {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn respond(&self, sql: &str, response: Response) -> &Self {
        self.state().responses.insert(sql.into(), response);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap()
    }

    fn record(&self, event: impl Into<String>) {
        self.state().events.push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        let mut state = self.state();
        state.events.clear();
        state.column_reads = 0;
    }

    pub fn column_reads(&self) -> usize {
        self.state().column_reads
    }

    pub fn connect(&self) -> MockConnection {
        self.state().opened += 1;
        MockConnection { db: self.clone() }
    }
}

impl DataSource for MockDb {
    type Connection = MockConnection;

    async fn connection(&self) -> Result<MockConnection> {
        Ok(self.connect())
    }
}

pub fn fruit_columns() -> Vec<ColumnMeta> {
    ["id", "name", "appearance", "cost", "grade"]
        .into_iter()
        .map(|c| ColumnMeta::new(c).table("FRUIT"))
        .collect()
}

/// The four fruits.
pub fn fruit() -> Response {
    Response::rows(
        fruit_columns(),
        vec![
            vec![
                Value::Int32(Some(1)),
                "Apple".into(),
                "red".into(),
                Value::Int32(Some(59)),
                Value::Float64(None),
            ],
            vec![
                Value::Int32(Some(2)),
                "Banana".into(),
                "yellow".into(),
                Value::Int32(None),
                Value::Float64(Some(92.2)),
            ],
            vec![
                Value::Int32(Some(3)),
                "Peach".into(),
                Value::Varchar(None),
                Value::Int32(Some(139)),
                Value::Float64(Some(90.0)),
            ],
            vec![
                Value::Int32(Some(4)),
                "Orange".into(),
                "juicy".into(),
                Value::Int32(Some(89)),
                Value::Float64(Some(88.6)),
            ],
        ],
    )
}

#[derive(Debug)]
pub struct MockConnection {
    db: MockDb,
}

impl MockConnection {
    pub fn db(&self) -> &MockDb {
        &self.db
    }
}

impl Connection for MockConnection {
    type Statement = MockStatement;

    async fn prepare(&mut self, sql: &str, options: &StatementOptions) -> Result<MockStatement> {
        self.db
            .record(format!("prepare {} {:?}", sql, options.return_keys));
        {
            let state = self.db.state();
            match options.return_keys {
                ReturnKeys::Named(..) if state.unsupported_named_keys => {
                    return Err(Failure::unsupported("named keys"));
                }
                ReturnKeys::Generic if state.unsupported_generic_keys => {
                    return Err(Failure::unsupported("generated keys"));
                }
                _ => {}
            }
        }
        Ok(MockStatement::new(
            self.db.clone(),
            Some(sql.into()),
            options.return_keys.is_requested(),
        ))
    }

    async fn create_statement(&mut self, options: &StatementOptions) -> Result<MockStatement> {
        self.db.record("create statement");
        Ok(MockStatement::new(
            self.db.clone(),
            None,
            options.return_keys.is_requested(),
        ))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.db.state().auto_commit)
    }

    async fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.db.record(format!("auto_commit {}", auto_commit));
        self.db.state().auto_commit = auto_commit;
        Ok(())
    }

    fn isolation(&self) -> Result<Isolation> {
        Ok(self.db.state().isolation)
    }

    async fn set_isolation(&mut self, isolation: Isolation) -> Result<()> {
        self.db.record(format!("isolation {}", isolation));
        let mut state = self.db.state();
        if state.fail_set_isolation {
            return Err(Error::msg("isolation level not available"));
        }
        state.isolation = isolation;
        Ok(())
    }

    fn read_only(&self) -> Result<bool> {
        Ok(self.db.state().read_only)
    }

    async fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.db.record(format!("read_only {}", read_only));
        let mut state = self.db.state();
        if state.fail_restore_read_only && !read_only {
            return Err(Error::msg("read only flag is stuck"));
        }
        state.read_only = read_only;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.db.record("commit");
        if self.db.state().fail_commit {
            return Err(Error::msg("deferred constraint violated"));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.db.record("rollback");
        if self.db.state().fail_rollback {
            return Err(Error::msg("connection lost"));
        }
        Ok(())
    }

    async fn savepoint(&mut self, name: Option<&str>) -> Result<Savepoint> {
        let name = name.unwrap_or("sp1");
        self.db.record(format!("savepoint {}", name));
        Ok(Savepoint::new(name))
    }

    async fn rollback_to(&mut self, savepoint: &Savepoint) -> Result<()> {
        self.db.record(format!("rollback to {}", savepoint.name()));
        if self.db.state().fail_rollback {
            return Err(Error::msg("connection lost"));
        }
        Ok(())
    }

    async fn release_savepoint(&mut self, savepoint: Savepoint) -> Result<()> {
        self.db.record(format!("release {}", savepoint.name()));
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.db.record("close");
        let mut state = self.db.state();
        state.closed += 1;
        if state.fail_close {
            return Err(Error::msg("socket already closed"));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockStatement {
    db: MockDb,
    sql: Option<String>,
    return_keys: bool,
    bindings: Vec<Value>,
    batch: Vec<Vec<Value>>,
    pending: VecDeque<Response>,
    rows: Option<RowsCursor>,
    keys: Vec<Vec<Value>>,
    keys_cursor: Option<RowsCursor>,
    update_count: Option<u64>,
}

impl MockStatement {
    fn new(db: MockDb, sql: Option<String>, return_keys: bool) -> Self {
        Self {
            db,
            sql,
            return_keys,
            bindings: Vec::new(),
            batch: Vec::new(),
            pending: VecDeque::new(),
            rows: None,
            keys: Vec::new(),
            keys_cursor: None,
            update_count: None,
        }
    }

    fn generate_keys(&mut self, count: u64) {
        let mut state = self.db.state();
        for _ in 0..count {
            self.keys.push(vec![Value::Int64(Some(state.next_key))]);
            state.next_key += 1;
        }
    }

    fn load(&mut self, sql: &str) -> Result<bool> {
        let response = self
            .db
            .state()
            .responses
            .get(sql)
            .cloned()
            .ok_or_else(|| Error::msg(format!("no such table in `{}`", sql)))?;
        self.keys.clear();
        self.pending = match response {
            Response::Results(results) => results.into(),
            response => [response].into(),
        };
        self.next_result()
    }

    fn next_result(&mut self) -> Result<bool> {
        self.rows = None;
        self.update_count = None;
        match self.pending.pop_front() {
            Some(Response::Rows(columns, rows)) => {
                self.rows = Some(RowsCursor::new(columns, rows));
                Ok(true)
            }
            Some(Response::Count(count)) => {
                if self.return_keys {
                    self.generate_keys(count);
                }
                self.update_count = Some(count);
                Ok(false)
            }
            Some(Response::Fail(message)) => Err(Error::msg(message)),
            Some(Response::Results(..)) => Err(Failure::misuse("nested results")),
            None => Ok(false),
        }
    }
}

impl Statement for MockStatement {
    type Cursor<'s> = MockCursor<'s>;

    fn clear_bindings(&mut self) -> Result<()> {
        self.bindings.clear();
        Ok(())
    }

    fn bind(&mut self, index: usize, value: Value) -> Result<()> {
        if index == 0 {
            return Err(Failure::misuse("parameters start from 1"));
        }
        if self.bindings.len() < index {
            self.bindings.resize(index, Value::Null);
        }
        self.bindings[index - 1] = value;
        Ok(())
    }

    async fn execute(&mut self) -> Result<bool> {
        let Some(sql) = self.sql.clone() else {
            return Err(Failure::misuse("no SQL to execute"));
        };
        self.db.record(format!(
            "execute {}",
            Query::with_params(sql.clone(), self.bindings.clone())
        ));
        self.load(&sql)
    }

    async fn execute_sql(&mut self, sql: &str) -> Result<bool> {
        self.db.record(format!("execute {}", sql));
        self.load(sql)
    }

    fn result_set(&mut self) -> Result<MockCursor<'_>> {
        match self.rows.as_mut() {
            Some(rows) => Ok(MockCursor { rows, db: &self.db }),
            None => Err(Failure::misuse("the current result is not a result set")),
        }
    }

    fn generated_keys(&mut self) -> Result<MockCursor<'_>> {
        if !self.return_keys {
            return Err(Failure::misuse("generated keys were not requested"));
        }
        self.db.record("generated keys");
        let rows = self.keys_cursor.insert(RowsCursor::new(
            vec![ColumnMeta::new("GENERATED_KEY")],
            self.keys.clone(),
        ));
        Ok(MockCursor { rows, db: &self.db })
    }

    fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    async fn more_results(&mut self) -> Result<bool> {
        self.next_result()
    }

    fn add_batch(&mut self) -> Result<()> {
        self.batch.push(self.bindings.clone());
        Ok(())
    }

    async fn execute_large_batch(&mut self) -> Result<Vec<i64>> {
        let groups = std::mem::take(&mut self.batch);
        self.db.record(format!("batch {}", groups.len()));
        let sql = self.sql.clone().unwrap_or_default();
        let response = self.db.state().responses.get(&sql).cloned();
        let count = match response {
            Some(Response::Count(count)) => count,
            Some(Response::Fail(message)) => return Err(Error::msg(message)),
            _ => 1,
        };
        self.keys.clear();
        if self.return_keys {
            self.generate_keys(groups.len() as u64 * count);
        }
        Ok(vec![count as i64; groups.len()])
    }
}

pub struct MockCursor<'s> {
    rows: &'s mut RowsCursor,
    db: &'s MockDb,
}

impl ColumnSource for MockCursor<'_> {
    fn columns(&self) -> &[ColumnMeta] {
        self.rows.columns()
    }

    fn column(&self, index: usize) -> Result<Value> {
        self.db.state().column_reads += 1;
        self.rows.column(index)
    }
}

impl Cursor for MockCursor<'_> {
    async fn advance(&mut self) -> Result<bool> {
        self.rows.advance().await
    }
}
