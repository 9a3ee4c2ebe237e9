use crate::{AsMaps, ReturnKeys, StatementOptions};
use std::time::Duration;

/// Per call options: how the statement is created and how its rows come out.
#[derive(Default, Debug, Clone)]
pub struct Options<S = AsMaps> {
    pub statement: StatementOptions,
    pub strategy: S,
}

impl Options {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<S> Options<S> {
    pub fn strategy<T>(self, strategy: T) -> Options<T> {
        Options {
            statement: self.statement,
            strategy,
        }
    }
    pub fn statement(mut self, statement: StatementOptions) -> Self {
        self.statement = statement;
        self
    }
    pub fn return_keys(mut self, return_keys: ReturnKeys) -> Self {
        self.statement.return_keys = return_keys;
        self
    }
    pub fn max_rows(mut self, max_rows: u64) -> Self {
        self.statement.max_rows = Some(max_rows);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.statement.timeout = Some(timeout);
        self
    }
}
