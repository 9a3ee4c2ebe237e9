use crate::{Cursor, Failure, Result, Value};
use std::{future::Future, time::Duration};

/// A statement created by a [`Connection`](crate::Connection), either prepared
/// from SQL text or ad hoc (SQL given at execution time).
///
/// # Result protocol
/// `execute` returns whether the first result is a result set. If it is,
/// `result_set` gives a cursor over it, otherwise `update_count` reports the
/// affected rows. `more_results` moves to the next result the same way and,
/// once no results are left, `update_count` returns `None`.
///
/// # Batches
/// `add_batch` queues the current bindings as one parameter group,
/// `execute_large_batch` runs all the queued groups and returns one count per
/// group, in order.
pub trait Statement: Send {
    type Cursor<'s>: Cursor
    where
        Self: 's;

    /// Remove every bound parameter.
    fn clear_bindings(&mut self) -> Result<()>;
    /// Bind `value` to the parameter at `index`, starting from 1.
    fn bind(&mut self, index: usize, value: Value) -> Result<()>;
    /// Execute the prepared SQL with the current bindings.
    fn execute(&mut self) -> impl Future<Output = Result<bool>> + Send;
    /// Execute `sql` directly, without parameters.
    fn execute_sql(&mut self, sql: &str) -> impl Future<Output = Result<bool>> + Send;
    /// Cursor over the current result set.
    fn result_set(&mut self) -> Result<Self::Cursor<'_>>;
    /// Cursor over the keys generated by the last execution.
    fn generated_keys(&mut self) -> Result<Self::Cursor<'_>>;
    /// Rows affected by the current result, `None` when it is a result set or
    /// when there are no more results.
    fn update_count(&self) -> Option<u64>;
    /// Move to the next result, returns whether it is a result set.
    fn more_results(&mut self) -> impl Future<Output = Result<bool>> + Send;
    fn add_batch(&mut self) -> Result<()>;
    fn execute_large_batch(&mut self) -> impl Future<Output = Result<Vec<i64>>> + Send;
    fn execute_batch(&mut self) -> impl Future<Output = Result<Vec<i32>>> + Send {
        async move {
            self.execute_large_batch()
                .await?
                .into_iter()
                .map(|count| {
                    i32::try_from(count).map_err(|_| {
                        Failure::misuse(format!(
                            "Update count {} does not fit a regular batch, use a large batch",
                            count
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()
        }
    }
}

/// Bind `params` in order, starting from index 1.
pub fn bind_all<S: Statement + ?Sized>(statement: &mut S, params: &[Value]) -> Result<()> {
    for (i, value) in params.iter().enumerate() {
        statement.bind(i + 1, value.clone())?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    ReadOnly,
    Updatable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holdability {
    /// Cursors stay open across commits.
    Hold,
    /// Cursors are closed on commit.
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

/// Which generated keys a statement should make available after an insert.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub enum ReturnKeys {
    #[default]
    No,
    /// Whatever the driver considers the generated keys.
    Generic,
    /// Only the named key columns.
    Named(Vec<String>),
}

impl ReturnKeys {
    pub fn is_requested(&self) -> bool {
        !matches!(self, ReturnKeys::No)
    }

    /// Modes to try in order when the driver reports the previous one as unsupported.
    pub fn fallbacks(&self) -> Vec<ReturnKeys> {
        match self {
            ReturnKeys::Named(names) => vec![
                ReturnKeys::Named(names.clone()),
                ReturnKeys::Generic,
                ReturnKeys::No,
            ],
            ReturnKeys::Generic => vec![ReturnKeys::Generic, ReturnKeys::No],
            ReturnKeys::No => vec![ReturnKeys::No],
        }
    }
}

/// Options applied when a statement is created. Drivers honor what they can
/// and report the rest as [`Failure::Unsupported`].
#[derive(Default, Debug, Clone, PartialEq)]
pub struct StatementOptions {
    pub concurrency: Option<Concurrency>,
    pub holdability: Option<Holdability>,
    pub result_type: Option<ResultType>,
    pub fetch_size: Option<u32>,
    pub max_rows: Option<u64>,
    pub timeout: Option<Duration>,
    pub return_keys: ReturnKeys,
}

impl StatementOptions {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = Some(concurrency);
        self
    }
    pub fn holdability(mut self, holdability: Holdability) -> Self {
        self.holdability = Some(holdability);
        self
    }
    pub fn result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = Some(result_type);
        self
    }
    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.fetch_size = Some(fetch_size);
        self
    }
    pub fn max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = Some(max_rows);
        self
    }
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
    pub fn return_keys(mut self, return_keys: ReturnKeys) -> Self {
        self.return_keys = return_keys;
        self
    }

    /// Reject combinations no driver can honor.
    pub fn validate(&self) -> Result<()> {
        if self.return_keys.is_requested()
            && (self.concurrency.is_some()
                || self.result_type.is_some()
                || self.holdability.is_some())
        {
            return Err(Failure::configuration(
                "Generated keys cannot be combined with concurrency, result type or holdability",
            ));
        }
        if self.concurrency.is_some() != self.result_type.is_some() {
            return Err(Failure::configuration(
                "Concurrency and result type must be specified together",
            ));
        }
        if self.holdability.is_some() && self.concurrency.is_none() {
            return Err(Failure::configuration(
                "Holdability requires both concurrency and result type",
            ));
        }
        Ok(())
    }
}
