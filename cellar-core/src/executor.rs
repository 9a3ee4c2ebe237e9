use crate::{
    Connection, DataSource, Failure, Query, Result, Statement, StatementOptions, bind_all,
    is_unsupported, truncate_long,
};
use futures::TryFutureExt;
use std::future::Future;

/// Work done on a statement right after [`Executor::run`] executed it.
pub trait StatementTask<St: Statement>: Send {
    type Output: Send;

    /// `has_result_set` tells whether the first result is a result set.
    fn run(
        self,
        statement: &mut St,
        has_result_set: bool,
    ) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// Work done on a connection lent by [`Connectable::with_connection`].
pub trait ConnectionTask<C: Connection>: Send {
    type Output: Send;

    fn run(self, connection: &mut C) -> impl Future<Output = Result<Self::Output>> + Send;
}

/// Anything a query can be executed against.
///
/// `run` creates (or reuses) a statement, binds the parameters, executes it and
/// hands the executed statement to `task`. Resources acquired by `run` are
/// released on every exit path.
pub trait Executor: Send {
    type Statement: Statement;

    fn run<W: StatementTask<Self::Statement>>(
        &mut self,
        query: Query,
        options: &StatementOptions,
        task: W,
    ) -> impl Future<Output = Result<W::Output>> + Send;
}

/// Targets that can lend a connection for the duration of a task.
pub trait Connectable: Send {
    type Connection: Connection;

    fn with_connection<W: ConnectionTask<Self::Connection>>(
        &mut self,
        task: W,
    ) -> impl Future<Output = Result<W::Output>> + Send;
}

/// A connection is used as is and left open.
impl<C: Connection> Executor for C {
    type Statement = C::Statement;

    async fn run<W: StatementTask<C::Statement>>(
        &mut self,
        query: Query,
        options: &StatementOptions,
        task: W,
    ) -> Result<W::Output> {
        let mut statement = prepare_statement(self, &query.sql, options).await?;
        bind_all(&mut statement, &query.params)?;
        let has_result_set = statement
            .execute()
            .map_err(|e| e.context(format!("While executing `{}`", truncate_long!(query.sql))))
            .await?;
        task.run(&mut statement, has_result_set).await
    }
}

impl<C: Connection> Connectable for C {
    type Connection = C;

    async fn with_connection<W: ConnectionTask<C>>(&mut self, task: W) -> Result<W::Output> {
        task.run(self).await
    }
}

/// A source of connections: every call gets its own connection, closed before
/// returning.
#[derive(Debug, Clone)]
pub struct Pooled<S>(pub S);

impl<S: DataSource> Connectable for Pooled<S> {
    type Connection = S::Connection;

    async fn with_connection<W: ConnectionTask<S::Connection>>(
        &mut self,
        task: W,
    ) -> Result<W::Output> {
        let mut connection = self.0.connection().await?;
        let result = task.run(&mut connection).await;
        close_after(connection, result).await
    }
}

impl<S: DataSource> Executor for Pooled<S> {
    type Statement = <S::Connection as Connection>::Statement;

    async fn run<W: StatementTask<Self::Statement>>(
        &mut self,
        query: Query,
        options: &StatementOptions,
        task: W,
    ) -> Result<W::Output> {
        let mut connection = self.0.connection().await?;
        let result = connection.run(query, options, task).await;
        close_after(connection, result).await
    }
}

async fn close_after<C: Connection, T>(connection: C, result: Result<T>) -> Result<T> {
    let closed = connection.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(..), Err(e)) => Err(e.context("While closing the connection")),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            log::error!("{:#}", close.context("While closing the connection"));
            Err(e)
        }
    }
}

/// A precompiled statement: every run clears the bindings and binds the new
/// parameters. Queries must carry parameters only (see [`Query::params`]),
/// options were fixed when the statement was prepared.
#[derive(Debug)]
pub struct Prepared<St>(pub St);

impl<St: Statement> Executor for Prepared<St> {
    type Statement = St;

    async fn run<W: StatementTask<St>>(
        &mut self,
        query: Query,
        options: &StatementOptions,
        task: W,
    ) -> Result<W::Output> {
        if !query.sql.is_empty() {
            return Err(Failure::configuration(format!(
                "A prepared statement cannot run new SQL text `{}`",
                truncate_long!(query.sql)
            )));
        }
        if *options != StatementOptions::default() {
            log::debug!("Statement options are ignored by an already prepared statement");
        }
        self.0.clear_bindings()?;
        bind_all(&mut self.0, &query.params)?;
        let has_result_set = self.0.execute().await?;
        task.run(&mut self.0, has_result_set).await
    }
}

/// A statement without SQL, created with
/// [`Connection::create_statement`]. It runs SQL text directly and cannot take
/// parameters.
#[derive(Debug)]
pub struct AdHoc<St>(pub St);

impl<St: Statement> Executor for AdHoc<St> {
    type Statement = St;

    async fn run<W: StatementTask<St>>(
        &mut self,
        query: Query,
        _options: &StatementOptions,
        task: W,
    ) -> Result<W::Output> {
        if !query.params.is_empty() {
            return Err(Failure::misuse(format!(
                "An ad hoc statement cannot take parameters, got {} for `{}`",
                query.params.len(),
                truncate_long!(query.sql)
            )));
        }
        let has_result_set = self
            .0
            .execute_sql(&query.sql)
            .map_err(|e| e.context(format!("While executing `{}`", truncate_long!(query.sql))))
            .await?;
        task.run(&mut self.0, has_result_set).await
    }
}

/// Prepare `sql`, downgrading the generated keys mode while the driver reports
/// it as unsupported: named keys, then generic keys, then none.
pub async fn prepare_statement<C: Connection>(
    connection: &mut C,
    sql: &str,
    options: &StatementOptions,
) -> Result<C::Statement> {
    options.validate()?;
    let mut last_error = None;
    for return_keys in options.return_keys.fallbacks() {
        let attempt = StatementOptions {
            return_keys,
            ..options.clone()
        };
        match connection.prepare(sql, &attempt).await {
            Ok(statement) => return Ok(statement),
            Err(e) if is_unsupported(&e) => {
                log::debug!(
                    "Cannot prepare with generated keys {:?}, trying the next mode: {:#}",
                    attempt.return_keys,
                    e
                );
                last_error = Some(e);
            }
            Err(e) => {
                return Err(e.context(format!("While preparing `{}`", truncate_long!(sql))));
            }
        }
    }
    let error = last_error
        .unwrap_or_else(|| Failure::unsupported("No statement creation mode was attempted"));
    Err(error.context(format!("While preparing `{}`", truncate_long!(sql))))
}
