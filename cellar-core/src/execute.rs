use crate::{
    ColumnSource, Cursor, Executor, Options, Query, QueryResult, Result, RowAdapter, RowOf, SetOf,
    Statement, StatementTask, Strategy, build_first, build_set,
};
use std::ops::ControlFlow;

/// Execute `query` and materialize every row with the strategy of `options`.
///
/// When the statement produces no result set but generated keys were
/// requested, the generated keys are returned as rows.
pub async fn execute<X: Executor, S: Strategy>(
    executor: &mut X,
    query: impl Into<Query>,
    options: &Options<S>,
) -> Result<QueryResult<SetOf<S>>> {
    let task = AllRows {
        strategy: &options.strategy,
        return_keys: options.statement.return_keys.is_requested(),
    };
    executor.run(query.into(), &options.statement, task).await
}

/// Execute `query` and materialize its first row only.
pub async fn execute_one<X: Executor, S: Strategy>(
    executor: &mut X,
    query: impl Into<Query>,
    options: &Options<S>,
) -> Result<QueryResult<Option<RowOf<S>>>> {
    let task = FirstRow {
        strategy: &options.strategy,
        return_keys: options.statement.return_keys.is_requested(),
    };
    executor.run(query.into(), &options.statement, task).await
}

/// Execute a query producing several results, one entry per result in the
/// order the driver returns them.
pub async fn execute_multi<X: Executor, S: Strategy>(
    executor: &mut X,
    query: impl Into<Query>,
    options: &Options<S>,
) -> Result<Vec<QueryResult<SetOf<S>>>> {
    let task = EveryResult {
        strategy: &options.strategy,
    };
    executor.run(query.into(), &options.statement, task).await
}

struct AllRows<'o, S> {
    strategy: &'o S,
    return_keys: bool,
}

impl<St: Statement, S: Strategy> StatementTask<St> for AllRows<'_, S> {
    type Output = QueryResult<SetOf<S>>;

    async fn run(self, statement: &mut St, has_result_set: bool) -> Result<Self::Output> {
        if has_result_set {
            let mut cursor = statement.result_set()?;
            let builder = self.strategy.builder(cursor.columns())?;
            return build_set(&builder, &mut cursor).await.map(QueryResult::Rows);
        }
        if self.return_keys {
            match statement.generated_keys() {
                Ok(mut cursor) => {
                    let builder = self.strategy.builder(cursor.columns())?;
                    return build_set(&builder, &mut cursor).await.map(QueryResult::Rows);
                }
                Err(e) => log::debug!("No generated keys available: {:#}", e),
            }
        }
        Ok(QueryResult::Affected(statement.update_count().unwrap_or(0)))
    }
}

struct FirstRow<'o, S> {
    strategy: &'o S,
    return_keys: bool,
}

impl<St: Statement, S: Strategy> StatementTask<St> for FirstRow<'_, S> {
    type Output = QueryResult<Option<RowOf<S>>>;

    async fn run(self, statement: &mut St, has_result_set: bool) -> Result<Self::Output> {
        if has_result_set {
            let mut cursor = statement.result_set()?;
            let builder = self.strategy.builder(cursor.columns())?;
            return build_first(&builder, &mut cursor).await.map(QueryResult::Rows);
        }
        if self.return_keys {
            match statement.generated_keys() {
                Ok(mut cursor) => {
                    let builder = self.strategy.builder(cursor.columns())?;
                    return build_first(&builder, &mut cursor)
                        .await
                        .map(QueryResult::Rows);
                }
                Err(e) => log::debug!("No generated keys available: {:#}", e),
            }
        }
        Ok(QueryResult::Affected(statement.update_count().unwrap_or(0)))
    }
}

struct EveryResult<'o, S> {
    strategy: &'o S,
}

impl<St: Statement, S: Strategy> StatementTask<St> for EveryResult<'_, S> {
    type Output = Vec<QueryResult<SetOf<S>>>;

    async fn run(self, statement: &mut St, has_result_set: bool) -> Result<Self::Output> {
        let mut results = Vec::new();
        let mut has_result_set = has_result_set;
        loop {
            if has_result_set {
                let mut cursor = statement.result_set()?;
                let builder = self.strategy.builder(cursor.columns())?;
                results.push(QueryResult::Rows(build_set(&builder, &mut cursor).await?));
            } else {
                match statement.update_count() {
                    Some(count) => results.push(QueryResult::Affected(count)),
                    None => break,
                }
            }
            has_result_set = statement.more_results().await?;
        }
        Ok(results)
    }
}

/// A query waiting to be reduced over its rows.
///
/// Nothing runs until it is consumed, and it is consumed by value: a plan runs
/// at most once. Rows are handed out as [`RowAdapter`]s bound to the cursor,
/// so they cost nothing until read.
#[must_use = "a plan does nothing until it is reduced"]
pub struct Plan<'x, X, S> {
    executor: &'x mut X,
    query: Query,
    options: &'x Options<S>,
}

pub fn plan<'x, X: Executor, S: Strategy>(
    executor: &'x mut X,
    query: impl Into<Query>,
    options: &'x Options<S>,
) -> Plan<'x, X, S> {
    Plan {
        executor,
        query: query.into(),
        options,
    }
}

impl<X: Executor, S: Strategy> Plan<'_, X, S> {
    /// Fold the rows into `init`. Returning `ControlFlow::Break` stops right
    /// away: no further row is read. A statement without a result set reduces
    /// to `init`.
    pub async fn reduce<A: Send>(
        self,
        init: A,
        mut f: impl FnMut(A, &mut RowAdapter<'_, S::Builder>) -> Result<ControlFlow<A, A>> + Send,
    ) -> Result<A> {
        self.drive(init, move |acc, mut row| f(acc, &mut row)).await
    }

    pub async fn for_each(
        self,
        mut f: impl FnMut(&mut RowAdapter<'_, S::Builder>) -> Result<()> + Send,
    ) -> Result<()> {
        self.reduce((), move |(), row| f(row).map(ControlFlow::Continue))
            .await
    }

    /// Materialize every row.
    pub async fn collect(self) -> Result<Vec<RowOf<S>>> {
        self.drive(Vec::new(), |mut rows, row| {
            rows.push(row.into_row()?);
            Ok(ControlFlow::Continue(rows))
        })
        .await
    }

    async fn drive<A: Send>(
        self,
        init: A,
        f: impl FnMut(A, RowAdapter<'_, S::Builder>) -> Result<ControlFlow<A, A>> + Send,
    ) -> Result<A> {
        let Plan {
            executor,
            query,
            options,
        } = self;
        let task = Fold {
            strategy: &options.strategy,
            init,
            f,
        };
        executor.run(query, &options.statement, task).await
    }
}

struct Fold<'o, S, A, F> {
    strategy: &'o S,
    init: A,
    f: F,
}

impl<St, S, A, F> StatementTask<St> for Fold<'_, S, A, F>
where
    St: Statement,
    S: Strategy,
    A: Send,
    F: FnMut(A, RowAdapter<'_, S::Builder>) -> Result<ControlFlow<A, A>> + Send,
{
    type Output = A;

    async fn run(self, statement: &mut St, has_result_set: bool) -> Result<A> {
        let Fold {
            strategy,
            init,
            mut f,
        } = self;
        if !has_result_set {
            return Ok(init);
        }
        let mut cursor = statement.result_set()?;
        let builder = strategy.builder(cursor.columns())?;
        let mut acc = init;
        while cursor.advance().await? {
            match f(acc, RowAdapter::bound(&builder, &cursor))? {
                ControlFlow::Continue(next) => acc = next,
                ControlFlow::Break(done) => return Ok(done),
            }
        }
        Ok(acc)
    }
}
