use crate::{
    ColumnSource, Connectable, Connection, ConnectionTask, Cursor, Failure, Result, ReturnKeys,
    RowOf, Statement, StatementOptions, Strategy, Value, bind_all, build_row, prepare_statement,
};

#[derive(Default, Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Parameter groups executed per round trip, all of them when `None`.
    pub chunk_size: Option<usize>,
    /// Report counts as `i64`.
    pub large: bool,
    /// Return the generated keys instead of the counts.
    pub return_keys: bool,
}

impl BatchOptions {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
    pub fn large(mut self, large: bool) -> Self {
        self.large = large;
        self
    }
    pub fn return_keys(mut self, return_keys: bool) -> Self {
        self.return_keys = return_keys;
        self
    }

    fn chunk_len(&self, groups: &[Vec<Value>]) -> Result<usize> {
        if groups.is_empty() {
            return Err(Failure::configuration(
                "A batch requires at least one parameter group",
            ));
        }
        match self.chunk_size {
            Some(0) => Err(Failure::configuration(
                "The batch chunk size must be a positive number",
            )),
            Some(size) => Ok(size),
            None => Ok(groups.len()),
        }
    }
}

/// One entry per parameter group, in input order.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchResult<R> {
    Counts(Vec<i32>),
    LargeCounts(Vec<i64>),
    Keys(Vec<R>),
}

impl<R> BatchResult<R> {
    pub fn len(&self) -> usize {
        match self {
            BatchResult::Counts(v) => v.len(),
            BatchResult::LargeCounts(v) => v.len(),
            BatchResult::Keys(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Execute `statement` once per parameter group, `chunk_size` groups per batch.
///
/// Generated keys are read right after each chunk and materialized with
/// `strategy`.
pub async fn execute_batch<St: Statement, S: Strategy>(
    statement: &mut St,
    groups: &[Vec<Value>],
    options: &BatchOptions,
    strategy: &S,
) -> Result<BatchResult<RowOf<S>>> {
    let chunk_len = options.chunk_len(groups)?;
    let mut counts = Vec::new();
    let mut large_counts = Vec::new();
    let mut keys = Vec::new();
    for chunk in groups.chunks(chunk_len) {
        for group in chunk {
            statement.clear_bindings()?;
            bind_all(statement, group)?;
            statement.add_batch()?;
        }
        if options.large {
            large_counts.extend(statement.execute_large_batch().await?);
        } else {
            counts.extend(statement.execute_batch().await?);
        }
        if options.return_keys {
            let mut cursor = statement.generated_keys()?;
            let builder = strategy.builder(cursor.columns())?;
            while cursor.advance().await? {
                keys.push(build_row(&builder, &cursor)?);
            }
        }
        log::debug!("Executed a batch chunk of {} groups", chunk.len());
    }
    Ok(if options.return_keys {
        BatchResult::Keys(keys)
    } else if options.large {
        BatchResult::LargeCounts(large_counts)
    } else {
        BatchResult::Counts(counts)
    })
}

/// Prepare `sql` on a connection of `target` and run [`execute_batch`] on it.
pub async fn execute_batch_with<X: Connectable, S: Strategy>(
    target: &mut X,
    sql: &str,
    groups: &[Vec<Value>],
    options: &BatchOptions,
    strategy: &S,
) -> Result<BatchResult<RowOf<S>>> {
    options.chunk_len(groups)?;
    let statement_options = StatementOptions::new().return_keys(if options.return_keys {
        ReturnKeys::Generic
    } else {
        ReturnKeys::No
    });
    let task = Batch {
        sql,
        groups,
        options,
        strategy,
        statement: statement_options,
    };
    target.with_connection(task).await
}

struct Batch<'a, S> {
    sql: &'a str,
    groups: &'a [Vec<Value>],
    options: &'a BatchOptions,
    strategy: &'a S,
    statement: StatementOptions,
}

impl<C: Connection, S: Strategy> ConnectionTask<C> for Batch<'_, S> {
    type Output = BatchResult<RowOf<S>>;

    async fn run(self, connection: &mut C) -> Result<Self::Output> {
        let mut statement = prepare_statement(connection, self.sql, &self.statement).await?;
        execute_batch(&mut statement, self.groups, self.options, self.strategy).await
    }
}
