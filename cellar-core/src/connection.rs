use crate::{Result, Statement, StatementOptions};
use std::{
    fmt::{self, Display},
    future::Future,
};

/// Transaction isolation levels, in increasing strength.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Isolation {
    /// Transactions are not supported.
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Isolation::None => "NONE",
            Isolation::ReadUncommitted => "READ UNCOMMITTED",
            Isolation::ReadCommitted => "READ COMMITTED",
            Isolation::RepeatableRead => "REPEATABLE READ",
            Isolation::Serializable => "SERIALIZABLE",
        })
    }
}

/// A point inside a transaction that can be rolled back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
}

impl Savepoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A live session with the backend, provided by a driver.
///
/// Auto-commit is enabled on a fresh connection. With auto-commit disabled the
/// connection is always inside a transaction: `commit` and `rollback` end the
/// current one and the next statement starts a new one.
pub trait Connection: Send {
    type Statement: Statement;

    /// Prepare `sql`. Options the driver cannot honor are reported as
    /// [`Failure::Unsupported`](crate::Failure::Unsupported).
    fn prepare(
        &mut self,
        sql: &str,
        options: &StatementOptions,
    ) -> impl Future<Output = Result<Self::Statement>> + Send;

    /// Create a statement that receives its SQL at execution time.
    fn create_statement(
        &mut self,
        options: &StatementOptions,
    ) -> impl Future<Output = Result<Self::Statement>> + Send;

    fn auto_commit(&self) -> Result<bool>;
    fn set_auto_commit(&mut self, auto_commit: bool) -> impl Future<Output = Result<()>> + Send;
    fn isolation(&self) -> Result<Isolation>;
    fn set_isolation(&mut self, isolation: Isolation) -> impl Future<Output = Result<()>> + Send;
    fn read_only(&self) -> Result<bool>;
    fn set_read_only(&mut self, read_only: bool) -> impl Future<Output = Result<()>> + Send;

    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(&mut self) -> impl Future<Output = Result<()>> + Send;
    /// Create a savepoint, the driver picks a name when `None`.
    fn savepoint(&mut self, name: Option<&str>) -> impl Future<Output = Result<Savepoint>> + Send;
    fn rollback_to(&mut self, savepoint: &Savepoint) -> impl Future<Output = Result<()>> + Send;
    fn release_savepoint(
        &mut self,
        savepoint: Savepoint,
    ) -> impl Future<Output = Result<()>> + Send;

    fn close(self) -> impl Future<Output = Result<()>> + Send
    where
        Self: Sized;
}

/// Something that hands out connections, usually a pool.
///
/// Every connection obtained through the core is closed by the core.
pub trait DataSource: Send + Sync {
    type Connection: Connection;

    fn connection(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

impl<S: DataSource> DataSource for &S {
    type Connection = S::Connection;

    fn connection(&self) -> impl Future<Output = Result<Self::Connection>> + Send {
        (**self).connection()
    }
}
