use crate::{Connectable, Connection, ConnectionTask, Error, Isolation, Result, RollbackFailure};
use futures::future::BoxFuture;
use std::marker::PhantomData;

/// Overrides applied for the duration of a transaction.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct TransactionOptions {
    pub isolation: Option<Isolation>,
    pub read_only: Option<bool>,
    /// Roll back even when the body succeeds, its value is still returned.
    pub rollback_only: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = Some(isolation);
        self
    }
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
    pub fn rollback_only(mut self, rollback_only: bool) -> Self {
        self.rollback_only = rollback_only;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active,
    Committing,
    RollingBack,
    Finished,
}

/// One transaction on a connection.
///
/// `begin` records the connection settings it is about to change, applies the
/// overrides and disables auto-commit. `run` executes the body, commits or
/// rolls back, then restores the recorded settings. A session cannot be reused.
pub struct Session<'c, C: Connection> {
    connection: &'c mut C,
    rollback_only: bool,
    auto_commit: bool,
    isolation: Option<Isolation>,
    read_only: Option<bool>,
    rollback_failed: bool,
    state: SessionState,
}

impl<'c, C: Connection> Session<'c, C> {
    pub async fn begin(connection: &'c mut C, options: &TransactionOptions) -> Result<Self> {
        let auto_commit = connection.auto_commit()?;
        let mut session = Session {
            connection,
            rollback_only: options.rollback_only,
            auto_commit,
            isolation: None,
            read_only: None,
            rollback_failed: false,
            state: SessionState::Active,
        };
        if let Err(e) = session.apply(options).await {
            session.restore().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn apply(&mut self, options: &TransactionOptions) -> Result<()> {
        if let Some(isolation) = options.isolation {
            let prior = self.connection.isolation()?;
            self.connection.set_isolation(isolation).await?;
            self.isolation = Some(prior);
        }
        if let Some(read_only) = options.read_only {
            let prior = self.connection.read_only()?;
            self.connection.set_read_only(read_only).await?;
            self.read_only = Some(prior);
        }
        self.connection.set_auto_commit(false).await
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run `body` inside the transaction and finish it.
    ///
    /// A failing body (or commit) causes a rollback and its error is returned.
    /// If the rollback fails too, both are reported as a [`RollbackFailure`] and
    /// auto-commit is left disabled. Failures restoring the other settings are
    /// only logged.
    pub async fn run<T, F>(mut self, body: F) -> Result<T>
    where
        F: for<'b> FnOnce(&'b mut C) -> BoxFuture<'b, Result<T>>,
    {
        let result = match body(&mut *self.connection).await {
            Ok(value) if self.rollback_only => {
                self.state = SessionState::RollingBack;
                match self.connection.rollback().await {
                    Ok(()) => Ok(value),
                    Err(e) => {
                        self.rollback_failed = true;
                        Err(e)
                    }
                }
            }
            Ok(value) => {
                self.state = SessionState::Committing;
                match self.connection.commit().await {
                    Ok(()) => Ok(value),
                    Err(e) => self.abort(e.context("While committing")).await,
                }
            }
            Err(e) => self.abort(e).await,
        };
        self.restore().await;
        result
    }

    async fn abort<T>(&mut self, original: Error) -> Result<T> {
        self.state = SessionState::RollingBack;
        match self.connection.rollback().await {
            Ok(()) => Err(original),
            Err(rollback) => {
                self.rollback_failed = true;
                Err(RollbackFailure { original, rollback }.into())
            }
        }
    }

    async fn restore(&mut self) {
        if !self.rollback_failed
            && let Err(e) = self.connection.set_auto_commit(self.auto_commit).await
        {
            log::warn!("Could not restore auto-commit to {}: {:#}", self.auto_commit, e);
        }
        if let Some(isolation) = self.isolation.take()
            && let Err(e) = self.connection.set_isolation(isolation).await
        {
            log::warn!("Could not restore the isolation level {}: {:#}", isolation, e);
        }
        if let Some(read_only) = self.read_only.take()
            && let Err(e) = self.connection.set_read_only(read_only).await
        {
            log::warn!("Could not restore read only to {}: {:#}", read_only, e);
        }
        self.state = SessionState::Finished;
    }
}

/// Run `body` in a transaction on a connection of `target`.
///
/// A connection passed directly stays open, one obtained from a
/// [`Pooled`](crate::Pooled) source is closed afterwards.
pub async fn transact<X, T, F>(target: &mut X, options: &TransactionOptions, body: F) -> Result<T>
where
    X: Connectable,
    T: Send,
    F: for<'b> FnOnce(&'b mut X::Connection) -> BoxFuture<'b, Result<T>> + Send,
{
    let task = Transact {
        options,
        body,
        output: PhantomData,
    };
    target.with_connection(task).await
}

struct Transact<'o, F, T> {
    options: &'o TransactionOptions,
    body: F,
    output: PhantomData<fn() -> T>,
}

impl<C, F, T> ConnectionTask<C> for Transact<'_, F, T>
where
    C: Connection,
    T: Send,
    F: for<'b> FnOnce(&'b mut C) -> BoxFuture<'b, Result<T>> + Send,
{
    type Output = T;

    async fn run(self, connection: &mut C) -> Result<T> {
        Session::begin(connection, self.options)
            .await?
            .run(self.body)
            .await
    }
}

/// Run `body` after setting a savepoint: released on success, rolled back to
/// on failure.
pub async fn with_savepoint<C, T, F>(connection: &mut C, name: Option<&str>, body: F) -> Result<T>
where
    C: Connection,
    T: Send,
    F: for<'b> FnOnce(&'b mut C) -> BoxFuture<'b, Result<T>> + Send,
{
    let savepoint = connection.savepoint(name).await?;
    match body(&mut *connection).await {
        Ok(value) => {
            connection.release_savepoint(savepoint).await?;
            Ok(value)
        }
        Err(original) => match connection.rollback_to(&savepoint).await {
            Ok(()) => {
                if let Err(e) = connection.release_savepoint(savepoint).await {
                    log::warn!("Could not release the savepoint: {:#}", e);
                }
                Err(original)
            }
            Err(rollback) => Err(RollbackFailure { original, rollback }.into()),
        },
    }
}
