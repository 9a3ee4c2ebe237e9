use crate::count;
use cellar::{
    AsUnqualifiedMaps, Connection, DataSource, Error, Isolation, Options, Pooled, Result,
    TransactionOptions, execute, future::FutureExt, params, transact,
};
#[cfg(not(feature = "disable-savepoints"))]
use cellar::with_savepoint;
use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn record<C: Connection>(connection: &mut C, entry: &str) -> Result<()> {
    execute(
        connection,
        ("INSERT INTO ledger (entry) VALUES (?)", params![entry]),
        &Options::new(),
    )
    .await?;
    Ok(())
}

async fn entries<C: Connection>(connection: &mut C) -> Vec<String> {
    execute(
        connection,
        "SELECT entry FROM ledger ORDER BY id",
        &Options::new().strategy(AsUnqualifiedMaps),
    )
    .await
    .expect("Could not read the ledger")
    .rows()
    .expect("The query returns rows")
    .into_iter()
    .map(|row| row.get_as::<String>("entry").expect("Entries are text"))
    .collect()
}

pub async fn transaction<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    let mut pool = Pooled(source);
    for sql in [
        "DROP TABLE IF EXISTS ledger",
        indoc! {"
            CREATE TABLE ledger (
                id INTEGER PRIMARY KEY,
                entry VARCHAR(32)
            )
        "},
    ] {
        execute(&mut pool, sql, &Options::new())
            .await
            .expect("Could not set up the ledger table");
    }

    // Committed
    let value = transact(
        &mut pool,
        &TransactionOptions::new().isolation(Isolation::Serializable),
        |connection| {
            async move {
                record(&mut *connection, "kept").await?;
                Ok(count(&mut *connection, "ledger").await)
            }
            .boxed()
        },
    )
    .await
    .expect("Could not run the transaction");
    assert_eq!(value, 1);
    assert_eq!(count(&mut pool, "ledger").await, 1);

    // Rollback only: the value is delivered, the rows are gone
    let value = transact(
        &mut pool,
        &TransactionOptions::new().rollback_only(true),
        |connection| {
            async move {
                record(&mut *connection, "discarded").await?;
                Ok(count(&mut *connection, "ledger").await)
            }
            .boxed()
        },
    )
    .await
    .expect("Could not run the rollback only transaction");
    assert_eq!(value, 2);
    assert_eq!(count(&mut pool, "ledger").await, 1);

    // A failing body rolls back
    let result: Result<()>;
    crate::silent_logs! {
        result = transact(
            &mut pool,
            &TransactionOptions::new(),
            |connection| {
                async move {
                    record(&mut *connection, "lost").await?;
                    record(&mut *connection, "also lost").await?;
                    Err(Error::msg("the body gave up"))
                }
                .boxed()
            },
        )
        .await;
    }
    let error = result.expect_err("The body failed");
    assert!(error.to_string().contains("the body gave up"), "{:#}", error);
    assert_eq!(count(&mut pool, "ledger").await, 1);

    // Settings are restored on a connection that outlives the transaction
    let mut connection = source
        .connection()
        .await
        .expect("Could not get a connection");
    transact(
        &mut connection,
        &TransactionOptions::new(),
        |connection| {
            async move {
                assert!(!connection.auto_commit()?);
                record(&mut *connection, "second").await
            }
            .boxed()
        },
    )
    .await
    .expect("Could not run the transaction on the connection");
    assert!(connection.auto_commit().expect("Could not read auto-commit"));

    #[cfg(not(feature = "disable-read-only"))]
    {
        let result: Result<()>;
        crate::silent_logs! {
            result = transact(
                &mut connection,
                &TransactionOptions::new().read_only(true),
                |connection| record(connection, "forbidden").boxed(),
            )
            .await;
        }
        assert!(result.is_err());
        assert!(!connection.read_only().expect("Could not read read-only"));
        record(&mut connection, "writable again")
            .await
            .expect("The connection is writable after the transaction");
    }

    #[cfg(not(feature = "disable-savepoints"))]
    {
        transact(
            &mut connection,
            &TransactionOptions::new(),
            |connection| {
                async move {
                    record(&mut *connection, "outer").await?;
                    let inner: Result<()> = with_savepoint(&mut *connection, None, |connection| {
                        async move {
                            record(&mut *connection, "inner").await?;
                            Err(Error::msg("undo the inner work"))
                        }
                        .boxed()
                    })
                    .await;
                    assert!(inner.is_err());
                    with_savepoint(&mut *connection, Some("named"), |connection| {
                        record(connection, "named").boxed()
                    })
                    .await
                }
                .boxed()
            },
        )
        .await
        .expect("Could not run the transaction with savepoints");
        let ledger = entries(&mut connection).await;
        assert!(ledger.contains(&"outer".to_string()), "{:?}", ledger);
        assert!(ledger.contains(&"named".to_string()), "{:?}", ledger);
        assert!(!ledger.contains(&"inner".to_string()), "{:?}", ledger);
    }

    let ledger = entries(&mut connection).await;
    assert_eq!(ledger[..2], ["kept", "second"]);
    connection
        .close()
        .await
        .expect("Could not close the connection");
}
