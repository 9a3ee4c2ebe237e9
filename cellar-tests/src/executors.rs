use crate::fruit::create_fruit;
use cellar::{
    AdHoc, AsUnqualifiedMaps, Connection, DataSource, Options, Prepared, Query, QueryResult,
    StatementOptions, Value, execute, execute_one, is_configuration, is_misuse, params,
};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn executors<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    create_fruit(source).await;
    let options = Options::new().strategy(AsUnqualifiedMaps);
    let mut connection = source
        .connection()
        .await
        .expect("Could not get a connection");

    // A raw connection stays usable across calls
    for (id, name) in [(1, "Apple"), (3, "Peach")] {
        let row = execute_one(
            &mut connection,
            ("SELECT name FROM fruit WHERE id = ?", params![id]),
            &options,
        )
        .await
        .expect("Could not query a fruit")
        .row()
        .expect("The fruit exists");
        assert_eq!(row.get("name"), Some(&Value::from(name)));
    }

    // Row limit
    let rows = execute(
        &mut connection,
        "SELECT * FROM fruit ORDER BY id",
        &options.clone().max_rows(2),
    )
    .await
    .expect("Could not query with a row limit")
    .rows()
    .expect("The query returns rows");
    assert_eq!(rows.len(), 2);

    // Prepared statement, rebound on every run
    let statement = connection
        .prepare(
            "SELECT cost FROM fruit WHERE name = ?",
            &StatementOptions::default(),
        )
        .await
        .expect("Could not prepare the statement");
    let mut prepared = Prepared(statement);
    for (name, cost) in [("Orange", Some(89)), ("Banana", None), ("Apple", Some(59))] {
        let row = execute_one(&mut prepared, Query::params(params![name]), &options)
            .await
            .expect("Could not run the prepared statement")
            .row()
            .expect("The fruit exists");
        let found = row.get_as::<Option<i64>>("cost").expect("Costs are integers");
        assert_eq!(found, cost);
    }
    let error = execute(&mut prepared, "SELECT 1", &options)
        .await
        .expect_err("SQL cannot be given to a prepared statement");
    assert!(is_configuration(&error));
    drop(prepared);

    // Ad hoc statement
    let statement = connection
        .create_statement(&StatementOptions::default())
        .await
        .expect("Could not create the statement");
    let mut adhoc = AdHoc(statement);
    let result = execute(
        &mut adhoc,
        "UPDATE fruit SET cost = cost + 1 WHERE cost IS NOT NULL",
        &options,
    )
    .await
    .expect("Could not run the ad hoc update");
    assert_eq!(result, QueryResult::Affected(3));
    let error = execute(
        &mut adhoc,
        ("SELECT * FROM fruit WHERE id = ?", params![1]),
        &options,
    )
    .await
    .expect_err("Parameters cannot be given to an ad hoc statement");
    assert!(is_misuse(&error));
    drop(adhoc);

    // Backend errors propagate
    crate::silent_logs! {
        assert!(
            execute(&mut connection, "SELECT * FROM no_such_table", &options)
                .await
                .is_err()
        );
    }

    connection
        .close()
        .await
        .expect("Could not close the connection");
}
