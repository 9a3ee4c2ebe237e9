use cellar::{
    AsUnqualifiedMaps, DataSource, Options, Pooled, QueryResult, ReturnKeys, execute, params,
};
use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn keys<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    let mut pool = Pooled(source);
    for sql in [
        "DROP TABLE IF EXISTS ticket",
        indoc! {"
            CREATE TABLE ticket (
                id INTEGER PRIMARY KEY,
                title VARCHAR(64)
            )
        "},
    ] {
        execute(&mut pool, sql, &Options::new())
            .await
            .expect("Could not set up the ticket table");
    }

    let insert = "INSERT INTO ticket (title) VALUES (?)";
    let options = Options::new()
        .strategy(AsUnqualifiedMaps)
        .return_keys(ReturnKeys::Generic);
    let first = execute(&mut pool, (insert, params!["first"]), &options)
        .await
        .expect("Could not insert the first ticket")
        .rows()
        .expect("The generated keys are returned as rows");
    assert_eq!(first.len(), 1);
    let first = first[0].values()[0].as_i64().expect("Keys are integers");

    // Named keys fall back to whatever the driver supports
    let options = options.return_keys(ReturnKeys::Named(vec!["id".into()]));
    let second = execute(&mut pool, (insert, params!["second"]), &options)
        .await
        .expect("Could not insert the second ticket");
    let second = match second {
        QueryResult::Rows(rows) => rows[0].values()[0].as_i64().expect("Keys are integers"),
        QueryResult::Affected(count) => {
            assert_eq!(count, 1);
            first + 1
        }
    };
    assert!(second > first);

    // Without keys the affected count comes back
    let result = execute(
        &mut pool,
        (insert, params!["third"]),
        &Options::new().strategy(AsUnqualifiedMaps),
    )
    .await
    .expect("Could not insert the third ticket");
    assert_eq!(result, QueryResult::Affected(1));
}
