use cellar::{
    Adapted, AsArrays, AsLowerMaps, AsUnqualifiedMaps, ColumnSource, DataSource, Options, Pooled,
    QueryResult, Value, execute, execute_one, params, plan,
};
use indoc::indoc;
use std::{
    ops::ControlFlow,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) async fn create_fruit<D: DataSource>(source: &D) {
    let mut pool = Pooled(source);
    let options = Options::new();
    for sql in [
        "DROP TABLE IF EXISTS fruit",
        indoc! {"
            CREATE TABLE fruit (
                id INTEGER PRIMARY KEY,
                name VARCHAR(32) NOT NULL,
                appearance VARCHAR(32),
                cost INTEGER,
                grade REAL
            )
        "},
        indoc! {"
            INSERT INTO fruit (id, name, appearance, cost, grade) VALUES
                (1, 'Apple', 'red', 59, NULL),
                (2, 'Banana', 'yellow', NULL, 92.2),
                (3, 'Peach', NULL, 139, 90.0),
                (4, 'Orange', 'juicy', 89, 88.6)
        "},
    ] {
        execute(&mut pool, sql, &options)
            .await
            .expect("Could not set up the fruit table");
    }
}

pub async fn fruit<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    create_fruit(source).await;
    let mut pool = Pooled(source);

    // First matching row
    let row = execute_one(
        &mut pool,
        (
            "SELECT * FROM fruit WHERE appearance = ?",
            params!["red"],
        ),
        &Options::new(),
    )
    .await
    .expect("Could not query the red fruit")
    .row()
    .expect("There is a red fruit");
    #[cfg(not(feature = "disable-qualified-labels"))]
    assert_eq!(row.get("fruit.name"), Some(&Value::from("Apple")));
    assert_eq!(row.len(), 5);

    // Unqualified and lower-cased keys
    let rows = execute(
        &mut pool,
        "SELECT ID, NAME FROM fruit ORDER BY id",
        &Options::new().strategy(AsLowerMaps),
    )
    .await
    .expect("Could not query the fruit")
    .rows()
    .expect("The query returns rows");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.keys().iter().all(|k| *k == k.to_lowercase())));
    let names = execute(
        &mut pool,
        "SELECT name FROM fruit ORDER BY id",
        &Options::new().strategy(AsUnqualifiedMaps),
    )
    .await
    .expect("Could not query the names")
    .rows()
    .expect("The query returns rows")
    .into_iter()
    .map(|row| row.get_as::<String>("name").expect("Names are text"))
    .collect::<Vec<_>>();
    assert_eq!(names, ["Apple", "Banana", "Peach", "Orange"]);

    // No rows
    let result = execute_one(
        &mut pool,
        ("SELECT * FROM fruit WHERE cost > ?", params![1000]),
        &Options::new(),
    )
    .await
    .expect("Could not query the expensive fruit");
    assert_eq!(result, QueryResult::Rows(None));

    // Arrays
    let table = execute(
        &mut pool,
        "SELECT id, name FROM fruit WHERE id < 3 ORDER BY id",
        &Options::new().strategy(AsArrays),
    )
    .await
    .expect("Could not query the fruit as arrays")
    .rows()
    .expect("The query returns rows");
    assert_eq!(table.len(), 2);
    assert_eq!(table.column_index("name"), Some(1));
    let vectors = table.into_vectors();
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2][1], Value::from("Banana"));

    // A plan stopping at the first row only touches that row
    let reads = Arc::new(AtomicUsize::new(0));
    let counter = reads.clone();
    let counting = Options::new().strategy(Adapted::new(
        AsUnqualifiedMaps,
        move |source: &dyn ColumnSource, index: usize| {
            counter.fetch_add(1, Ordering::Relaxed);
            source.column(index)
        },
    ));
    let first = plan(&mut pool, "SELECT * FROM fruit ORDER BY id", &counting)
        .reduce(None, |_, row| Ok(ControlFlow::Break(row.get("name"))))
        .await
        .expect("Could not reduce the fruit");
    assert_eq!(first, Some(Value::from("Apple")));
    assert_eq!(reads.load(Ordering::Relaxed), 1);

    // A full reduction
    let cost = plan(
        &mut pool,
        "SELECT cost FROM fruit WHERE cost IS NOT NULL",
        &Options::new().strategy(AsUnqualifiedMaps),
    )
    .reduce(0, |total, row| {
        let cost = row.get("cost").and_then(|v| v.as_i64()).unwrap_or_default();
        Ok(ControlFlow::Continue(total + cost))
    })
    .await
    .expect("Could not sum the costs");
    assert_eq!(cost, 59 + 139 + 89);

    // Reducing something that is not a result set gives back the initial value
    let untouched = plan(
        &mut pool,
        ("UPDATE fruit SET cost = cost WHERE id = ?", params![1]),
        &Options::new(),
    )
    .reduce(42, |_, _| Ok(ControlFlow::Continue(0)))
    .await
    .expect("Could not reduce an update");
    assert_eq!(untouched, 42);
}
