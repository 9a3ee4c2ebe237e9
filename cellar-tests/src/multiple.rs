use cellar::{AsUnqualifiedMaps, DataSource, Options, Pooled, QueryResult, Value, execute_multi};
use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn multiple<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    let mut pool = Pooled(source);
    let options = Options::new().strategy(AsUnqualifiedMaps);
    let results = execute_multi(
        &mut pool,
        indoc! {"
            DROP TABLE IF EXISTS shelf;

            CREATE TABLE shelf (id INTEGER PRIMARY KEY, label VARCHAR(16));
            INSERT INTO shelf (id, label) VALUES (1, 'top'), (2, 'middle'), (3, 'bottom');
            SELECT label FROM shelf WHERE id < 3 ORDER BY id;
            UPDATE shelf SET label = 'floor' WHERE id = 3;
            SELECT COUNT(*) AS total FROM shelf;
        "},
        &options,
    )
    .await
    .expect("Could not run the statements");
    assert_eq!(results.len(), 6);
    assert_eq!(results[2], QueryResult::Affected(3));
    let QueryResult::Rows(labels) = &results[3] else {
        panic!("Expected the labels");
    };
    let labels = labels
        .iter()
        .map(|row| row.get("label").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        labels,
        [Some(Value::from("top")), Some(Value::from("middle"))]
    );
    assert_eq!(results[4], QueryResult::Affected(1));
    let QueryResult::Rows(total) = &results[5] else {
        panic!("Expected the total");
    };
    assert_eq!(total[0].get_as::<i64>("total").unwrap(), 3);
}
