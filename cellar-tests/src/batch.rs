use crate::count;
use cellar::{
    AsUnqualifiedMaps, BatchOptions, BatchResult, DataSource, Options, Pooled, QueryResult, Value,
    execute, execute_batch_with, params,
};
use indoc::indoc;
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

const INSERT: &str = "INSERT INTO crate_item (name, weight) VALUES (?, ?)";

fn items(count: usize) -> Vec<Vec<Value>> {
    (1..=count)
        .map(|i| params![format!("Item {}", i), i as i64 * 10])
        .collect()
}

pub async fn batch<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    let mut pool = Pooled(source);
    for sql in [
        "DROP TABLE IF EXISTS crate_item",
        indoc! {"
            CREATE TABLE crate_item (
                id INTEGER PRIMARY KEY,
                name VARCHAR(32),
                weight INTEGER
            )
        "},
    ] {
        execute(&mut pool, sql, &Options::new())
            .await
            .expect("Could not set up the crate_item table");
    }

    // Nine groups in chunks of four
    let result = execute_batch_with(
        &mut pool,
        INSERT,
        &items(9),
        &BatchOptions::new().chunk_size(4),
        &AsUnqualifiedMaps,
    )
    .await
    .expect("Could not run the batch");
    assert_eq!(result, BatchResult::Counts(vec![1; 9]));
    assert_eq!(count(&mut pool, "crate_item").await, 9);

    // The count does not depend on the chunk size
    for chunk_size in [1, 9, 20] {
        let result = execute_batch_with(
            &mut pool,
            INSERT,
            &items(9),
            &BatchOptions::new().chunk_size(chunk_size).large(true),
            &AsUnqualifiedMaps,
        )
        .await
        .expect("Could not run the large batch");
        assert_eq!(result, BatchResult::LargeCounts(vec![1; 9]), "{}", chunk_size);
    }
    assert_eq!(count(&mut pool, "crate_item").await, 36);

    // Generated keys, one per group
    #[cfg(not(feature = "disable-generated-keys"))]
    {
        let result = execute_batch_with(
            &mut pool,
            INSERT,
            &items(5),
            &BatchOptions::new().chunk_size(2).return_keys(true),
            &AsUnqualifiedMaps,
        )
        .await
        .expect("Could not run the batch returning keys");
        let BatchResult::Keys(keys) = result else {
            panic!("Expected the generated keys");
        };
        let ids = keys
            .iter()
            .map(|key| key.values()[0].as_i64().expect("Keys are integers"))
            .collect::<Vec<_>>();
        assert_eq!(ids.len(), 5);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", ids);
    }

    // Rows written by triggers are not part of the counts
    #[cfg(not(feature = "disable-triggers"))]
    {
        for sql in [
            "DROP TABLE IF EXISTS crate_audit",
            "CREATE TABLE crate_audit (item_id INTEGER)",
            indoc! {"
                CREATE TRIGGER crate_item_audit AFTER INSERT ON crate_item
                BEGIN
                    INSERT INTO crate_audit (item_id) VALUES (NEW.id);
                END
            "},
        ] {
            execute(&mut pool, sql, &Options::new())
                .await
                .expect("Could not set up the crate_audit trigger");
        }
        let result = execute(
            &mut pool,
            (INSERT, params!["Audited", 5_i64]),
            &Options::new().strategy(AsUnqualifiedMaps),
        )
        .await
        .expect("Could not insert the audited item");
        assert_eq!(result, QueryResult::Affected(1));
        let result = execute_batch_with(
            &mut pool,
            INSERT,
            &items(2),
            &BatchOptions::new(),
            &AsUnqualifiedMaps,
        )
        .await
        .expect("Could not run the audited batch");
        assert_eq!(result, BatchResult::Counts(vec![1, 1]));
        assert_eq!(count(&mut pool, "crate_audit").await, 3);
        execute(&mut pool, "DROP TRIGGER crate_item_audit", &Options::new())
            .await
            .expect("Could not drop the crate_audit trigger");
    }

    // Inserts that are ignored still take their place among the keys
    #[cfg(all(
        not(feature = "disable-generated-keys"),
        not(feature = "disable-insert-or-ignore")
    ))]
    {
        for sql in [
            "DELETE FROM crate_item",
            "CREATE UNIQUE INDEX IF NOT EXISTS crate_item_name ON crate_item (name)",
        ] {
            execute(&mut pool, sql, &Options::new())
                .await
                .expect("Could not prepare crate_item for unique names");
        }
        let groups = vec![
            params!["Anvil", 10_i64],
            params!["Anvil", 20_i64],
            params!["Bucket", 30_i64],
        ];
        let result = execute_batch_with(
            &mut pool,
            "INSERT OR IGNORE INTO crate_item (name, weight) VALUES (?, ?)",
            &groups,
            &BatchOptions::new().return_keys(true),
            &AsUnqualifiedMaps,
        )
        .await
        .expect("Could not run the batch ignoring duplicates");
        let BatchResult::Keys(keys) = result else {
            panic!("Expected the generated keys");
        };
        assert_eq!(keys.len(), 3);
        assert!(keys[0].values()[0].as_i64().is_some());
        assert!(keys[1].values()[0].is_null());
        assert!(keys[2].values()[0].as_i64() > keys[0].values()[0].as_i64());
        assert_eq!(count(&mut pool, "crate_item").await, 2);
    }
}
