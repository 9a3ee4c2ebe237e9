#[cfg(test)]
mod tests {
    use cellar_core::{
        ColumnSource, Concurrency, Connection, Cursor, Isolation, ResultType, ReturnKeys,
        Statement, StatementOptions, Value, is_misuse, is_unsupported,
    };
    use cellar_sqlite::{SqliteConnection, SqliteStatement};
    use indoc::indoc;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    async fn connection() -> SqliteConnection {
        let mut connection = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open an in memory database");
        let mut statement = connection
            .create_statement(&StatementOptions::default())
            .await
            .unwrap();
        assert!(
            !statement
                .execute_sql(indoc! {"
                    CREATE TABLE fruit (
                        id INTEGER PRIMARY KEY,
                        name VARCHAR(32) NOT NULL,
                        cost INTEGER
                    )
                "})
                .await
                .unwrap()
        );
        connection
    }

    #[tokio::test]
    async fn column_metadata() {
        let mut connection = connection().await;
        let mut statement = connection
            .prepare(
                "SELECT name, cost, 1 + 1 AS two FROM fruit",
                &StatementOptions::default(),
            )
            .await
            .unwrap();
        assert!(statement.execute().await.unwrap());
        let cursor = statement.result_set().unwrap();
        let columns = cursor.columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].label, "name");
        assert_eq!(columns[0].table, "fruit");
        assert_eq!(columns[0].declared_type, "VARCHAR(32)");
        assert_eq!(columns[0].nullable, Some(false));
        assert_eq!(columns[1].nullable, Some(true));
        assert_eq!(columns[2].label, "two");
        assert_eq!(columns[2].table, "");
        assert_eq!(columns[2].nullable, None);
    }

    #[tokio::test]
    async fn bind_and_step() {
        let mut connection = connection().await;
        let mut insert = connection
            .prepare(
                "INSERT INTO fruit (name, cost) VALUES (?, ?)",
                &StatementOptions::default(),
            )
            .await
            .unwrap();
        for (name, cost) in [("Apple", Value::Int32(Some(59))), ("Banana", Value::Null)] {
            insert.clear_bindings().unwrap();
            insert.bind(1, name.into()).unwrap();
            insert.bind(2, cost).unwrap();
            assert!(!insert.execute().await.unwrap());
            assert_eq!(insert.update_count(), Some(1));
        }
        assert!(is_misuse(&insert.bind(0, Value::Null).unwrap_err()));
        assert!(is_misuse(&insert.result_set().err().unwrap()));

        let mut select = connection
            .prepare(
                "SELECT name, cost FROM fruit ORDER BY id",
                &StatementOptions::new().max_rows(1),
            )
            .await
            .unwrap();
        assert!(select.execute().await.unwrap());
        assert_eq!(select.update_count(), None);
        let mut cursor = select.result_set().unwrap();
        assert!(is_misuse(&cursor.column(1).unwrap_err()));
        assert!(cursor.advance().await.unwrap());
        assert_eq!(cursor.column(1).unwrap(), Value::from("Apple"));
        assert_eq!(cursor.column(2).unwrap(), Value::Int64(Some(59)));
        assert!(is_misuse(&cursor.column(3).unwrap_err()));
        assert!(!cursor.advance().await.unwrap());
        assert!(!cursor.advance().await.unwrap());
    }

    #[tokio::test]
    async fn multiple_statements() {
        let mut connection = connection().await;
        let mut statement = connection
            .prepare(
                indoc! {"
                    INSERT INTO fruit (name) VALUES ('Peach');
                    -- nothing to run here
                    ;
                    SELECT name FROM fruit;
                    DELETE FROM fruit
                "},
                &StatementOptions::default(),
            )
            .await
            .unwrap();
        for _ in 0..2 {
            assert!(!statement.execute().await.unwrap());
            assert_eq!(statement.update_count(), Some(1));
            assert!(statement.more_results().await.unwrap());
            {
                let mut cursor = statement.result_set().unwrap();
                assert!(cursor.advance().await.unwrap());
                assert_eq!(cursor.column(1).unwrap(), Value::from("Peach"));
            }
            assert!(!statement.more_results().await.unwrap());
            assert_eq!(statement.update_count(), Some(1));
            assert!(!statement.more_results().await.unwrap());
            assert_eq!(statement.update_count(), None);
        }
    }

    #[tokio::test]
    async fn generated_keys_and_batches() {
        let mut connection = connection().await;
        let mut statement = connection
            .prepare(
                "INSERT INTO fruit (name) VALUES (?)",
                &StatementOptions::new().return_keys(ReturnKeys::Generic),
            )
            .await
            .unwrap();
        for name in ["Apple", "Banana", "Peach"] {
            statement.bind(1, name.into()).unwrap();
            statement.add_batch().unwrap();
        }
        assert_eq!(statement.execute_batch().await.unwrap(), [1, 1, 1]);
        let mut keys = statement.generated_keys().unwrap();
        assert_eq!(keys.columns()[0].label, "last_insert_rowid()");
        let mut ids = Vec::new();
        while keys.advance().await.unwrap() {
            ids.push(keys.column(1).unwrap());
        }
        assert_eq!(
            ids,
            [
                Value::Int64(Some(1)),
                Value::Int64(Some(2)),
                Value::Int64(Some(3))
            ]
        );

        let mut plain = connection
            .prepare("DELETE FROM fruit", &StatementOptions::default())
            .await
            .unwrap();
        assert!(!plain.execute().await.unwrap());
        assert_eq!(plain.update_count(), Some(3));
        assert!(is_misuse(&plain.generated_keys().err().unwrap()));
    }

    #[tokio::test]
    async fn unsupported_options() {
        let mut connection = connection().await;
        let named = StatementOptions::new().return_keys(ReturnKeys::Named(vec!["id".into()]));
        assert!(is_unsupported(
            &connection.prepare("SELECT 1", &named).await.err().unwrap()
        ));
        let updatable = StatementOptions::new()
            .concurrency(Concurrency::Updatable)
            .result_type(ResultType::ForwardOnly);
        assert!(is_unsupported(
            &connection.prepare("SELECT 1", &updatable).await.err().unwrap()
        ));
        let scrollable = StatementOptions::new()
            .concurrency(Concurrency::ReadOnly)
            .result_type(ResultType::ScrollInsensitive);
        assert!(is_unsupported(
            &connection
                .create_statement(&scrollable)
                .await
                .err()
                .unwrap()
        ));
        assert!(is_unsupported(
            &connection
                .set_isolation(Isolation::RepeatableRead)
                .await
                .unwrap_err()
        ));
        connection
            .set_isolation(Isolation::ReadUncommitted)
            .await
            .unwrap();
        assert_eq!(connection.isolation().unwrap(), Isolation::ReadUncommitted);
    }

    #[tokio::test]
    async fn savepoints() {
        let mut connection = connection().await;
        connection.set_auto_commit(false).await.unwrap();
        let mut insert = connection
            .prepare(
                "INSERT INTO fruit (name) VALUES ('Orange')",
                &StatementOptions::default(),
            )
            .await
            .unwrap();
        let savepoint = connection.savepoint(None).await.unwrap();
        assert_eq!(savepoint.name(), "cellar_sp_1");
        insert.execute().await.unwrap();
        connection.rollback_to(&savepoint).await.unwrap();
        connection.release_savepoint(savepoint).await.unwrap();
        let quoted = connection.savepoint(Some("it's \"quoted\"")).await.unwrap();
        insert.execute().await.unwrap();
        connection.release_savepoint(quoted).await.unwrap();
        connection.commit().await.unwrap();
        let mut count = connection
            .prepare("SELECT COUNT(*) FROM fruit", &StatementOptions::default())
            .await
            .unwrap();
        assert!(count.execute().await.unwrap());
        let mut cursor = count.result_set().unwrap();
        assert!(cursor.advance().await.unwrap());
        assert_eq!(cursor.column(1).unwrap(), Value::Int64(Some(1)));
    }

    async fn keys(statement: &mut SqliteStatement) -> Vec<Value> {
        let mut keys = statement.generated_keys().unwrap();
        let mut result = Vec::new();
        while keys.advance().await.unwrap() {
            result.push(keys.column(1).unwrap());
        }
        result
    }

    #[tokio::test]
    async fn ignored_inserts_keep_their_key_slot() {
        let mut connection = connection().await;
        let mut setup = connection
            .create_statement(&StatementOptions::default())
            .await
            .unwrap();
        setup
            .execute_sql("CREATE UNIQUE INDEX fruit_name ON fruit (name)")
            .await
            .unwrap();
        let mut statement = connection
            .prepare(
                "INSERT OR IGNORE INTO fruit (name) VALUES (?)",
                &StatementOptions::new().return_keys(ReturnKeys::Generic),
            )
            .await
            .unwrap();
        for name in ["Apple", "Apple", "Banana"] {
            statement.bind(1, name.into()).unwrap();
            statement.add_batch().unwrap();
        }
        assert_eq!(statement.execute_batch().await.unwrap(), [1, 0, 1]);
        assert_eq!(
            keys(&mut statement).await,
            [
                Value::Int64(Some(1)),
                Value::Int64(None),
                Value::Int64(Some(2))
            ]
        );

        statement.bind(1, "Banana".into()).unwrap();
        assert!(!statement.execute().await.unwrap());
        assert_eq!(statement.update_count(), Some(0));
        assert_eq!(keys(&mut statement).await, [Value::Int64(None)]);

        statement.bind(1, "Cherry".into()).unwrap();
        assert!(!statement.execute().await.unwrap());
        assert_eq!(statement.update_count(), Some(1));
        assert_eq!(keys(&mut statement).await, [Value::Int64(Some(3))]);
    }

    #[tokio::test]
    async fn trigger_changes_are_not_counted() {
        let mut connection = connection().await;
        let mut setup = connection
            .create_statement(&StatementOptions::default())
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE fruit_log (fruit_id INTEGER)",
            indoc! {"
                CREATE TRIGGER fruit_logged AFTER INSERT ON fruit
                BEGIN
                    INSERT INTO fruit_log (fruit_id) VALUES (NEW.id);
                    INSERT INTO fruit_log (fruit_id) VALUES (NEW.id);
                END
            "},
        ] {
            assert!(!setup.execute_sql(sql).await.unwrap());
        }
        let mut statement = connection
            .prepare(
                "INSERT INTO fruit (name) VALUES (?)",
                &StatementOptions::new().return_keys(ReturnKeys::Generic),
            )
            .await
            .unwrap();
        statement.bind(1, "Apple".into()).unwrap();
        assert!(!statement.execute().await.unwrap());
        assert_eq!(statement.update_count(), Some(1));
        assert_eq!(keys(&mut statement).await, [Value::Int64(Some(1))]);
        for name in ["Banana", "Peach"] {
            statement.bind(1, name.into()).unwrap();
            statement.add_batch().unwrap();
        }
        assert_eq!(statement.execute_batch().await.unwrap(), [1, 1]);
        assert_eq!(
            keys(&mut statement).await,
            [Value::Int64(Some(2)), Value::Int64(Some(3))]
        );

        // A statement that changes nothing does not report the previous count
        assert!(!setup.execute_sql("DELETE FROM fruit WHERE id < 0").await.unwrap());
        assert_eq!(setup.update_count(), Some(0));
        assert!(!setup.execute_sql("DELETE FROM fruit_log").await.unwrap());
        assert_eq!(setup.update_count(), Some(6));
    }

    #[tokio::test]
    async fn bound_values_keep_their_content() {
        let mut connection = connection().await;
        let mut select = connection
            .prepare("SELECT ?, ?, ?", &StatementOptions::default())
            .await
            .unwrap();
        let decimal = Decimal::from_str("12345678901234567.891").unwrap();
        let blob: Box<[u8]> = vec![0, 1, 127, 128, 255].into();
        select.bind(1, Value::Decimal(Some(decimal))).unwrap();
        select.bind(2, "Fraise des bois \u{1F353}".into()).unwrap();
        select.bind(3, Value::Blob(Some(blob.clone()))).unwrap();
        assert!(select.execute().await.unwrap());
        let mut cursor = select.result_set().unwrap();
        assert!(cursor.advance().await.unwrap());
        assert_eq!(
            cursor.column(1).unwrap(),
            Value::from("12345678901234567.891")
        );
        assert_eq!(
            cursor.column(2).unwrap(),
            Value::from("Fraise des bois \u{1F353}")
        );
        assert_eq!(cursor.column(3).unwrap(), Value::Blob(Some(blob)));
    }
}
