mod common;

#[cfg(test)]
mod tests {
    use crate::common::{MockDb, fruit, fruit_columns};
    use cellar_core::{
        Adapted, AsArrays, AsLowerMaps, AsMaps, AsModifiedMaps, AsUnqualifiedArrays,
        AsUnqualifiedLowerMaps, AsUnqualifiedMaps, AsUnqualifiedModifiedMaps, ColumnMeta,
        ColumnSource, KeyedBuilder, Options, QueryResult, Record, Result, ResultSetBuilder,
        RowBuilder, RowsCursor, Strategy, Value, build_set, execute, is_configuration,
    };

    fn cursor(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> RowsCursor {
        RowsCursor::new(columns, rows)
    }

    async fn collect<S: Strategy>(
        strategy: &S,
        mut cursor: RowsCursor,
    ) -> Result<<S::Builder as ResultSetBuilder>::Set> {
        let builder = strategy.builder(cursor.columns())?;
        build_set(&builder, &mut cursor).await
    }

    #[tokio::test]
    async fn qualified_and_unqualified_keys() {
        let columns = vec![
            ColumnMeta::new("id").table("FRUIT"),
            ColumnMeta::new("total"),
        ];
        let rows = vec![vec![Value::Int32(Some(1)), Value::Int64(Some(12))]];
        let qualified = collect(&AsMaps, cursor(columns.clone(), rows.clone()))
            .await
            .unwrap();
        assert_eq!(qualified[0].keys(), ["FRUIT.id", "total"]);
        let unqualified = collect(&AsUnqualifiedMaps, cursor(columns.clone(), rows.clone()))
            .await
            .unwrap();
        assert_eq!(unqualified[0].keys(), ["id", "total"]);
        let lower = collect(&AsLowerMaps, cursor(columns, rows)).await.unwrap();
        assert_eq!(lower[0].keys(), ["fruit.id", "total"]);
    }

    #[tokio::test]
    async fn modified_maps_require_both_transforms() {
        let columns = vec![ColumnMeta::new("Name").table("Fruit")];
        let missing = AsModifiedMaps::new().label_fn(|l| l.to_lowercase());
        let error = missing.builder(&columns).unwrap_err();
        assert!(is_configuration(&error), "{error:#}");
        assert!(is_configuration(
            &AsUnqualifiedModifiedMaps::new().builder(&columns).unwrap_err()
        ));
        let complete = AsModifiedMaps::new()
            .qualifier_fn(|t| t.to_uppercase())
            .label_fn(|l| format!("{}_", l.to_lowercase()));
        let rows = collect(&complete, cursor(columns.clone(), vec![vec!["x".into()]]))
            .await
            .unwrap();
        assert_eq!(rows[0].keys(), ["FRUIT.name_"]);
        let unqualified = AsUnqualifiedModifiedMaps::new().label_fn(|l| l.to_uppercase());
        let rows = collect(&unqualified, cursor(columns, vec![vec!["x".into()]]))
            .await
            .unwrap();
        assert_eq!(rows[0].keys(), ["NAME"]);
    }

    #[tokio::test]
    async fn colliding_keys_keep_the_last_column() {
        let columns = vec![
            ColumnMeta::new("NAME").table("a"),
            ColumnMeta::new("name").table("b"),
        ];
        let rows = collect(
            &AsUnqualifiedLowerMaps,
            cursor(columns, vec![vec!["first".into(), "second".into()]]),
        )
        .await
        .unwrap();
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("second")));
        let builder = AsUnqualifiedLowerMaps
            .builder(&[ColumnMeta::new("NAME"), ColumnMeta::new("name")])
            .unwrap();
        assert_eq!(builder.column_index("name"), Some(2));
    }

    #[tokio::test]
    async fn zero_columns() {
        let rows = collect(&AsMaps, cursor(vec![], vec![vec![], vec![]]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_empty());
        let table = collect(&AsArrays, cursor(vec![], vec![vec![]])).await.unwrap();
        assert_eq!(table.columns.len(), 0);
        assert_eq!(table.rows.len(), 1);
    }

    #[tokio::test]
    async fn arrays_lead_with_the_column_names() {
        let table = collect(&AsUnqualifiedArrays, cursor(fruit_columns(), vec![
            vec![
                Value::Int32(Some(1)),
                "Apple".into(),
                "red".into(),
                Value::Int32(Some(59)),
                Value::Float64(None),
            ],
            vec![
                Value::Int32(Some(2)),
                "Banana".into(),
                "yellow".into(),
                Value::Int32(None),
                Value::Float64(Some(92.2)),
            ],
        ]))
        .await
        .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.rows.iter().all(|row| row.len() == 5));
        assert_eq!(table.column_index("name"), Some(1));
        let vectors = table.into_vectors();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0][1], Value::from("name"));
        assert_eq!(vectors[2][1], Value::from("Banana"));
        let qualified = AsArrays.builder(&fruit_columns()).unwrap();
        assert_eq!(qualified.column_index("FRUIT.cost"), Some(4));
    }

    #[tokio::test]
    async fn lookups_return_the_original_values() {
        let values = vec![
            Value::Int32(Some(3)),
            "Peach".into(),
            Value::Varchar(None),
            Value::Int32(Some(139)),
            Value::Float64(Some(90.0)),
        ];
        let columns = fruit_columns();
        let rows = collect(&AsMaps, cursor(columns.clone(), vec![values.clone()]))
            .await
            .unwrap();
        for (column, value) in columns.iter().zip(values.iter()) {
            assert_eq!(rows[0].get(&column.qualified_name()), Some(value));
        }
    }

    #[tokio::test]
    async fn adapted_reader_decodes_columns() {
        let upper = Adapted::new(AsUnqualifiedMaps, |source: &dyn ColumnSource, index| {
            Ok(match source.column(index)? {
                Value::Varchar(Some(v)) => Value::Varchar(Some(v.to_uppercase())),
                other => other,
            })
        });
        let rows = collect(
            &upper,
            cursor(
                vec![ColumnMeta::new("id"), ColumnMeta::new("name")],
                vec![vec![Value::Int32(Some(1)), "apple".into()]],
            ),
        )
        .await
        .unwrap();
        assert_eq!(rows[0].get("name"), Some(&Value::from("APPLE")));
        assert_eq!(rows[0].get("id"), Some(&Value::Int32(Some(1))));
    }

    #[derive(Debug, PartialEq)]
    struct Fruit {
        name: String,
        cost: Option<i32>,
    }

    struct AsFruit;

    struct FruitBuilder {
        name: usize,
        cost: usize,
    }

    impl RowBuilder for FruitBuilder {
        type Row = Fruit;
        type RowAcc = (Option<String>, Option<i32>);

        fn begin_row(&self) -> Self::RowAcc {
            (None, None)
        }

        fn with_column(
            &self,
            mut acc: Self::RowAcc,
            source: &dyn ColumnSource,
            index: usize,
        ) -> Result<Self::RowAcc> {
            if index == self.name {
                acc.0 = cellar_core::AsValue::try_from_value(source.column(index)?)?;
            } else if index == self.cost {
                acc.1 = cellar_core::AsValue::try_from_value(source.column(index)?)?;
            }
            Ok(acc)
        }

        fn finish_row(&self, acc: Self::RowAcc) -> Result<Fruit> {
            Ok(Fruit {
                name: acc.0.unwrap_or_default(),
                cost: acc.1,
            })
        }
    }

    impl ResultSetBuilder for FruitBuilder {
        type Set = Vec<Fruit>;
        type SetAcc = Vec<Fruit>;

        fn begin_set(&self) -> Vec<Fruit> {
            Vec::new()
        }
        fn with_row(&self, mut acc: Vec<Fruit>, row: Fruit) -> Vec<Fruit> {
            acc.push(row);
            acc
        }
        fn finish_set(&self, acc: Vec<Fruit>) -> Result<Vec<Fruit>> {
            Ok(acc)
        }
    }

    impl Strategy for AsFruit {
        type Builder = FruitBuilder;

        fn builder(&self, columns: &[ColumnMeta]) -> Result<FruitBuilder> {
            let position = |label: &str| {
                columns
                    .iter()
                    .position(|c| c.label == label)
                    .map(|i| i + 1)
                    .unwrap_or(0)
            };
            Ok(FruitBuilder {
                name: position("name"),
                cost: position("cost"),
            })
        }
    }

    #[tokio::test]
    async fn custom_rows() {
        let db = MockDb::new();
        db.respond("SELECT * FROM fruit", fruit());
        let mut connection = db.connect();
        let result = execute(
            &mut connection,
            "SELECT * FROM fruit",
            &Options::new().strategy(AsFruit),
        )
        .await
        .unwrap();
        let QueryResult::Rows(fruits) = result else {
            panic!("Expected rows");
        };
        assert_eq!(fruits.len(), 4);
        assert_eq!(
            fruits[1],
            Fruit {
                name: "Banana".into(),
                cost: None
            }
        );
    }

    #[test]
    fn records_compare_structurally() {
        let left = Record::new(
            vec!["a".to_string(), "b".to_string()].into(),
            vec![Value::Int32(Some(1)), Value::Null].into(),
        );
        let right = Record::new(
            vec!["b".to_string(), "a".to_string()].into(),
            vec![Value::Null, Value::Int32(Some(1))].into(),
        );
        assert_eq!(left, right);
        assert_ne!(left, right.with("a", 2));
    }
}
