mod common;

#[cfg(test)]
mod tests {
    use crate::common::{MockDb, Response, fruit};
    use cellar_core::{
        AsUnqualifiedMaps, ColumnMeta, Navigated, Navigation, Options, Relation, Value, navigate,
        plan,
    };
    use std::{ops::ControlFlow, sync::Arc};

    fn db() -> MockDb {
        let db = MockDb::new();
        db.respond("select * from fruit", fruit())
            .respond(
                "SELECT * FROM grade WHERE id = ?",
                Response::rows(
                    vec![ColumnMeta::new("id"), ColumnMeta::new("label")],
                    vec![vec![Value::Int32(Some(7)), "A".into()]],
                ),
            )
            .respond("SELECT * FROM FRUIT WHERE grade = ?", fruit())
            .respond(
                "SELECT * FROM owner WHERE id = ?",
                Response::Fail("no such table: owner".into()),
            );
        db
    }

    #[tokio::test]
    async fn convention_leads_to_one_row() {
        let db = db();
        let mut connection = db.connect();
        let options = Options::new().strategy(AsUnqualifiedMaps);
        let navigation = Navigation::new();
        let first = navigate(
            &mut connection,
            &navigation,
            &options,
            "fruit.grade_id",
            Value::Int32(Some(7)),
        )
        .await;
        let Navigated::One(Some(ref grade)) = first else {
            panic!("Expected one row, got {first:?}");
        };
        assert_eq!(grade.get("label"), Some(&Value::from("A")));
        assert_eq!(
            db.events().last().unwrap(),
            "execute SELECT * FROM grade WHERE id = ? [7]"
        );
        let second = navigate(
            &mut connection,
            &navigation,
            &options,
            "fruit.grade_id",
            Value::Int32(Some(7)),
        )
        .await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn schema_leads_to_many_rows() {
        let db = db();
        let mut connection = db.connect();
        let navigation = Navigation::new()
            .relation("grade.id", Relation::many("fruit", "grade"))
            .table_fn(|t| t.to_uppercase());
        let result = navigate(
            &mut connection,
            &navigation,
            &Options::new(),
            "grade.id",
            Value::Int32(Some(7)),
        )
        .await;
        let Navigated::Many(fruits) = result else {
            panic!("Expected many rows");
        };
        assert_eq!(fruits.len(), 4);
    }

    #[tokio::test]
    async fn failures_return_the_value() {
        let db = db();
        let mut connection = db.connect();
        let navigation = Navigation::new();
        let result = navigate(
            &mut connection,
            &navigation,
            &Options::new(),
            "owner_id",
            Value::Int32(Some(3)),
        )
        .await;
        assert_eq!(result, Navigated::Value(Value::Int32(Some(3))));
        let result = navigate(
            &mut connection,
            &navigation,
            &Options::new(),
            "name",
            "Apple".into(),
        )
        .await;
        assert_eq!(result, Navigated::Value("Apple".into()));
    }

    #[tokio::test]
    async fn navigable_rows_from_a_plan() {
        let db = db();
        db.respond(
            "select * from fruit_grades",
            Response::rows(
                vec![ColumnMeta::new("name"), ColumnMeta::new("grade_id")],
                vec![vec!["Apple".into(), Value::Int32(Some(7))]],
            ),
        );
        let mut connection = db.connect();
        let options = Options::new().strategy(AsUnqualifiedMaps);
        let navigation = Arc::new(Navigation::new());
        let rows = plan(&mut connection, "select * from fruit_grades", &options)
            .reduce(Vec::new(), |mut rows, row| {
                rows.push(row.navigable(navigation.clone())?);
                Ok(ControlFlow::Continue(rows))
            })
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&Value::from("Apple")));
        let Navigated::One(Some(grade)) = rows[0].nav(&mut connection, "grade_id", &options).await
        else {
            panic!("Expected the grade");
        };
        assert_eq!(grade.get("id"), Some(&Value::Int32(Some(7))));
    }
}
