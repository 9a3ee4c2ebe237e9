use crate::fruit::create_fruit;
use cellar::{
    AsUnqualifiedMaps, DataSource, Navigated, Navigation, Options, Pooled, Relation, Value,
    execute, navigate, params, plan,
};
use indoc::indoc;
use std::{
    ops::ControlFlow,
    sync::{Arc, LazyLock},
};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn navigation<D: DataSource>(source: &D) {
    let _lock = MUTEX.lock().await;
    create_fruit(source).await;
    let mut pool = Pooled(source);
    let options = Options::new().strategy(AsUnqualifiedMaps);
    for sql in [
        "DROP TABLE IF EXISTS basket",
        indoc! {"
            CREATE TABLE basket (
                id INTEGER PRIMARY KEY,
                owner VARCHAR(32),
                fruit_id INTEGER
            )
        "},
    ] {
        execute(&mut pool, sql, &options)
            .await
            .expect("Could not set up the basket table");
    }
    for (id, owner, fruit) in [(1, "Ann", 1), (2, "Bob", 1), (3, "Cid", 4)] {
        execute(
            &mut pool,
            (
                "INSERT INTO basket (id, owner, fruit_id) VALUES (?, ?, ?)",
                params![id, owner, fruit],
            ),
            &options,
        )
        .await
        .expect("Could not fill a basket");
    }

    // By convention `fruit_id` leads to the fruit
    let navigation = Arc::new(Navigation::new());
    let baskets = plan(
        &mut pool,
        "SELECT * FROM basket ORDER BY id",
        &options,
    )
    .reduce(Vec::new(), |mut baskets, row| {
        baskets.push(row.navigable(navigation.clone())?);
        Ok(ControlFlow::Continue(baskets))
    })
    .await
    .expect("Could not read the baskets");
    assert_eq!(baskets.len(), 3);
    let first = baskets[0].nav(&mut pool, "fruit_id", &options).await;
    let Navigated::One(Some(ref fruit)) = first else {
        panic!("Expected the fruit of the first basket, got {:?}", first);
    };
    assert_eq!(fruit.get("name"), Some(&Value::from("Apple")));
    let again = baskets[0].nav(&mut pool, "fruit_id", &options).await;
    assert_eq!(first, again);
    let last = baskets[2].nav(&mut pool, "fruit_id", &options).await;
    let Navigated::One(Some(fruit)) = last else {
        panic!("Expected the fruit of the last basket");
    };
    assert_eq!(fruit.get("name"), Some(&Value::from("Orange")));

    // Plain values stay values
    assert_eq!(
        baskets[0].nav(&mut pool, "owner", &options).await,
        Navigated::Value(Value::from("Ann"))
    );

    // A schema entry leads from a fruit to all its baskets
    let navigation = Navigation::new().relation("id", Relation::many("basket", "fruit_id"));
    let Navigated::Many(baskets) =
        navigate(&mut pool, &navigation, &options, "id", Value::Int64(Some(1))).await
    else {
        panic!("Expected the baskets holding apples");
    };
    let mut owners = baskets
        .iter()
        .map(|basket| basket.get_as::<String>("owner").expect("Owners are text"))
        .collect::<Vec<_>>();
    owners.sort();
    assert_eq!(owners, ["Ann", "Bob"]);

    // A failing related query degrades to the value
    let navigation = Navigation::new();
    let result;
    crate::silent_logs! {
        result = navigate(
            &mut pool,
            &navigation,
            &options,
            "warehouse_id",
            Value::Int64(Some(9)),
        )
        .await;
    }
    assert_eq!(result, Navigated::Value(Value::Int64(Some(9))));
}
