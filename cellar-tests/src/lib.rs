mod batch;
mod executors;
mod fruit;
#[cfg(not(feature = "disable-generated-keys"))]
mod keys;
#[cfg(not(feature = "disable-multiple-statements"))]
mod multiple;
mod navigation;
#[cfg(not(feature = "disable-transactions"))]
mod transaction;

use crate::{batch::batch, executors::executors, fruit::fruit, navigation::navigation};
use cellar::{DataSource, Executor, Options, QueryResult, execute_one};
#[cfg(not(feature = "disable-generated-keys"))]
use keys::keys;
use log::LevelFilter;
#[cfg(not(feature = "disable-multiple-statements"))]
use multiple::multiple;
use std::env;
#[cfg(not(feature = "disable-transactions"))]
use transaction::transaction;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every scenario against `source`. Each scenario opens its own
/// connections and creates the tables it needs.
pub async fn execute_tests<D: DataSource>(source: D) {
    fruit(&source).await;
    navigation(&source).await;
    executors(&source).await;
    batch(&source).await;
    #[cfg(not(feature = "disable-generated-keys"))]
    keys(&source).await;
    #[cfg(not(feature = "disable-multiple-statements"))]
    multiple(&source).await;
    #[cfg(not(feature = "disable-transactions"))]
    transaction(&source).await;
}

/// Rows currently in `table`.
pub(crate) async fn count<X: Executor>(executor: &mut X, table: &str) -> i64 {
    let result = execute_one(
        executor,
        format!("SELECT COUNT(*) AS total FROM {}", table),
        &Options::new().strategy(cellar::AsUnqualifiedMaps),
    )
    .await
    .expect("Could not count the rows");
    let QueryResult::Rows(Some(row)) = result else {
        panic!("The count query did not return a row");
    };
    row.get_as::<i64>("total")
        .expect("The count is not an integer")
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
