mod adapter;
mod as_value;
mod batch;
mod builder;
mod column;
mod connection;
mod cursor;
mod error;
mod execute;
mod executor;
mod navigation;
mod options;
mod query;
mod record;
mod statement;
mod strategy;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context;
pub use adapter::*;
pub use as_value::*;
pub use batch::*;
pub use builder::*;
pub use column::{ColumnMeta, Columns, QUALIFIER_SEPARATOR, unqualified};
pub use connection::*;
pub use cursor::*;
pub use error::*;
pub use execute::*;
pub use executor::*;
pub use navigation::*;
pub use options::*;
pub use query::*;
pub use record::*;
pub use statement::*;
pub use strategy::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
