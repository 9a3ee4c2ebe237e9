use crate::{ColumnMeta, ColumnSource, Cursor, Result, Value};

/// Assembles one row from the column the cursor is positioned on.
///
/// Callers invoke `with_column` exactly once per column, for every index from 1
/// to the column count in ascending order, between `begin_row` and
/// `finish_row`. [`build_row`] does exactly that.
pub trait RowBuilder: Send + Sync {
    type Row: Send;
    type RowAcc: Send;

    fn begin_row(&self) -> Self::RowAcc;
    /// Read column `index` (from 1) of `source` and fold it into the accumulator.
    fn with_column(
        &self,
        acc: Self::RowAcc,
        source: &dyn ColumnSource,
        index: usize,
    ) -> Result<Self::RowAcc>;
    fn finish_row(&self, acc: Self::RowAcc) -> Result<Self::Row>;
}

/// Assembles a collection out of rows.
pub trait ResultSetBuilder: RowBuilder {
    type Set: Send;
    type SetAcc: Send;

    fn begin_set(&self) -> Self::SetAcc;
    fn with_row(&self, acc: Self::SetAcc, row: Self::Row) -> Self::SetAcc;
    fn finish_set(&self, acc: Self::SetAcc) -> Result<Self::Set>;
}

/// Builders whose rows can be read by key, both from a live cursor and from a
/// materialized row. Required by the row adapter point lookups.
pub trait KeyedBuilder: RowBuilder {
    /// Column (from 1) holding the value of `key`.
    fn column_index(&self, key: &str) -> Option<usize>;
    fn lookup<'r>(&self, row: &'r Self::Row, key: &str) -> Option<&'r Value>;
    /// Read a single column the same way `with_column` would.
    fn read(&self, source: &dyn ColumnSource, index: usize) -> Result<Value> {
        source.column(index)
    }
}

/// A materialization strategy: creates the builder for a result set once its
/// columns are known.
///
/// Pass a strategy value to select how rows come out; implement it to get rows
/// of any custom type.
pub trait Strategy: Send + Sync {
    type Builder: ResultSetBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<Self::Builder>;
}

/// Row type produced by a strategy.
pub type RowOf<S> = <<S as Strategy>::Builder as RowBuilder>::Row;
/// Collection type produced by a strategy.
pub type SetOf<S> = <<S as Strategy>::Builder as ResultSetBuilder>::Set;

/// Materialize the row `source` is positioned on.
pub fn build_row<B: RowBuilder + ?Sized>(builder: &B, source: &dyn ColumnSource) -> Result<B::Row> {
    let mut acc = builder.begin_row();
    for index in 1..=source.columns().len() {
        acc = builder.with_column(acc, source, index)?;
    }
    builder.finish_row(acc)
}

/// Materialize every remaining row of `cursor`.
pub async fn build_set<B: ResultSetBuilder, C: Cursor>(builder: &B, cursor: &mut C) -> Result<B::Set> {
    let mut acc = builder.begin_set();
    while cursor.advance().await? {
        let row = build_row(builder, &*cursor)?;
        acc = builder.with_row(acc, row);
    }
    builder.finish_set(acc)
}

/// Materialize the first row of `cursor` only.
pub async fn build_first<B: RowBuilder, C: Cursor>(
    builder: &B,
    cursor: &mut C,
) -> Result<Option<B::Row>> {
    if cursor.advance().await? {
        build_row(builder, &*cursor).map(Some)
    } else {
        Ok(None)
    }
}
