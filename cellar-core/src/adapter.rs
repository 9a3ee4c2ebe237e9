use crate::{
    ColumnSource, Failure, KeyedBuilder, KeyedRow, Navigable, Navigation, Record, Result,
    RowBuilder, Value, build_row,
};
use std::sync::Arc;

enum State<'c, R> {
    Bound(&'c dyn ColumnSource),
    Materialized(R),
}

/// Lazy view of the row a cursor is positioned on.
///
/// Point lookups (`get`, `contains_key`) read single columns straight from the
/// cursor. Anything that needs the whole row materializes it through the
/// builder first, after which the adapter holds an immutable snapshot and never
/// touches the cursor again.
///
/// The adapter borrows the cursor, so it cannot outlive the position it was
/// created on.
pub struct RowAdapter<'c, B: RowBuilder> {
    builder: &'c B,
    state: State<'c, B::Row>,
}

impl<'c, B: RowBuilder> RowAdapter<'c, B> {
    pub fn bound(builder: &'c B, source: &'c dyn ColumnSource) -> Self {
        Self {
            builder,
            state: State::Bound(source),
        }
    }

    pub fn is_materialized(&self) -> bool {
        matches!(self.state, State::Materialized(..))
    }

    /// Build the full row, once. Read failures propagate.
    pub fn materialize(&mut self) -> Result<&B::Row> {
        if let State::Bound(source) = self.state {
            self.state = State::Materialized(build_row(self.builder, source)?);
        }
        match &self.state {
            State::Materialized(row) => Ok(row),
            State::Bound(..) => Err(Failure::misuse("The row was not materialized")),
        }
    }

    pub fn into_row(self) -> Result<B::Row> {
        match self.state {
            State::Bound(source) => build_row(self.builder, source),
            State::Materialized(row) => Ok(row),
        }
    }

    /// Structural comparison with a materialized row.
    pub fn matches(&mut self, other: &B::Row) -> Result<bool>
    where
        B::Row: PartialEq,
    {
        Ok(self.materialize()? == other)
    }

    /// Materialize and attach the navigation metadata.
    pub fn navigable(&mut self, navigation: Arc<Navigation>) -> Result<Navigable<B::Row>>
    where
        B::Row: KeyedRow + Clone,
    {
        Ok(Navigable::new(self.materialize()?.clone(), navigation))
    }
}

impl<B: KeyedBuilder> RowAdapter<'_, B> {
    /// Value at `key`. Unknown keys and columns that fail to read are both
    /// reported as absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        match &self.state {
            State::Materialized(row) => self.builder.lookup(row, key).cloned(),
            State::Bound(source) => {
                let index = self.builder.column_index(key)?;
                match self.builder.read(*source, index) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        log::debug!("Could not read column `{}`: {:#}", key, e);
                        None
                    }
                }
            }
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        match &self.state {
            State::Materialized(row) => self.builder.lookup(row, key).is_some(),
            State::Bound(..) => self.builder.column_index(key).is_some(),
        }
    }
}

impl<B: RowBuilder<Row = Record>> RowAdapter<'_, B> {
    pub fn iter(&mut self) -> Result<impl Iterator<Item = (&str, &Value)>> {
        Ok(self.materialize()?.iter())
    }

    /// Materialized copy with `key` set to `value`.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Result<Record> {
        Ok(self.into_row()?.with(key, value))
    }

    /// Materialized copy without `key`.
    pub fn without(self, key: &str) -> Result<Record> {
        Ok(self.into_row()?.without(key))
    }
}
