use crate::{
    ColumnMeta, ColumnSource, Failure, KeyedBuilder, Record, Result, ResultSetBuilder, Row,
    RowBuilder, RowNames, Strategy, Table, Value, column::qualify,
};
use std::{fmt, sync::Arc};

/// Name transformation applied to table qualifiers or column labels.
pub type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Builder of [`Record`] rows.
///
/// Columns whose names collide (for example after a case-folding transform)
/// share the same key, the last column wins.
#[derive(Debug, Clone)]
pub struct MapBuilder {
    keys: RowNames,
    slots: Box<[usize]>,
}

impl MapBuilder {
    /// One name per column, in column order.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let mut keys: Vec<String> = Vec::new();
        let mut slots = Vec::new();
        for name in names {
            let slot = match keys.iter().position(|k| *k == name) {
                Some(slot) => slot,
                None => {
                    keys.push(name);
                    keys.len() - 1
                }
            };
            slots.push(slot);
        }
        Self {
            keys: keys.into(),
            slots: slots.into(),
        }
    }

    pub fn keys(&self) -> &RowNames {
        &self.keys
    }
}

impl RowBuilder for MapBuilder {
    type Row = Record;
    type RowAcc = Vec<Value>;

    fn begin_row(&self) -> Vec<Value> {
        vec![Value::Null; self.keys.len()]
    }

    fn with_column(
        &self,
        mut acc: Vec<Value>,
        source: &dyn ColumnSource,
        index: usize,
    ) -> Result<Vec<Value>> {
        let Some(&slot) = index.checked_sub(1).and_then(|i| self.slots.get(i)) else {
            return Err(Failure::misuse(format!(
                "Column index {} is out of range, the builder has {} columns",
                index,
                self.slots.len()
            )));
        };
        acc[slot] = source.column(index)?;
        Ok(acc)
    }

    fn finish_row(&self, acc: Vec<Value>) -> Result<Record> {
        Ok(Record::new(self.keys.clone(), acc.into()))
    }
}

impl ResultSetBuilder for MapBuilder {
    type Set = Vec<Record>;
    type SetAcc = Vec<Record>;

    fn begin_set(&self) -> Vec<Record> {
        Vec::new()
    }

    fn with_row(&self, mut acc: Vec<Record>, row: Record) -> Vec<Record> {
        acc.push(row);
        acc
    }

    fn finish_set(&self, acc: Vec<Record>) -> Result<Vec<Record>> {
        Ok(acc)
    }
}

impl KeyedBuilder for MapBuilder {
    fn column_index(&self, key: &str) -> Option<usize> {
        let slot = self.keys.iter().position(|k| k == key)?;
        self.slots.iter().rposition(|s| *s == slot).map(|i| i + 1)
    }

    fn lookup<'r>(&self, row: &'r Record, key: &str) -> Option<&'r Value> {
        row.get(key)
    }
}

fn map_names<'a>(
    columns: &'a [ColumnMeta],
    qualified: bool,
    qualifier_fn: &'a dyn Fn(&str) -> String,
    label_fn: &'a dyn Fn(&str) -> String,
) -> impl Iterator<Item = String> + 'a {
    columns.iter().map(move |column| {
        let label = label_fn(&column.label);
        if qualified && !column.table.is_empty() {
            qualify(&qualifier_fn(&column.table), &label)
        } else {
            label
        }
    })
}

fn same(value: &str) -> String {
    value.to_string()
}

fn lower(value: &str) -> String {
    value.to_ascii_lowercase()
}

/// Rows as [`Record`]s keyed by `table.label`, or `label` when the driver
/// reports no table.
#[derive(Default, Debug, Clone, Copy)]
pub struct AsMaps;

impl Strategy for AsMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        Ok(MapBuilder::new(map_names(columns, true, &same, &same)))
    }
}

/// Rows as [`Record`]s keyed by column label.
#[derive(Default, Debug, Clone, Copy)]
pub struct AsUnqualifiedMaps;

impl Strategy for AsUnqualifiedMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        Ok(MapBuilder::new(map_names(columns, false, &same, &same)))
    }
}

/// Like [`AsMaps`] with ASCII lower-cased tables and labels.
#[derive(Default, Debug, Clone, Copy)]
pub struct AsLowerMaps;

impl Strategy for AsLowerMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        Ok(MapBuilder::new(map_names(columns, true, &lower, &lower)))
    }
}

/// Like [`AsUnqualifiedMaps`] with ASCII lower-cased labels.
#[derive(Default, Debug, Clone, Copy)]
pub struct AsUnqualifiedLowerMaps;

impl Strategy for AsUnqualifiedLowerMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        Ok(MapBuilder::new(map_names(columns, false, &lower, &lower)))
    }
}

/// Qualified map rows with caller supplied transforms for the table qualifier
/// and the column label. Both are required.
#[derive(Default, Clone)]
pub struct AsModifiedMaps {
    qualifier_fn: Option<Transform>,
    label_fn: Option<Transform>,
}

impl AsModifiedMaps {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn qualifier_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.qualifier_fn = Some(Arc::new(f));
        self
    }
    pub fn label_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.label_fn = Some(Arc::new(f));
        self
    }
}

impl Strategy for AsModifiedMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        let (Some(qualifier_fn), Some(label_fn)) = (&self.qualifier_fn, &self.label_fn) else {
            return Err(Failure::configuration(
                "Modified maps require both a qualifier function and a label function",
            ));
        };
        Ok(MapBuilder::new(map_names(
            columns,
            true,
            qualifier_fn.as_ref(),
            label_fn.as_ref(),
        )))
    }
}

impl fmt::Debug for AsModifiedMaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsModifiedMaps")
            .field("qualifier_fn", &self.qualifier_fn.is_some())
            .field("label_fn", &self.label_fn.is_some())
            .finish()
    }
}

/// Unqualified map rows with a caller supplied label transform, which is required.
#[derive(Default, Clone)]
pub struct AsUnqualifiedModifiedMaps {
    label_fn: Option<Transform>,
}

impl AsUnqualifiedModifiedMaps {
    pub fn new() -> Self {
        Default::default()
    }
    pub fn label_fn(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.label_fn = Some(Arc::new(f));
        self
    }
}

impl Strategy for AsUnqualifiedModifiedMaps {
    type Builder = MapBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<MapBuilder> {
        let Some(label_fn) = &self.label_fn else {
            return Err(Failure::configuration(
                "Unqualified modified maps require a label function",
            ));
        };
        Ok(MapBuilder::new(map_names(
            columns,
            false,
            &same,
            label_fn.as_ref(),
        )))
    }
}

impl fmt::Debug for AsUnqualifiedModifiedMaps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsUnqualifiedModifiedMaps")
            .field("label_fn", &self.label_fn.is_some())
            .finish()
    }
}

/// Builder of positional rows collected into a [`Table`].
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    columns: RowNames,
}

impl ArrayBuilder {
    pub fn new(columns: impl IntoIterator<Item = String>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }
}

impl RowBuilder for ArrayBuilder {
    type Row = Row;
    type RowAcc = Vec<Value>;

    fn begin_row(&self) -> Vec<Value> {
        Vec::with_capacity(self.columns.len())
    }

    fn with_column(
        &self,
        mut acc: Vec<Value>,
        source: &dyn ColumnSource,
        index: usize,
    ) -> Result<Vec<Value>> {
        acc.push(source.column(index)?);
        Ok(acc)
    }

    fn finish_row(&self, acc: Vec<Value>) -> Result<Row> {
        Ok(acc.into())
    }
}

impl ResultSetBuilder for ArrayBuilder {
    type Set = Table;
    type SetAcc = Vec<Row>;

    fn begin_set(&self) -> Vec<Row> {
        Vec::new()
    }

    fn with_row(&self, mut acc: Vec<Row>, row: Row) -> Vec<Row> {
        acc.push(row);
        acc
    }

    fn finish_set(&self, acc: Vec<Row>) -> Result<Table> {
        Ok(Table {
            columns: self.columns.clone(),
            rows: acc,
        })
    }
}

impl KeyedBuilder for ArrayBuilder {
    fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == key).map(|i| i + 1)
    }

    fn lookup<'r>(&self, row: &'r Row, key: &str) -> Option<&'r Value> {
        self.column_index(key).and_then(|i| row.get(i - 1))
    }
}

/// Rows as value vectors, names qualified like [`AsMaps`].
#[derive(Default, Debug, Clone, Copy)]
pub struct AsArrays;

impl Strategy for AsArrays {
    type Builder = ArrayBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<ArrayBuilder> {
        Ok(ArrayBuilder::new(map_names(columns, true, &same, &same)))
    }
}

/// Rows as value vectors, names unqualified.
#[derive(Default, Debug, Clone, Copy)]
pub struct AsUnqualifiedArrays;

impl Strategy for AsUnqualifiedArrays {
    type Builder = ArrayBuilder;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<ArrayBuilder> {
        Ok(ArrayBuilder::new(map_names(columns, false, &same, &same)))
    }
}

/// Wraps a strategy replacing how column values are read from the cursor,
/// for example to decode driver specific types.
pub struct Adapted<S, F> {
    inner: S,
    reader: Arc<F>,
}

impl<S, F> Adapted<S, F>
where
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    pub fn new(inner: S, reader: F) -> Self {
        Self {
            inner,
            reader: Arc::new(reader),
        }
    }
}

impl<S: Clone, F> Clone for Adapted<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            reader: self.reader.clone(),
        }
    }
}

pub struct AdaptedBuilder<B, F> {
    inner: B,
    reader: Arc<F>,
}

struct ReadingSource<'a, F> {
    source: &'a dyn ColumnSource,
    reader: &'a F,
}

impl<F> ColumnSource for ReadingSource<'_, F>
where
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    fn columns(&self) -> &[ColumnMeta] {
        self.source.columns()
    }

    fn column(&self, index: usize) -> Result<Value> {
        (self.reader)(self.source, index)
    }
}

impl<S, F> Strategy for Adapted<S, F>
where
    S: Strategy,
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    type Builder = AdaptedBuilder<S::Builder, F>;

    fn builder(&self, columns: &[ColumnMeta]) -> Result<Self::Builder> {
        Ok(AdaptedBuilder {
            inner: self.inner.builder(columns)?,
            reader: self.reader.clone(),
        })
    }
}

impl<B, F> RowBuilder for AdaptedBuilder<B, F>
where
    B: RowBuilder,
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    type Row = B::Row;
    type RowAcc = B::RowAcc;

    fn begin_row(&self) -> B::RowAcc {
        self.inner.begin_row()
    }

    fn with_column(
        &self,
        acc: B::RowAcc,
        source: &dyn ColumnSource,
        index: usize,
    ) -> Result<B::RowAcc> {
        let source = ReadingSource {
            source,
            reader: self.reader.as_ref(),
        };
        self.inner.with_column(acc, &source, index)
    }

    fn finish_row(&self, acc: B::RowAcc) -> Result<B::Row> {
        self.inner.finish_row(acc)
    }
}

impl<B, F> ResultSetBuilder for AdaptedBuilder<B, F>
where
    B: ResultSetBuilder,
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    type Set = B::Set;
    type SetAcc = B::SetAcc;

    fn begin_set(&self) -> B::SetAcc {
        self.inner.begin_set()
    }

    fn with_row(&self, acc: B::SetAcc, row: B::Row) -> B::SetAcc {
        self.inner.with_row(acc, row)
    }

    fn finish_set(&self, acc: B::SetAcc) -> Result<B::Set> {
        self.inner.finish_set(acc)
    }
}

impl<B, F> KeyedBuilder for AdaptedBuilder<B, F>
where
    B: KeyedBuilder,
    F: Fn(&dyn ColumnSource, usize) -> Result<Value> + Send + Sync,
{
    fn column_index(&self, key: &str) -> Option<usize> {
        self.inner.column_index(key)
    }

    fn lookup<'r>(&self, row: &'r B::Row, key: &str) -> Option<&'r Value> {
        self.inner.lookup(row, key)
    }

    fn read(&self, source: &dyn ColumnSource, index: usize) -> Result<Value> {
        (self.reader)(source, index)
    }
}
