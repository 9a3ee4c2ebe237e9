use std::sync::Arc;

/// Column metadata reported by the driver once per result set.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column label as produced by the query (alias if any).
    pub label: String,
    /// Name of the table owning the column, empty when the driver cannot tell
    /// (expressions, aggregates, drivers without column metadata).
    pub table: String,
    /// Type as declared in the schema, empty when unknown.
    pub declared_type: String,
    /// `Some(false)` for NOT NULL columns, `None` when unknown.
    pub nullable: Option<bool>,
}

impl ColumnMeta {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn declared_type(mut self, declared_type: impl Into<String>) -> Self {
        self.declared_type = declared_type.into();
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// `table.label`, or just `label` when the table is unknown.
    pub fn qualified_name(&self) -> String {
        qualify(&self.table, &self.label)
    }
}

/// Shared column metadata of a result set.
pub type Columns = Arc<[ColumnMeta]>;

/// Separator between the table qualifier and the column label in map keys.
pub const QUALIFIER_SEPARATOR: char = '.';

pub(crate) fn qualify(table: &str, label: &str) -> String {
    if table.is_empty() {
        label.to_string()
    } else {
        let mut result = String::with_capacity(table.len() + label.len() + 1);
        result.push_str(table);
        result.push(QUALIFIER_SEPARATOR);
        result.push_str(label);
        result
    }
}

/// Label part of a possibly qualified key.
pub fn unqualified(key: &str) -> &str {
    key.rsplit_once(QUALIFIER_SEPARATOR)
        .map(|(_, label)| label)
        .unwrap_or(key)
}
