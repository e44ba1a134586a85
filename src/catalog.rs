//! Table metadata and statistics consumed by the optimizer.

use std::collections::HashMap;

use crate::expr::ScalarValue;

#[derive(Clone, Debug, PartialEq)]
pub struct TableDef {
    name: String,
    columns: Vec<String>,
    indexes: Vec<IndexDef>,
}

impl TableDef {
    pub fn new<S: Into<String>, C: Into<String>, I: IntoIterator<Item = C>>(
        name: S,
        columns: I,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            indexes: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Index on an ordered list of key columns, only the leading column is used for seeks.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexDef {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

impl IndexDef {
    pub fn new<S: Into<String>, C: Into<String>, I: IntoIterator<Item = C>>(
        name: S,
        columns: I,
        unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn leading_column(&self) -> Option<&str> {
        self.columns.first().map(String::as_str)
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}

/// Equi-depth histogram.
///
/// `bounds` has `n + 1` ascending entries for `n` buckets, each bucket holds the same fraction of
/// rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram {
    bounds: Vec<ScalarValue>,
}

impl Histogram {
    pub fn new(bounds: Vec<ScalarValue>) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &[ScalarValue] {
        &self.bounds
    }

    pub fn num_buckets(&self) -> usize {
        self.bounds.len().saturating_sub(1)
    }
}

/// Most common values and their row frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct McvList {
    values: Vec<(ScalarValue, f64)>,
}

impl McvList {
    pub fn new(values: Vec<(ScalarValue, f64)>) -> Self {
        Self { values }
    }

    pub fn frequency(&self, value: &ScalarValue) -> Option<f64> {
        self.values
            .iter()
            .find(|(v, _)| v == value)
            .map(|(_, freq)| *freq)
    }

    pub fn total_frequency(&self) -> f64 {
        self.values.iter().map(|(_, f)| f).sum()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnStatistics {
    distinct_count: u64,
    null_fraction: f64,
    histogram: Option<Histogram>,
    mcv: Option<McvList>,
}

impl ColumnStatistics {
    pub fn new(distinct_count: u64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
            histogram: None,
            mcv: None,
        }
    }

    pub fn with_histogram(mut self, histogram: Histogram) -> Self {
        self.histogram = Some(histogram);
        self
    }

    pub fn with_mcv(mut self, mcv: McvList) -> Self {
        self.mcv = Some(mcv);
        self
    }

    /// Never returns zero.
    pub fn distinct_count(&self) -> u64 {
        self.distinct_count.max(1)
    }

    pub fn null_fraction(&self) -> f64 {
        self.null_fraction
    }

    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    pub fn mcv(&self) -> Option<&McvList> {
        self.mcv.as_ref()
    }
}

/// Read-only metadata provider.
pub trait Catalog {
    fn table(&self, name: &str) -> Option<&TableDef>;

    /// Estimated number of rows, `None` when the table was never analyzed.
    fn row_count(&self, table: &str) -> Option<f64>;

    fn column_stats(&self, table: &str, column: &str) -> Option<&ColumnStatistics>;
}

#[derive(Default, Debug)]
pub struct InMemoryCatalog {
    tables: HashMap<String, TableDef>,
    row_counts: HashMap<String, f64>,
    column_stats: HashMap<(String, String), ColumnStatistics>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableDef, row_count: f64) -> &mut Self {
        self.row_counts.insert(table.name.clone(), row_count);
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn add_index(&mut self, table: &str, index: IndexDef) -> &mut Self {
        if let Some(t) = self.tables.get_mut(table) {
            t.indexes.push(index);
        }
        self
    }

    pub fn add_column_stats(
        &mut self,
        table: &str,
        column: &str,
        stats: ColumnStatistics,
    ) -> &mut Self {
        self.column_stats
            .insert((table.to_string(), column.to_string()), stats);
        self
    }
}

impl Catalog for InMemoryCatalog {
    fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    fn row_count(&self, table: &str) -> Option<f64> {
        self.row_counts.get(table).copied()
    }

    fn column_stats(&self, table: &str, column: &str) -> Option<&ColumnStatistics> {
        self.column_stats
            .get(&(table.to_string(), column.to_string()))
    }
}
