use std::collections::{BTreeMap, BTreeSet};

use crate::expr::ColumnRef;

/// Column of a catalog table an output column was read from.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BaseColumn {
    pub table: String,
    pub column: String,
}

impl BaseColumn {
    pub fn new<T: Into<String>, C: Into<String>>(table: T, column: C) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Properties shared by all members of a group.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LogicalProperty {
    output_columns: Vec<ColumnRef>,
    /// Columns used in the subtree but produced outside of it.
    outer_refs: BTreeSet<ColumnRef>,
    lineage: BTreeMap<ColumnRef, BaseColumn>,
    /// Table aliases scanned in the subtree.
    relations: BTreeSet<String>,
}

impl LogicalProperty {
    pub fn new(output_columns: Vec<ColumnRef>) -> Self {
        Self {
            output_columns,
            ..Default::default()
        }
    }

    /// Property of a join, the concatenation of all inputs.
    pub fn union(inputs: &[&LogicalProperty]) -> Self {
        let mut prop = LogicalProperty::default();
        for input in inputs {
            prop.output_columns
                .extend(input.output_columns.iter().cloned());
            prop.lineage
                .extend(input.lineage.iter().map(|(k, v)| (k.clone(), v.clone())));
            prop.relations.extend(input.relations.iter().cloned());
        }
        prop
    }

    pub fn with_lineage(mut self, column: ColumnRef, base: BaseColumn) -> Self {
        self.lineage.insert(column, base);
        self
    }

    pub fn with_outer_refs(mut self, outer_refs: BTreeSet<ColumnRef>) -> Self {
        self.outer_refs = outer_refs;
        self
    }

    pub fn with_relation<S: Into<String>>(mut self, relation: S) -> Self {
        self.relations.insert(relation.into());
        self
    }

    pub fn with_relations(mut self, relations: BTreeSet<String>) -> Self {
        self.relations.extend(relations);
        self
    }

    pub(crate) fn set_output_columns(&mut self, columns: Vec<ColumnRef>) {
        self.output_columns = columns;
    }

    pub fn output_columns(&self) -> &[ColumnRef] {
        &self.output_columns
    }

    pub fn outer_refs(&self) -> &BTreeSet<ColumnRef> {
        &self.outer_refs
    }

    pub fn relations(&self) -> &BTreeSet<String> {
        &self.relations
    }

    pub fn contains(&self, column: &ColumnRef) -> bool {
        self.output_columns.contains(column)
    }

    /// Whether every column in `columns` is an output of this relation.
    pub fn covers<'a, I: IntoIterator<Item = &'a ColumnRef>>(&self, columns: I) -> bool {
        columns.into_iter().all(|c| self.contains(c))
    }

    pub fn base_column(&self, column: &ColumnRef) -> Option<&BaseColumn> {
        self.lineage.get(column)
    }

    /// Same relation exposed under another alias, as a CTE reference does.
    pub fn renamed(&self, alias: &str) -> Self {
        let rename = |c: &ColumnRef| c.with_relation(alias);
        Self {
            output_columns: self.output_columns.iter().map(rename).collect(),
            outer_refs: self.outer_refs.clone(),
            lineage: self
                .lineage
                .iter()
                .map(|(c, base)| (rename(c), base.clone()))
                .collect(),
            relations: std::iter::once(alias.to_string()).collect(),
        }
    }
}
