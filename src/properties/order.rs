use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::expr::ColumnRef;
use crate::properties::PhysicalProp;

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SortKey {
    pub column: ColumnRef,
    pub ascending: bool,
}

impl SortKey {
    pub fn asc(column: ColumnRef) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: ColumnRef) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}

/// Sort order of rows, empty means no order.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct SortOrder(Vec<SortKey>);

impl SortOrder {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PhysicalProp for SortOrder {
    /// Rows sorted on `a, b` are also sorted on `a`.
    fn satisfies(&self, required: &Self) -> bool {
        self.0.starts_with(&required.0)
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}
