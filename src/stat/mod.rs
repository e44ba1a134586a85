//! Cardinality statistics and estimation.
//!
//! Estimators are versioned: once a version ships its formulas never change, so a plan produced
//! under that version can always be reproduced. Improvements are added as new versions and picked
//! through [`QueryOptions::estimator_version`](crate::options::QueryOptions::estimator_version).

use std::fmt::{Display, Formatter};

mod estimator;
pub use estimator::*;
mod selectivity;
pub use selectivity::*;

/// Derived statistics of a plan node or memo group.
#[derive(Clone, Debug, PartialEq)]
pub struct Statistics {
    row_count: f64,
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self { row_count }
    }

    pub fn row_count(&self) -> f64 {
        self.row_count
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rows={}", self.row_count)
    }
}
