use std::fmt::{Display, Formatter};

use derive_more::Deref;

use crate::cost::Cost;
use crate::operator::{CostContext, PhysicalOperatorTrait};

/// `UNION ALL` of any number of inputs with compatible columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Append {}

impl Append {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Append {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "all")
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalAppend {
    append: Append,
}

impl PhysicalAppend {
    pub fn new(append: Append) -> Self {
        Self { append }
    }
}

impl PhysicalOperatorTrait for PhysicalAppend {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}
