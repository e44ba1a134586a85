use std::fmt::{Display, Formatter};

use derive_more::Deref;

use crate::cost::Cost;
use crate::operator::{CostContext, PhysicalOperatorTrait};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Limit {
    limit: usize,
}

impl Limit {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Display for Limit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.limit)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalLimit {
    limit: Limit,
}

impl PhysicalLimit {
    pub fn new(limit: Limit) -> Self {
        Self { limit }
    }
}

impl PhysicalOperatorTrait for PhysicalLimit {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}
