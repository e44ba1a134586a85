use std::fmt::{Display, Formatter};

use derive_more::Deref;

use crate::cost::Cost;
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};
use crate::properties::{PhysicalPropertySet, SortOrder};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Sort {
    order: SortOrder,
}

impl Sort {
    pub fn new(order: SortOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &SortOrder {
        &self.order
    }
}

impl Display for Sort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.order)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalSort {
    sort: Sort,
}

impl PhysicalSort {
    pub fn new(sort: Sort) -> Self {
        Self { sort }
    }
}

impl PhysicalOperatorTrait for PhysicalSort {
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        vec![DerivePropResult {
            output_prop: PhysicalPropertySet::default().with_order(self.sort.order().clone()),
            input_required_props: vec![PhysicalPropertySet::default(); context.input_count],
        }]
    }

    fn cost(&self, context: &CostContext) -> Cost {
        let rows = context.input_rows(0).max(1.0);
        Cost::from(rows * (0.1 + rows.ln()))
    }
}
