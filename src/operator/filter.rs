use std::fmt::{Display, Formatter};

use derive_more::Deref;

use crate::cost::Cost;
use crate::expr::Expr;
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &Expr {
        &self.predicate
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.predicate)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalFilter {
    filter: Filter,
}

impl PhysicalFilter {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }
}

impl PhysicalOperatorTrait for PhysicalFilter {
    /// Filtering keeps whatever order and distribution its input has.
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        vec![DerivePropResult {
            output_prop: context.required.clone(),
            input_required_props: vec![context.required.clone()],
        }]
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.input_rows(0))
    }
}
