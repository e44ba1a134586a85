//! Relational operators.
//!
//! Logical operators describe *what* a plan node computes, physical operators *how*. Both live
//! in [`Operator`] so that plans and memo members can hold either.

use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;

use crate::catalog::Catalog;
use crate::cost::Cost;
use crate::properties::PhysicalPropertySet;

mod aggregate;
pub use aggregate::*;
mod cte;
pub use cte::*;
mod exchange;
pub use exchange::*;
mod filter;
pub use filter::*;
mod join;
pub use join::*;
mod limit;
pub use limit::*;
mod logical;
pub use logical::*;
mod projection;
pub use projection::*;
mod set_op;
pub use set_op::*;
mod sort;
pub use sort::*;
mod table_scan;
pub use table_scan::*;

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

impl Operator {
    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }
}

impl From<LogicalOperator> for Operator {
    fn from(op: LogicalOperator) -> Self {
        Operator::Logical(op)
    }
}

impl From<PhysicalOperator> for Operator {
    fn from(op: PhysicalOperator) -> Self {
        Operator::Physical(op)
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::Logical(op) => write!(f, "{}", op),
            Operator::Physical(op) => write!(f, "{}", op),
        }
    }
}

pub struct DerivePropContext<'a> {
    pub required: &'a PhysicalPropertySet,
    pub input_count: usize,
}

/// One way a physical operator can deliver a property: what it provides when its inputs satisfy
/// `input_required_props`.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivePropResult {
    pub output_prop: PhysicalPropertySet,
    pub input_required_props: Vec<PhysicalPropertySet>,
}

impl DerivePropResult {
    pub fn any(input_count: usize) -> Self {
        Self {
            output_prop: PhysicalPropertySet::default(),
            input_required_props: vec![PhysicalPropertySet::default(); input_count],
        }
    }
}

pub struct CostContext<'a> {
    pub output_rows: f64,
    pub input_rows: &'a [f64],
    pub catalog: &'a dyn Catalog,
}

impl<'a> CostContext<'a> {
    pub fn input_rows(&self, idx: usize) -> f64 {
        self.input_rows.get(idx).copied().unwrap_or(1.0)
    }
}

#[enum_dispatch]
pub trait PhysicalOperatorTrait {
    /// Properties this operator can provide, with the requirements it pushes to its inputs.
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        vec![DerivePropResult::any(context.input_count)]
    }

    /// Local cost, excluding inputs.
    fn cost(&self, context: &CostContext) -> Cost;
}

mod physical;
pub use physical::*;
