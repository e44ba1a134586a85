use std::fmt::{Display, Formatter};

use derive_more::Deref;
use itertools::Itertools;
use strum_macros::Display as StrumDisplay;

use crate::cost::Cost;
use crate::expr::{ColumnRef, Expr};
use crate::operator::{CostContext, PhysicalOperatorTrait};
use crate::properties::LogicalProperty;

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
}

/// Logical join operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Join {
    join_type: JoinType,
    predicate: Option<Expr>,
}

impl Join {
    pub fn new(join_type: JoinType, predicate: Option<Expr>) -> Self {
        Self {
            join_type,
            predicate,
        }
    }

    pub fn inner(predicate: Option<Expr>) -> Self {
        Self::new(JoinType::Inner, predicate)
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn is_inner(&self) -> bool {
        self.join_type == JoinType::Inner
    }

    pub fn predicate(&self) -> Option<&Expr> {
        self.predicate.as_ref()
    }
}

impl Display for Join {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.predicate {
            Some(p) => write!(f, "{} on {}", self.join_type, p),
            None => write!(f, "{} cross", self.join_type),
        }
    }
}

/// A flattened tree of inner joins over any number of inputs, ordered by the join solver.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct JoinBlock {
    predicates: Vec<Expr>,
}

impl JoinBlock {
    pub fn new(predicates: Vec<Expr>) -> Self {
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Expr] {
        &self.predicates
    }
}

impl Display for JoinBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "block on {}", self.predicates.iter().join(" and "))
    }
}

/// Join predicate split into equality keys across both sides and everything else.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinKeys {
    pairs: Vec<(ColumnRef, ColumnRef)>,
    others: Vec<Expr>,
}

impl JoinKeys {
    pub fn extract(
        predicate: Option<&Expr>,
        left: &LogicalProperty,
        right: &LogicalProperty,
    ) -> Self {
        let mut keys = JoinKeys::default();
        for conjunct in predicate.iter().flat_map(|p| p.conjuncts()) {
            match conjunct.as_column_equality() {
                Some((l, r)) if left.contains(l) && right.contains(r) => {
                    keys.pairs.push((l.clone(), r.clone()))
                }
                Some((l, r)) if left.contains(r) && right.contains(l) => {
                    keys.pairs.push((r.clone(), l.clone()))
                }
                _ => keys.others.push(conjunct.clone()),
            }
        }
        keys
    }

    /// `(left column, right column)` equality pairs.
    pub fn pairs(&self) -> &[(ColumnRef, ColumnRef)] {
        &self.pairs
    }

    pub fn others(&self) -> &[Expr] {
        &self.others
    }

    pub fn is_hashable(&self) -> bool {
        !self.pairs.is_empty()
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct HashJoin {
    join: Join,
}

impl HashJoin {
    pub fn new(join: Join) -> Self {
        Self { join }
    }
}

impl PhysicalOperatorTrait for HashJoin {
    /// Builds on the left input, probes with the right.
    fn cost(&self, context: &CostContext) -> Cost {
        let build = context.input_rows(0) * 2.0;
        let probe = context.input_rows(1);
        Cost::from(build + probe + context.output_rows)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct NestedLoopJoin {
    join: Join,
}

impl NestedLoopJoin {
    pub fn new(join: Join) -> Self {
        Self { join }
    }
}

impl PhysicalOperatorTrait for NestedLoopJoin {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from((context.input_rows(0) + 10.0) * (context.input_rows(1) + 10.0))
    }
}
