//! Join order enumeration.
//!
//! A join block (a flattened tree of inner joins) is turned into a [`JoinGraph`] whose vertices
//! are the block inputs and whose edges are the block conjuncts. [`solve`] enumerates connected
//! subgraph/complement pairs with DPccp and returns the cheapest bushy tree, never introducing a
//! cross product that the graph does not require.

use std::fmt::{Display, Formatter};

use crate::cost::Cost;
use crate::error::OptResult;
use crate::operator::{HashJoin, Join, NestedLoopJoin, PhysicalOperator};
use crate::optimizer::OptimizerContext;

mod dpccp;
pub use dpccp::*;
mod graph;
pub use graph::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JoinMethod {
    Hash,
    NestedLoop,
}

/// A join tree over the relations of a block.
#[derive(Clone, Debug, PartialEq)]
pub enum JoinTree {
    /// Index of the relation in the block.
    Leaf(usize),
    Join {
        method: JoinMethod,
        join: Join,
        left: Box<JoinTree>,
        right: Box<JoinTree>,
    },
}

impl JoinTree {
    /// Physical operator of the tree root, `None` for a leaf.
    pub fn physical_operator(&self) -> Option<PhysicalOperator> {
        match self {
            JoinTree::Leaf(_) => None,
            JoinTree::Join { method, join, .. } => Some(match method {
                JoinMethod::Hash => HashJoin::new(join.clone()).into(),
                JoinMethod::NestedLoop => NestedLoopJoin::new(join.clone()).into(),
            }),
        }
    }

    /// Relation indexes in left to right order.
    pub fn leaves(&self) -> Vec<usize> {
        match self {
            JoinTree::Leaf(idx) => vec![*idx],
            JoinTree::Join { left, right, .. } => {
                let mut leaves = left.leaves();
                leaves.extend(right.leaves());
                leaves
            }
        }
    }
}

impl Display for JoinTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinTree::Leaf(idx) => write!(f, "#{}", idx),
            JoinTree::Join {
                method,
                left,
                right,
                ..
            } => {
                let method = match method {
                    JoinMethod::Hash => "HJ",
                    JoinMethod::NestedLoop => "NLJ",
                };
                write!(f, "({} {} {})", left, method, right)
            }
        }
    }
}

/// Cheapest tree found for a join block.
#[derive(Clone, Debug)]
pub struct SolvedJoin {
    pub tree: JoinTree,
    pub rows: f64,
    /// Cost of the joins, the relations themselves are costed by their own groups.
    pub cost: Cost,
}

/// Best bushy join tree of `graph` found by DPccp, `None` when no enabled join implementation
/// can join some required pair.
pub fn solve(context: &OptimizerContext, graph: &JoinGraph) -> OptResult<Option<SolvedJoin>> {
    JoinOrderSolver::new(context, graph).solve()
}

/// Cost of the best tree found by exhaustively splitting every connected subset, for checking
/// [`solve`].
pub fn brute_force_cost(context: &OptimizerContext, graph: &JoinGraph) -> OptResult<Option<Cost>> {
    Ok(JoinOrderSolver::new(context, graph)
        .brute_force()?
        .map(|solved| solved.cost))
}
