use crate::error::{OptResult, OptimizerError};
use crate::join_order::{solve, JoinGraph, JoinRelation, JoinTree};
use crate::operator::{LogicalOperator, LogicalOperatorKind};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// Orders a join block with DPccp.
///
/// The root of the best tree becomes a physical join of the block's group. Joins below it are
/// emitted as logical joins, so they end up in groups of their own and are implemented and costed
/// like any other join.
#[derive(Clone, Debug)]
pub struct JoinBlockRule {
    pattern: Pattern,
}

impl JoinBlockRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalJoinBlock),
        }
    }
}

impl Default for JoinBlockRule {
    fn default() -> Self {
        Self::new()
    }
}

fn logical_tree<O: Optimizer>(
    tree: &JoinTree,
    relations: &[OptExpression<O>],
) -> OptResult<OptExpression<O>> {
    match tree {
        JoinTree::Leaf(idx) => relations.get(*idx).cloned().ok_or_else(|| {
            OptimizerError::InternalError(format!("join tree refers to missing input {}", idx))
                .into()
        }),
        JoinTree::Join {
            join, left, right, ..
        } => Ok(OptExpression::with_operator(
            LogicalOperator::LogicalJoin(join.clone()),
            vec![logical_tree(left, relations)?, logical_tree(right, relations)?],
        )),
    }
}

impl Rule for JoinBlockRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let predicates = match input.get_logical_operator(optimizer)? {
            LogicalOperator::LogicalJoinBlock(block) => block.predicates().to_vec(),
            _ => return Ok(()),
        };

        let relations = input
            .inputs()
            .iter()
            .map(|i| {
                Ok(JoinRelation::new(
                    i.logical_prop(optimizer)?.clone(),
                    i.statistics(optimizer)?.row_count(),
                ))
            })
            .collect::<OptResult<Vec<_>>>()?;
        let graph = JoinGraph::new(relations, &predicates)?;
        let solved = match solve(optimizer.context(), &graph)? {
            Some(solved) => solved,
            None => return Ok(()),
        };

        let inputs = input.into_inputs();
        if let JoinTree::Join { left, right, .. } = &solved.tree {
            if let Some(top) = solved.tree.physical_operator() {
                result.add(OptExpression::with_operator(
                    top,
                    vec![logical_tree(left, &inputs)?, logical_tree(right, &inputs)?],
                ));
            }
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::JoinBlock
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }
}
