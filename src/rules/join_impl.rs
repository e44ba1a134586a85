use crate::error::OptResult;
use crate::operator::{
    HashJoin, Join, JoinKeys, LogicalOperator, LogicalOperatorKind, NestedLoopJoin, Operator,
    PhysicalOperator,
};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

fn bound_join<'a, O: Optimizer>(
    input: &'a OptExpression<O>,
    optimizer: &'a O,
) -> Option<&'a Join> {
    match input.get_logical_operator(optimizer) {
        Ok(LogicalOperator::LogicalJoin(join)) => Some(join),
        _ => None,
    }
}

/// Join implemented as a hash join building on the left input.
#[derive(Clone, Debug)]
pub struct HashJoinRule {
    pattern: Pattern,
}

impl HashJoinRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalJoin),
        }
    }
}

impl Default for HashJoinRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for HashJoinRule {
    /// Needs an equality between both sides, and the build side must not feed correlated
    /// subqueries.
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, optimizer: &O) -> bool {
        let join = match bound_join(input, optimizer) {
            Some(join) => join,
            None => return false,
        };
        let (left, right) = match (
            input.input(0).and_then(|i| i.logical_prop(optimizer)),
            input.input(1).and_then(|i| i.logical_prop(optimizer)),
        ) {
            (Ok(left), Ok(right)) => (left, right),
            _ => return false,
        };

        let correlated = optimizer.context().correlated_columns();
        JoinKeys::extract(join.predicate(), left, right).is_hashable()
            && !left.output_columns().iter().any(|c| correlated.contains(c))
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let join = match bound_join(&input, optimizer) {
            Some(join) => join.clone(),
            None => return Ok(()),
        };
        let operator = Operator::Physical(PhysicalOperator::HashJoin(HashJoin::new(join)));
        result.add(OptExpression::with_operator(operator, input.into_inputs()));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::HashJoin
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }
}

/// Join implemented as a nested loop, valid for every join.
#[derive(Clone, Debug)]
pub struct NestedLoopJoinRule {
    pattern: Pattern,
}

impl NestedLoopJoinRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalJoin),
        }
    }
}

impl Default for NestedLoopJoinRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for NestedLoopJoinRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let join = match bound_join(&input, optimizer) {
            Some(join) => join.clone(),
            None => return Ok(()),
        };
        let operator =
            Operator::Physical(PhysicalOperator::NestedLoopJoin(NestedLoopJoin::new(join)));
        result.add(OptExpression::with_operator(operator, input.into_inputs()));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::NestedLoopJoin
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }
}
