use crate::error::OptResult;
use crate::operator::{LogicalOperator, LogicalOperatorKind};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// `A join B => B join A` for inner joins.
#[derive(Clone, Debug)]
pub struct JoinCommutativityRule {
    pattern: Pattern,
}

impl JoinCommutativityRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalJoin),
        }
    }
}

impl Default for JoinCommutativityRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for JoinCommutativityRule {
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, optimizer: &O) -> bool {
        let is_inner = matches!(
            input.get_logical_operator(optimizer),
            Ok(LogicalOperator::LogicalJoin(join)) if join.is_inner()
        );
        if !is_inner || input.inputs().len() != 2 {
            return false;
        }

        // The right side must not depend on columns of the left one.
        match (
            input.inputs()[0].logical_prop(optimizer),
            input.inputs()[1].logical_prop(optimizer),
        ) {
            (Ok(left), Ok(right)) => !right.outer_refs().iter().any(|c| left.contains(c)),
            _ => false,
        }
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let join = input.get_logical_operator(optimizer)?.clone();
        let mut inputs = input.into_inputs();
        inputs.swap(0, 1);
        result.add(OptExpression::with_operator(join, inputs));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::JoinCommutativity
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Exploration
    }
}
