use itertools::Itertools;

use crate::error::OptResult;
use crate::expr::Expr;
use crate::operator::{Join, LogicalOperator, LogicalOperatorKind};
use crate::optimizer::Optimizer;
use crate::properties::LogicalProperty;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// `A join (B join C) => (A join B) join C` for inner joins.
///
/// Predicates of both joins are pooled and every conjunct is attached to the lowest join that
/// sees all of its columns.
#[derive(Clone, Debug)]
pub struct JoinAssociativityRule {
    pattern: Pattern,
}

impl JoinAssociativityRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::with_children(
                LogicalOperatorKind::LogicalJoin,
                vec![
                    Pattern::Group,
                    Pattern::with_children(
                        LogicalOperatorKind::LogicalJoin,
                        vec![Pattern::Group, Pattern::Group],
                    ),
                ],
            ),
        }
    }
}

impl Default for JoinAssociativityRule {
    fn default() -> Self {
        Self::new()
    }
}

fn inner_join<'a, O: Optimizer>(expr: &'a OptExpression<O>, optimizer: &'a O) -> Option<&'a Join> {
    match expr.get_logical_operator(optimizer) {
        Ok(LogicalOperator::LogicalJoin(join)) if join.is_inner() => Some(join),
        _ => None,
    }
}

impl Rule for JoinAssociativityRule {
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, optimizer: &O) -> bool {
        match input.inputs().get(1) {
            Some(right) => {
                inner_join(input, optimizer).is_some() && inner_join(right, optimizer).is_some()
            }
            None => false,
        }
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let (top, bottom) = match (
            inner_join(&input, optimizer),
            inner_join(input.input(1)?, optimizer),
        ) {
            (Some(top), Some(bottom)) => (top, bottom),
            _ => return Ok(()),
        };

        let a = input.input(0)?;
        let b = input.input(1)?.input(0)?;
        let c = input.input(1)?.input(1)?;
        let lower_prop =
            LogicalProperty::union(&[a.logical_prop(optimizer)?, b.logical_prop(optimizer)?]);

        let (lower, upper): (Vec<Expr>, Vec<Expr>) = top
            .predicate()
            .into_iter()
            .chain(bottom.predicate())
            .flat_map(|p| p.conjuncts())
            .cloned()
            .unique()
            .partition(|conjunct| lower_prop.covers(&conjunct.columns()));

        if optimizer.context().options().disable_cross_join
            && lower.is_empty()
            && bottom.predicate().is_some()
        {
            return Ok(());
        }

        let new_lower = OptExpression::with_operator(
            LogicalOperator::LogicalJoin(Join::inner(Expr::conjunction(lower))),
            vec![a.clone(), b.clone()],
        );
        let new_top = OptExpression::with_operator(
            LogicalOperator::LogicalJoin(Join::inner(Expr::conjunction(upper))),
            vec![new_lower, c.clone()],
        );
        result.add(new_top);
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::JoinAssociativity
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Exploration
    }
}
