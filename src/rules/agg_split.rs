use std::collections::HashMap;

use crate::error::OptResult;
use crate::expr::{BinaryOperator, ColumnRef, Expr};
use crate::operator::{
    Aggregate, AggregateExpr, AggregateFunction, AggregatePhase, LogicalOperator,
    LogicalOperatorKind,
};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// Splits a global aggregate into a derived aggregate over a local one.
///
/// The local aggregate computes partial results (`avg` becomes `sum` and `count`), the derived
/// aggregate merges them and finalizes every original output.
#[derive(Clone, Debug)]
pub struct AggSplitRule {
    pattern: Pattern,
}

impl AggSplitRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalAggregate),
        }
    }
}

impl Default for AggSplitRule {
    fn default() -> Self {
        Self::new()
    }
}

fn partial_column(alias: &str, suffix: &str) -> ColumnRef {
    ColumnRef::unqualified(format!("{}${}", alias, suffix))
}

/// Local and merging aggregate for `partial`, both producing `partial`.
fn partial(
    local: AggregateFunction,
    merge: AggregateFunction,
    arg: Option<&Expr>,
    partial: &ColumnRef,
) -> (AggregateExpr, AggregateExpr) {
    (
        AggregateExpr::new(local, arg.cloned(), partial.name()),
        AggregateExpr::new(merge, Some(Expr::Column(partial.clone())), partial.name()),
    )
}

struct Split {
    local: Vec<AggregateExpr>,
    merged: Vec<AggregateExpr>,
    finalize: Vec<(String, Expr)>,
}

/// `None` when some function cannot be computed in two phases.
fn split(aggregates: &[AggregateExpr]) -> Option<Split> {
    let mut result = Split {
        local: vec![],
        merged: vec![],
        finalize: vec![],
    };

    for agg in aggregates {
        let alias = agg.alias();
        let final_expr = match agg.func() {
            AggregateFunction::CountDistinct => return None,
            AggregateFunction::Avg => {
                let sum = partial_column(alias, "sum");
                let count = partial_column(alias, "count");
                let parts = [
                    (AggregateFunction::Sum, &sum),
                    (AggregateFunction::Count, &count),
                ];
                for (func, column) in parts {
                    let (local, merged) =
                        partial(func, AggregateFunction::Sum, agg.arg(), column);
                    result.local.push(local);
                    result.merged.push(merged);
                }
                Expr::binary(BinaryOperator::Divide, Expr::Column(sum), Expr::Column(count))
            }
            func => {
                let merge = match func {
                    AggregateFunction::Min => AggregateFunction::Min,
                    AggregateFunction::Max => AggregateFunction::Max,
                    _ => AggregateFunction::Sum,
                };
                let column = partial_column(alias, "partial");
                let (local, merged) = partial(func, merge, agg.arg(), &column);
                result.local.push(local);
                result.merged.push(merged);
                Expr::Column(column)
            }
        };
        result.finalize.push((alias.to_string(), final_expr));
    }

    Some(result)
}

impl Rule for AggSplitRule {
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, optimizer: &O) -> bool {
        matches!(
            input.get_logical_operator(optimizer),
            Ok(LogicalOperator::LogicalAggregate(agg)) if agg.phase() == AggregatePhase::Global
        )
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let agg = match input.get_logical_operator(optimizer)? {
            LogicalOperator::LogicalAggregate(agg) => agg,
            _ => return Ok(()),
        };
        let split = match split(agg.aggregates()) {
            Some(split) => split,
            None => return Ok(()),
        };

        let finals: HashMap<ColumnRef, Expr> = split
            .finalize
            .iter()
            .map(|(alias, e)| (ColumnRef::unqualified(alias.clone()), e.clone()))
            .collect();
        let having = agg.having().map(|h| {
            h.transform(&|e| match e {
                Expr::Column(c) => finals.get(c).cloned(),
                _ => None,
            })
        });

        let local = Aggregate::new(agg.group_by().to_vec(), split.local)
            .with_phase(AggregatePhase::Local);
        let derived = Aggregate::new(agg.group_by().to_vec(), split.merged)
            .with_phase(AggregatePhase::Derived)
            .with_having(having)
            .with_finalize(split.finalize);

        let inputs = input.into_inputs();
        result.add(OptExpression::with_operator(
            LogicalOperator::LogicalAggregate(derived),
            vec![OptExpression::with_operator(
                LogicalOperator::LogicalAggregate(local),
                inputs,
            )],
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::AggSplit
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Exploration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_split_sum_and_avg() {
        let split = split(&[
            AggregateExpr::new(AggregateFunction::Sum, Some(col("t", "a")), "s"),
            AggregateExpr::new(AggregateFunction::Avg, Some(col("t", "b")), "m"),
        ])
        .unwrap();

        let local: Vec<String> = split.local.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            vec!["sum(t.a) as s$partial", "sum(t.b) as m$sum", "count(t.b) as m$count"],
            local
        );
        let merged: Vec<String> = split.merged.iter().map(|a| a.to_string()).collect();
        assert_eq!(
            vec![
                "sum(s$partial) as s$partial",
                "sum(m$sum) as m$sum",
                "sum(m$count) as m$count"
            ],
            merged
        );
        assert_eq!(
            vec![
                ("s".to_string(), Expr::Column(ColumnRef::unqualified("s$partial"))),
                (
                    "m".to_string(),
                    Expr::binary(
                        BinaryOperator::Divide,
                        Expr::Column(ColumnRef::unqualified("m$sum")),
                        Expr::Column(ColumnRef::unqualified("m$count"))
                    )
                )
            ],
            split.finalize
        );
    }

    #[test]
    fn test_count_distinct_is_not_split() {
        assert!(split(&[AggregateExpr::new(
            AggregateFunction::CountDistinct,
            Some(col("t", "a")),
            "c"
        )])
        .is_none());
    }
}
