use std::fmt::{Debug, Formatter};

use crate::error::OptResult;
use crate::operator::*;
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// Builds the physical counterpart of a logical operator, `None` for another kind.
pub type Factory = fn(&LogicalOperator) -> Option<PhysicalOperator>;

/// One-to-one implementation of a logical operator kind taking a fixed number of inputs.
#[derive(Clone)]
pub struct ImplementationRule {
    id: RuleId,
    arity: Arity,
    factory: Factory,
    pattern: Pattern,
}

impl Debug for ImplementationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplementationRule")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .field("pattern", &self.pattern)
            .finish()
    }
}

fn factories() -> Vec<(RuleId, LogicalOperatorKind, Arity, Factory)> {
    use LogicalOperatorKind as Kind;

    let factories: [(RuleId, Kind, Arity, Factory); 16] = [
        (RuleId::TableScanImpl, Kind::LogicalScan, Arity::Exactly(0), |op| {
            Some(PhysicalTableScan::new(op.as_logical_scan()?.clone()).into())
        }),
        (RuleId::CteScanImpl, Kind::LogicalCteConsumer, Arity::Exactly(0), |op| {
            Some(CteScan::new(op.as_logical_cte_consumer()?.clone()).into())
        }),
        (RuleId::FilterImpl, Kind::LogicalFilter, Arity::Exactly(1), |op| {
            Some(PhysicalFilter::new(op.as_logical_filter()?.clone()).into())
        }),
        (RuleId::ProjectionImpl, Kind::LogicalProjection, Arity::Exactly(1), |op| {
            Some(PhysicalProjection::new(op.as_logical_projection()?.clone()).into())
        }),
        (RuleId::HashAggImpl, Kind::LogicalAggregate, Arity::Exactly(1), |op| {
            Some(HashAgg::new(op.as_logical_aggregate()?.clone()).into())
        }),
        (RuleId::StreamAggImpl, Kind::LogicalAggregate, Arity::Exactly(1), |op| {
            Some(StreamAgg::new(op.as_logical_aggregate()?.clone()).into())
        }),
        (RuleId::SortImpl, Kind::LogicalSort, Arity::Exactly(1), |op| {
            Some(PhysicalSort::new(op.as_logical_sort()?.clone()).into())
        }),
        (RuleId::LimitImpl, Kind::LogicalLimit, Arity::Exactly(1), |op| {
            Some(PhysicalLimit::new(op.as_logical_limit()?.clone()).into())
        }),
        (RuleId::CteProducerImpl, Kind::LogicalCteProducer, Arity::Exactly(1), |op| {
            Some(PhysicalCteProducer::new(op.as_logical_cte_producer()?.clone()).into())
        }),
        (RuleId::SelectCteImpl, Kind::LogicalSelectCte, Arity::Exactly(1), |op| {
            Some(PhysicalSelectCte::new(op.as_logical_select_cte()?.clone()).into())
        }),
        (RuleId::GatherImpl, Kind::LogicalGather, Arity::Exactly(1), |op| {
            Some(PhysicalGather::new(op.as_logical_gather()?.clone()).into())
        }),
        (RuleId::BroadcastImpl, Kind::LogicalBroadcast, Arity::Exactly(1), |op| {
            Some(PhysicalBroadcast::new(op.as_logical_broadcast()?.clone()).into())
        }),
        (RuleId::RedistributeImpl, Kind::LogicalRedistribute, Arity::Exactly(1), |op| {
            Some(PhysicalRedistribute::new(op.as_logical_redistribute()?.clone()).into())
        }),
        (RuleId::ProjectSetImpl, Kind::LogicalProjectSet, Arity::Exactly(1), |op| {
            Some(PhysicalProjectSet::new(op.as_logical_project_set()?.clone()).into())
        }),
        (RuleId::SequenceImpl, Kind::LogicalSequence, Arity::Exactly(2), |op| {
            Some(PhysicalSequence::new(op.as_logical_sequence()?.clone()).into())
        }),
        (RuleId::AppendImpl, Kind::LogicalAppend, Arity::AtLeast(1), |op| {
            Some(PhysicalAppend::new(op.as_logical_append()?.clone()).into())
        }),
    ];
    factories.to_vec()
}

impl ImplementationRule {
    /// One rule per entry of the factory map.
    pub fn all() -> Vec<ImplementationRule> {
        factories()
            .into_iter()
            .map(|(id, kind, arity, factory)| ImplementationRule {
                id,
                arity,
                factory,
                pattern: Pattern::leaf(kind),
            })
            .collect()
    }
}

impl Rule for ImplementationRule {
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, _optimizer: &O) -> bool {
        self.arity.accepts(input.inputs().len())
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let physical = (self.factory)(input.get_logical_operator(optimizer)?);
        if let Some(physical) = physical {
            result.add(OptExpression::with_operator(
                Operator::Physical(physical),
                input.into_inputs(),
            ));
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        self.id
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_every_kind_but_anchors_and_joins_has_a_factory() {
        let covered: Vec<LogicalOperatorKind> =
            factories().iter().map(|(_, k, _, _)| *k).collect();
        for kind in LogicalOperatorKind::iter() {
            let expected = !matches!(
                kind,
                LogicalOperatorKind::LogicalCteAnchor
                    | LogicalOperatorKind::LogicalJoin
                    | LogicalOperatorKind::LogicalJoinBlock
            );
            assert_eq!(expected, covered.contains(&kind), "{}", kind);
        }
    }
}
