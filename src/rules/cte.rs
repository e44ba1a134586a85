use crate::error::OptResult;
use crate::operator::{CteProducer, LogicalOperator, LogicalOperatorKind, SelectCte, Sequence};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// `CteAnchor(body) => Sequence(CteProducer(definition), body)`.
///
/// Anchors have no implementation, the definition is evaluated once by the producer and read back
/// by the consumers in `body`.
#[derive(Clone, Debug)]
pub struct CteAnchorRule {
    pattern: Pattern,
}

impl CteAnchorRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalCteAnchor),
        }
    }
}

impl Default for CteAnchorRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for CteAnchorRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let cte = match input.get_logical_operator(optimizer)? {
            LogicalOperator::LogicalCteAnchor(anchor) => anchor.cte(),
            _ => return Ok(()),
        };
        let definition = optimizer.context().cte_definition(cte)?;

        let producer = OptExpression::with_operator(
            LogicalOperator::LogicalCteProducer(CteProducer::new(cte)),
            vec![OptExpression::from_plan_node(definition)],
        );
        let mut inputs = vec![producer];
        inputs.extend(input.into_inputs());
        result.add(OptExpression::with_operator(
            LogicalOperator::LogicalSequence(Sequence::new()),
            inputs,
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::CteAnchorToSequence
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Exploration
    }
}

/// `CteConsumer => SelectCte(definition)`, evaluating the definition inline.
#[derive(Clone, Debug)]
pub struct CteConsumerRule {
    pattern: Pattern,
}

impl CteConsumerRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalCteConsumer),
        }
    }
}

impl Default for CteConsumerRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for CteConsumerRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let consumer = match input.get_logical_operator(optimizer)? {
            LogicalOperator::LogicalCteConsumer(consumer) => consumer,
            _ => return Ok(()),
        };
        let definition = optimizer.context().cte_definition(consumer.cte())?;

        result.add(OptExpression::with_operator(
            LogicalOperator::LogicalSelectCte(SelectCte::new(consumer.cte(), consumer.alias())),
            vec![OptExpression::from_plan_node(definition)],
        ));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::CteConsumerToSelect
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Exploration
    }
}
