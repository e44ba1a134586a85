//! Optimization rules.
//!
//! A rule matches a [`Pattern`] against an optimizer, receives every binding of it as an
//! [`OptExpression`] and produces at most one equivalent expression. Exploration rules produce
//! logical alternatives, implementation rules physical ones. The same rules drive both the
//! heuristic and the cascades optimizer.

use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::{EnumSet, EnumSetType};
use strum_macros::{Display, EnumIter};

use crate::error::{OptResult, OptimizerError};
use crate::operator::{LogicalOperator, Operator};
use crate::optimizer::{OptExpr, OptGroup, Optimizer};
use crate::options::{OptimizerFeature, QueryOptions};
use crate::plan::PlanNode;
use crate::properties::LogicalProperty;
use crate::stat::Statistics;

mod pattern;
pub use pattern::*;
mod binding;
pub use binding::*;
mod agg_split;
pub use agg_split::*;
mod cte;
pub use cte::*;
mod implementation;
pub use implementation::*;
mod index_seek;
pub use index_seek::*;
mod join_associativity;
pub use join_associativity::*;
mod join_block;
pub use join_block::*;
mod join_commutativity;
pub use join_commutativity::*;
mod join_impl;
pub use join_impl::*;

#[derive(Debug, Hash, EnumSetType, Display, EnumIter)]
pub enum RuleId {
    JoinCommutativity,
    JoinAssociativity,
    AggSplit,
    CteAnchorToSequence,
    CteConsumerToSelect,
    HashJoin,
    NestedLoopJoin,
    IndexSeek,
    JoinBlock,
    TableScanImpl,
    CteScanImpl,
    FilterImpl,
    ProjectionImpl,
    HashAggImpl,
    StreamAggImpl,
    SortImpl,
    LimitImpl,
    AppendImpl,
    SequenceImpl,
    CteProducerImpl,
    SelectCteImpl,
    GatherImpl,
    BroadcastImpl,
    RedistributeImpl,
    ProjectSetImpl,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuleType {
    /// Produces a logically equivalent expression.
    Exploration,
    /// Produces a physical expression for a logical one.
    Implementation,
}

#[enum_dispatch]
pub trait Rule {
    /// Pure check on a binding, `apply` is only called when this returns true.
    fn appliable<O: Optimizer>(&self, _input: &OptExpression<O>, _optimizer: &O) -> bool {
        true
    }

    /// Adds at most one expression equivalent to `input` to `result`.
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()>;

    fn pattern(&self) -> &Pattern;

    fn rule_id(&self) -> RuleId;

    fn rule_type(&self) -> RuleType;
}

#[enum_dispatch(Rule)]
#[derive(Clone, Debug)]
pub enum RuleImpl {
    JoinCommutativityRule,
    JoinAssociativityRule,
    AggSplitRule,
    CteAnchorRule,
    CteConsumerRule,
    HashJoinRule,
    NestedLoopJoinRule,
    IndexSeekRule,
    JoinBlockRule,
    ImplementationRule,
}

lazy_static! {
    /// Every rule the optimizer knows, exploration rules first.
    static ref RULES: Vec<RuleImpl> = {
        let mut rules: Vec<RuleImpl> = vec![
            JoinCommutativityRule::new().into(),
            JoinAssociativityRule::new().into(),
            AggSplitRule::new().into(),
            CteAnchorRule::new().into(),
            CteConsumerRule::new().into(),
            IndexSeekRule::new().into(),
            HashJoinRule::new().into(),
            NestedLoopJoinRule::new().into(),
            JoinBlockRule::new().into(),
        ];
        rules.extend(ImplementationRule::all().into_iter().map(RuleImpl::from));
        rules
    };
}

/// Feature that has to be enabled for a rule to take part in optimization.
fn required_feature(rule_id: RuleId) -> Option<OptimizerFeature> {
    match rule_id {
        RuleId::JoinCommutativity => Some(OptimizerFeature::JoinCommutativity),
        RuleId::JoinAssociativity => Some(OptimizerFeature::JoinAssociativity),
        RuleId::AggSplit => Some(OptimizerFeature::AggSplit),
        RuleId::HashJoin => Some(OptimizerFeature::HashJoin),
        RuleId::NestedLoopJoin => Some(OptimizerFeature::NestedLoopJoin),
        RuleId::IndexSeek => Some(OptimizerFeature::IndexSeek),
        RuleId::StreamAggImpl => Some(OptimizerFeature::StreamAgg),
        _ => None,
    }
}

/// Rules enabled for one query, in catalog order.
///
/// Nested loop join is the only join that implements every join, so it stays on whenever hash
/// join is switched off.
pub fn active_rules(options: &QueryOptions) -> Vec<RuleImpl> {
    let enabled = active_rule_ids(options);
    RULES
        .iter()
        .filter(|r| enabled.contains(r.rule_id()))
        .cloned()
        .collect()
}

pub fn active_rule_ids(options: &QueryOptions) -> EnumSet<RuleId> {
    let mut features = options.features;
    if !features.contains(OptimizerFeature::HashJoin) {
        features.insert(OptimizerFeature::NestedLoopJoin);
    }

    RULES
        .iter()
        .map(|r| r.rule_id())
        .filter(|id| required_feature(*id).map_or(true, |f| features.contains(f)))
        .collect()
}

pub enum OptExprNode<O: Optimizer> {
    OperatorNode(Operator),
    ExprHandleNode(O::ExprHandle),
    GroupHandleNode(O::GroupHandle),
}

impl<O: Optimizer> Clone for OptExprNode<O> {
    fn clone(&self) -> Self {
        match self {
            OptExprNode::OperatorNode(op) => OptExprNode::OperatorNode(op.clone()),
            OptExprNode::ExprHandleNode(h) => OptExprNode::ExprHandleNode(*h),
            OptExprNode::GroupHandleNode(h) => OptExprNode::GroupHandleNode(*h),
        }
    }
}

impl<O: Optimizer> Debug for OptExprNode<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OptExprNode::OperatorNode(op) => write!(f, "Operator({})", op),
            OptExprNode::ExprHandleNode(h) => write!(f, "Expr({:?})", h),
            OptExprNode::GroupHandleNode(h) => write!(f, "Group({:?})", h),
        }
    }
}

/// An expression tree handed to and returned from rules.
///
/// Inside a binding nodes are handles into the optimizer. Rule outputs mix handles with new
/// operators, which the optimizer inserts.
pub struct OptExpression<O: Optimizer> {
    node: OptExprNode<O>,
    inputs: Vec<OptExpression<O>>,
}

impl<O: Optimizer> Clone for OptExpression<O> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            inputs: self.inputs.clone(),
        }
    }
}

impl<O: Optimizer> Debug for OptExpression<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptExpression")
            .field("node", &self.node)
            .field("inputs", &self.inputs)
            .finish()
    }
}

impl<O: Optimizer> OptExpression<O> {
    pub fn new(node: OptExprNode<O>, inputs: Vec<OptExpression<O>>) -> Self {
        Self { node, inputs }
    }

    pub fn with_operator<P: Into<Operator>>(operator: P, inputs: Vec<OptExpression<O>>) -> Self {
        Self::new(OptExprNode::OperatorNode(operator.into()), inputs)
    }

    pub fn with_group(group: O::GroupHandle) -> Self {
        Self::new(OptExprNode::GroupHandleNode(group), vec![])
    }

    pub fn node(&self) -> &OptExprNode<O> {
        &self.node
    }

    pub fn inputs(&self) -> &[OptExpression<O>] {
        &self.inputs
    }

    pub fn input(&self, idx: usize) -> OptResult<&OptExpression<O>> {
        self.inputs.get(idx).ok_or_else(|| {
            OptimizerError::InternalError(format!("binding has no input {}", idx)).into()
        })
    }

    pub fn into_inputs(self) -> Vec<OptExpression<O>> {
        self.inputs
    }

    pub fn get_operator<'a>(&'a self, optimizer: &'a O) -> OptResult<&'a Operator> {
        match &self.node {
            OptExprNode::OperatorNode(op) => Ok(op),
            OptExprNode::ExprHandleNode(h) => Ok(optimizer.expr_at(*h).operator()),
            OptExprNode::GroupHandleNode(h) => Err(OptimizerError::InternalError(format!(
                "group {:?} bound where an operator is expected",
                h
            ))
            .into()),
        }
    }

    pub fn get_logical_operator<'a>(&'a self, optimizer: &'a O) -> OptResult<&'a LogicalOperator> {
        let operator = self.get_operator(optimizer)?;
        operator.as_logical().ok_or_else(|| {
            OptimizerError::InternalError(format!("{} is not logical", operator)).into()
        })
    }

    /// Group of a bound node.
    pub fn group(&self, optimizer: &O) -> OptResult<O::GroupHandle> {
        match &self.node {
            OptExprNode::ExprHandleNode(h) => Ok(optimizer.expr_group(*h)),
            OptExprNode::GroupHandleNode(h) => Ok(*h),
            OptExprNode::OperatorNode(op) => Err(OptimizerError::InternalError(format!(
                "new operator {} has no group yet",
                op
            ))
            .into()),
        }
    }

    pub fn logical_prop<'a>(&self, optimizer: &'a O) -> OptResult<&'a LogicalProperty> {
        Ok(optimizer.group_at(self.group(optimizer)?).logical_prop())
    }

    pub fn statistics<'a>(&self, optimizer: &'a O) -> OptResult<&'a Statistics> {
        Ok(optimizer.group_at(self.group(optimizer)?).statistics())
    }

    /// Bound expression handles in pre-order, identifying the binding.
    pub fn expr_handles(&self) -> Vec<O::ExprHandle> {
        let mut handles = vec![];
        self.collect_expr_handles(&mut handles);
        handles
    }

    fn collect_expr_handles(&self, handles: &mut Vec<O::ExprHandle>) {
        if let OptExprNode::ExprHandleNode(h) = &self.node {
            handles.push(*h);
        }
        for input in &self.inputs {
            input.collect_expr_handles(handles);
        }
    }

    /// Copies a plan subtree into new operator nodes.
    pub fn from_plan_node(node: &PlanNode) -> Self {
        Self::new(
            OptExprNode::OperatorNode(node.operator().clone()),
            node.inputs()
                .iter()
                .map(|input| Self::from_plan_node(input))
                .collect(),
        )
    }
}

pub struct RuleResult<O: Optimizer> {
    opt_exprs: Vec<OptExpression<O>>,
}

impl<O: Optimizer> Default for RuleResult<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Optimizer> RuleResult<O> {
    pub fn new() -> Self {
        Self { opt_exprs: vec![] }
    }

    pub fn add(&mut self, opt_expr: OptExpression<O>) {
        self.opt_exprs.push(opt_expr);
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression<O>> {
        self.opt_exprs.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.opt_exprs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_join_off_forces_nested_loop() {
        let options = QueryOptions::default()
            .disable(OptimizerFeature::HashJoin)
            .disable(OptimizerFeature::NestedLoopJoin);
        let ids = active_rule_ids(&options);
        assert!(!ids.contains(RuleId::HashJoin));
        assert!(ids.contains(RuleId::NestedLoopJoin));
    }

    #[test]
    fn test_stream_agg_off_by_default() {
        let ids = active_rule_ids(&QueryOptions::default());
        assert!(!ids.contains(RuleId::StreamAggImpl));
        assert!(ids.contains(RuleId::HashAggImpl));

        let options = QueryOptions::default().enable(OptimizerFeature::StreamAgg);
        assert!(active_rule_ids(&options).contains(RuleId::StreamAggImpl));
    }

    #[test]
    fn test_rule_ids_are_unique() {
        let ids: Vec<RuleId> = RULES.iter().map(|r| r.rule_id()).collect();
        let set: EnumSet<RuleId> = ids.iter().copied().collect();
        assert_eq!(ids.len(), set.len());
    }
}
