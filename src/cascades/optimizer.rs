use std::collections::HashSet;
use std::rc::Rc;
use std::time::Instant;

use anyhow::ensure;
use itertools::Itertools;
use log::{debug, trace, warn};

use crate::cascades::memo::{Group, GroupId, GroupInputs, Member, MemberId, Memo, Winner};
use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::operator::{
    CostContext, DerivePropContext, Operator, PhysicalOperator, PhysicalOperatorTrait,
    PhysicalSort, Sort,
};
use crate::optimizer::{OptGroup, Optimizer, OptimizerContext};
use crate::options::BudgetPolicy;
use crate::plan::{Plan, PlanNode, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{PhysicalProp, PhysicalPropertySet};
use crate::rules::{
    Binding, OptExprNode, OptExpression, Rule, RuleId, RuleImpl, RuleResult, RuleType,
};

/// Cascades style optimizer over a [`Memo`].
pub struct CascadesOptimizer {
    memo: Memo,
    root: GroupId,
    required: PhysicalPropertySet,
    exploration_rules: Vec<RuleImpl>,
    implementation_rules: Vec<RuleImpl>,
    context: OptimizerContext,
    /// Rule applications already attempted, keyed by the bound members.
    applied: HashSet<(RuleId, Vec<MemberId>)>,
    exploring: HashSet<GroupId>,
    implemented: HashSet<GroupId>,
    optimizing: HashSet<(GroupId, PhysicalPropertySet)>,
    optimized: HashSet<(GroupId, PhysicalPropertySet)>,
    rule_applications: usize,
    started: Instant,
    budget_exhausted: bool,
}

impl Optimizer for CascadesOptimizer {
    type Expr = Member;
    type ExprHandle = MemberId;
    type Group = Group;
    type GroupHandle = GroupId;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: GroupId) -> &Group {
        self.memo.group(group_handle)
    }

    fn expr_at(&self, expr_handle: MemberId) -> &Member {
        self.memo.member(expr_handle)
    }

    fn group_exprs(&self, group_handle: GroupId) -> Vec<MemberId> {
        self.memo.group(group_handle).members().to_vec()
    }

    fn expr_group(&self, expr_handle: MemberId) -> GroupId {
        self.memo.member(expr_handle).group()
    }

    fn find_best_plan(mut self) -> OptResult<Plan> {
        self.explore()?;
        self.optimize()?;
        self.copy_out()
    }
}

impl CascadesOptimizer {
    /// Copies the main tree of `plan` into a fresh memo.
    pub fn new(
        required: PhysicalPropertySet,
        rules: Vec<RuleImpl>,
        plan: &Plan,
        context: OptimizerContext,
    ) -> OptResult<Self> {
        let (exploration_rules, implementation_rules): (Vec<RuleImpl>, Vec<RuleImpl>) = rules
            .into_iter()
            .partition(|r| r.rule_type() == RuleType::Exploration);

        let mut memo = Memo::new();
        let root = copy_in(&mut memo, &plan.root(), &context)?;
        debug!(
            "memo initialized with {} groups, root {}",
            memo.group_count(),
            root
        );

        Ok(Self {
            memo,
            root,
            required,
            exploration_rules,
            implementation_rules,
            context,
            applied: HashSet::new(),
            exploring: HashSet::new(),
            implemented: HashSet::new(),
            optimizing: HashSet::new(),
            optimized: HashSet::new(),
            rule_applications: 0,
            started: Instant::now(),
            budget_exhausted: false,
        })
    }

    pub fn memo(&self) -> &Memo {
        &self.memo
    }

    pub fn root(&self) -> GroupId {
        self.root
    }

    /// Explores every group reachable from the root.
    pub fn explore(&mut self) -> OptResult<()> {
        self.explore_group(self.root)
    }

    /// Finds the root winner under the required property, returning its cost.
    pub fn optimize(&mut self) -> OptResult<Cost> {
        let required = self.required.clone();
        self.optimize_group(self.root, &required)?
            .ok_or_else(|| {
                OptimizerError::Unimplementable {
                    group: self.root,
                    required: required.to_string(),
                }
                .into()
            })
    }

    /// Builds the physical plan of the root winner.
    pub fn copy_out(&self) -> OptResult<Plan> {
        let mut next_id = 0;
        let root = self.copy_out_group(self.root, &self.required, &mut next_id)?;
        Ok(Plan::new(root))
    }

    fn copy_out_group(
        &self,
        group_id: GroupId,
        required: &PhysicalPropertySet,
        next_id: &mut PlanNodeId,
    ) -> OptResult<PlanNodeRef> {
        let group = self.memo.group(group_id);
        let winner = group
            .winner(required)
            .ok_or_else(|| OptimizerError::Unimplementable {
                group: group_id,
                required: required.to_string(),
            })?;
        let member = self.memo.member(winner.member);
        ensure!(
            member.inputs().len() == winner.input_required.len(),
            OptimizerError::InternalError(format!(
                "winner {} of {} has {} inputs but {} requirements",
                member.id(),
                group_id,
                member.inputs().len(),
                winner.input_required.len()
            ))
        );

        let inputs = member
            .inputs()
            .iter()
            .zip(&winner.input_required)
            .map(|(input, input_required)| self.copy_out_group(*input, input_required, next_id))
            .collect::<OptResult<Vec<_>>>()?;

        *next_id += 1;
        Ok(Rc::new(
            PlanNodeBuilder::new(*next_id, member.operator())
                .add_inputs(inputs)
                .with_logical_prop(Some(group.logical_prop().clone()))
                .with_statistics(Some(group.statistics().clone()))
                .with_physical_props(Some(winner.provided.clone()))
                .with_cost(Some(winner.cost))
                .build(),
        ))
    }

    /// Applies exploration rules to `group` until they produce nothing new, children first.
    fn explore_group(&mut self, group: GroupId) -> OptResult<()> {
        if self.memo.group(group).is_explored() || !self.exploring.insert(group) {
            return Ok(());
        }
        debug!("explore {}", group);

        loop {
            for child in self.child_groups(group) {
                self.explore_group(child)?;
            }
            if self.budget_exhausted {
                break;
            }
            if !self.apply_rules(group, RuleType::Exploration)? {
                break;
            }
        }

        self.exploring.remove(&group);
        if !self.budget_exhausted {
            self.memo.mark_explored(group)?;
        }
        Ok(())
    }

    fn implement_group(&mut self, group: GroupId) -> OptResult<()> {
        if self.implemented.insert(group) {
            self.apply_rules(group, RuleType::Implementation)?;
        }
        Ok(())
    }

    /// Input groups of the members of `group`, excluding the group itself.
    fn child_groups(&self, group: GroupId) -> Vec<GroupId> {
        self.memo
            .group(group)
            .members()
            .iter()
            .flat_map(|m| self.memo.member(*m).inputs().iter().copied())
            .filter(|child| *child != group)
            .unique()
            .collect()
    }

    /// Applies every rule of one type to every binding of every logical member of `group`,
    /// inserting the results into `group`. Returns whether a new member was added.
    fn apply_rules(&mut self, group: GroupId, rule_type: RuleType) -> OptResult<bool> {
        let rules = match rule_type {
            RuleType::Exploration => self.exploration_rules.clone(),
            RuleType::Implementation => self.implementation_rules.clone(),
        };

        let mut changed = false;
        let members = self.memo.group(group).members().to_vec();
        for member in members {
            if !self.memo.member(member).operator().is_logical() {
                continue;
            }
            for rule in &rules {
                if rule_type == RuleType::Exploration && !self.check_budget()? {
                    return Ok(changed);
                }

                let bindings: Vec<OptExpression<Self>> =
                    Binding::new(member, rule.pattern(), &*self).collect();
                for binding in bindings {
                    if !self.applied.insert((rule.rule_id(), binding.expr_handles())) {
                        continue;
                    }
                    if !rule.appliable(&binding, &*self) {
                        trace!("{} not appliable to {}", rule.rule_id(), member);
                        continue;
                    }
                    if rule_type == RuleType::Exploration {
                        self.rule_applications += 1;
                    }

                    trace!("apply {} to {}", rule.rule_id(), member);
                    let mut results = RuleResult::new();
                    rule.apply(binding, &*self, &mut results)?;
                    for result in results.results() {
                        let (_, is_new) = self.insert_opt_expression(&result, Some(group))?;
                        changed |= is_new;
                    }
                }
            }
        }
        Ok(changed)
    }

    /// Inserts a rule result, new inner operators become members of new or existing groups.
    fn insert_opt_expression(
        &mut self,
        expr: &OptExpression<Self>,
        target: Option<GroupId>,
    ) -> OptResult<(GroupId, bool)> {
        match expr.node() {
            OptExprNode::GroupHandleNode(group) => Ok((*group, false)),
            OptExprNode::ExprHandleNode(member) => Ok((self.memo.member(*member).group(), false)),
            OptExprNode::OperatorNode(operator) => {
                let mut inputs = GroupInputs::new();
                for input in expr.inputs() {
                    inputs.push(self.insert_opt_expression(input, None)?.0);
                }
                let inserted = self
                    .memo
                    .insert(operator.clone(), inputs, target, &self.context)?;
                Ok((inserted.group, inserted.is_new))
            }
        }
    }

    /// Whether exploration may go on. Under [`BudgetPolicy::Fail`] an exhausted budget is an
    /// error.
    fn check_budget(&mut self) -> OptResult<bool> {
        if self.budget_exhausted {
            return Ok(false);
        }

        let budget = &self.context.options().budget;
        let exhausted = if self.memo.group_count() > budget.max_groups {
            Some(format!("{} groups", self.memo.group_count()))
        } else if self.memo.member_count() > budget.max_members {
            Some(format!("{} members", self.memo.member_count()))
        } else if self.rule_applications >= budget.max_rule_applications {
            Some(format!("{} rule applications", self.rule_applications))
        } else if budget
            .timeout
            .map_or(false, |timeout| self.started.elapsed() > timeout)
        {
            Some(format!("{:?} elapsed", self.started.elapsed()))
        } else {
            None
        };

        match (exhausted, budget.policy) {
            (None, _) => Ok(true),
            (Some(reason), BudgetPolicy::Stop) => {
                warn!("search budget exhausted after {}, exploration stops", reason);
                self.budget_exhausted = true;
                Ok(false)
            }
            (Some(reason), BudgetPolicy::Fail) => {
                Err(OptimizerError::BudgetExceeded(reason).into())
            }
        }
    }

    fn local_cost(&self, operator: &PhysicalOperator, group: GroupId, inputs: &[GroupId]) -> Cost {
        let input_rows: Vec<f64> = inputs
            .iter()
            .map(|g| self.memo.group(*g).statistics().row_count())
            .collect();
        operator.cost(&CostContext {
            output_rows: self.memo.group(group).statistics().row_count(),
            input_rows: &input_rows,
            catalog: self.context.catalog(),
        })
    }

    /// Cost of the cheapest plan of `group` delivering `required`, `None` when there is none.
    fn optimize_group(
        &mut self,
        group: GroupId,
        required: &PhysicalPropertySet,
    ) -> OptResult<Option<Cost>> {
        let key = (group, required.clone());
        if self.optimized.contains(&key) {
            return Ok(self.memo.group(group).winner(required).map(|w| w.cost));
        }
        if !self.optimizing.insert(key.clone()) {
            return Ok(None);
        }

        self.explore_group(group)?;
        self.implement_group(group)?;

        let members = self.memo.group(group).members().to_vec();
        for member_id in members {
            let (operator, inputs) = {
                let member = self.memo.member(member_id);
                match member.operator() {
                    Operator::Physical(op) if !member.is_enforcer() => {
                        (op.clone(), member.inputs().to_vec())
                    }
                    _ => continue,
                }
            };

            let alternatives = operator.derive_properties(DerivePropContext {
                required,
                input_count: inputs.len(),
            });
            for derived in alternatives {
                if !derived.output_prop.satisfies(required)
                    || derived.input_required_props.len() != inputs.len()
                {
                    continue;
                }

                let mut cost = self.local_cost(&operator, group, &inputs);
                let mut complete = true;
                for (input, input_required) in inputs.iter().zip(&derived.input_required_props) {
                    match self.optimize_group(*input, input_required)? {
                        Some(input_cost) => cost += input_cost,
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                if complete {
                    let winner = Winner {
                        member: member_id,
                        cost,
                        provided: derived.output_prop,
                        input_required: derived.input_required_props,
                    };
                    self.memo.offer_winner(group, required, winner)?;
                }
            }
        }

        if !required.order().is_empty() {
            self.enforce_order(group, required)?;
        }

        self.optimizing.remove(&key);
        self.optimized.insert(key);
        Ok(self.memo.group(group).winner(required).map(|w| w.cost))
    }

    /// Considers sorting the group's best unordered plan.
    fn enforce_order(&mut self, group: GroupId, required: &PhysicalPropertySet) -> OptResult<()> {
        let sort = PhysicalOperator::PhysicalSort(PhysicalSort::new(Sort::new(
            required.order().clone(),
        )));
        let member = self
            .memo
            .add_enforcer(group, Operator::Physical(sort.clone()))?;

        let input_required = required.without_order();
        if let Some(input_cost) = self.optimize_group(group, &input_required)? {
            let winner = Winner {
                member,
                cost: self.local_cost(&sort, group, &[group]) + input_cost,
                provided: required.clone(),
                input_required: vec![input_required],
            };
            self.memo.offer_winner(group, required, winner)?;
        }
        Ok(())
    }
}

fn copy_in(memo: &mut Memo, node: &PlanNode, context: &OptimizerContext) -> OptResult<GroupId> {
    ensure!(
        node.operator().is_logical(),
        OptimizerError::InvalidPlan(format!("physical operator {} in input plan", node.operator()))
    );
    let mut inputs = GroupInputs::new();
    for input in node.inputs() {
        inputs.push(copy_in(memo, input, context)?);
    }
    Ok(memo.insert(node.operator().clone(), inputs, None, context)?.group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnStatistics, InMemoryCatalog, TableDef};
    use crate::expr::{col, lit, BinaryOperator, ColumnRef, Expr};
    use crate::operator::{
        Aggregate, AggregateExpr, AggregateFunction, AggregatePhase, JoinType, PhysicalTableScan,
        TableScan,
    };
    use crate::options::{OptimizerFeature, QueryOptions, SearchBudget};
    use crate::plan::LogicalPlanBuilder;
    use crate::properties::{SortKey, SortOrder};
    use crate::rules::active_rules;

    fn context(options: QueryOptions) -> OptimizerContext {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table(TableDef::new("t", vec!["a", "b"]), 1000.0)
            .add_table(TableDef::new("u", vec!["a", "c"]), 100.0)
            .add_column_stats("t", "a", ColumnStatistics::new(100, 0.0))
            .add_column_stats("u", "a", ColumnStatistics::new(100, 0.0));
        OptimizerContext::new(Rc::new(catalog), options).unwrap()
    }

    fn join_plan() -> Plan {
        let mut builder = LogicalPlanBuilder::new();
        let right = builder.scan("u").build().unwrap();
        builder
            .scan("t")
            .join(JoinType::Inner, Some(col("t", "a").eq(col("u", "a"))), right)
            .build()
            .unwrap()
    }

    fn optimizer(options: QueryOptions) -> CascadesOptimizer {
        let context = context(options);
        let rules = active_rules(context.options());
        CascadesOptimizer::new(PhysicalPropertySet::default(), rules, &join_plan(), context)
            .unwrap()
    }

    fn logical_members(optimizer: &CascadesOptimizer, group: GroupId) -> Vec<MemberId> {
        optimizer
            .memo()
            .group(group)
            .members()
            .iter()
            .copied()
            .filter(|m| optimizer.memo().member(*m).operator().is_logical())
            .collect()
    }

    #[test]
    fn test_identical_inserts_share_a_member() {
        let mut optimizer = optimizer(QueryOptions::default());
        let root = optimizer.root();
        let member = optimizer.memo().group(root).members()[0];
        let operator = optimizer.memo().member(member).operator().clone();
        let inputs: GroupInputs = optimizer.memo().member(member).inputs().iter().copied().collect();

        let groups = optimizer.memo().group_count();
        let inserted = optimizer
            .memo
            .insert(operator, inputs, None, &optimizer.context)
            .unwrap();
        assert_eq!(member, inserted.member);
        assert_eq!(root, inserted.group);
        assert!(!inserted.is_new);
        assert_eq!(groups, optimizer.memo().group_count());
    }

    #[test]
    fn test_commutativity_round_trip() {
        let mut optimizer = optimizer(QueryOptions::default());
        optimizer.explore().unwrap();

        let root = optimizer.root();
        assert!(optimizer.memo().group(root).is_explored());
        // the swapped join swaps back onto the original member
        let members = logical_members(&optimizer, root);
        assert_eq!(2, members.len());
        let inputs: Vec<Vec<GroupId>> = members
            .iter()
            .map(|m| optimizer.memo().member(*m).inputs().to_vec())
            .collect();
        assert_eq!(inputs[0], inputs[1].iter().rev().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_root_winner_is_cheapest_alternative() {
        let mut optimizer = optimizer(QueryOptions::default());
        optimizer.explore().unwrap();
        let cost = optimizer.optimize().unwrap();

        let root = optimizer.root();
        let winner = optimizer
            .memo()
            .group(root)
            .winner(&PhysicalPropertySet::default())
            .unwrap();
        assert_eq!(cost, winner.cost);

        // hash join building on the smaller input beats every other alternative
        let operator = optimizer.memo().member(winner.member).operator();
        assert!(matches!(operator, Operator::Physical(PhysicalOperator::HashJoin(_))));
        let build = optimizer.memo().member(winner.member).inputs()[0];
        assert_eq!(100.0, optimizer.memo().group(build).statistics().row_count());

        let plan = optimizer.copy_out().unwrap();
        assert!(plan.is_physical());
        assert_eq!(Some(cost), plan.cost());
    }

    #[test]
    fn test_sort_enforcer_provides_order() {
        let context = context(QueryOptions::default());
        let rules = active_rules(context.options());
        let required = PhysicalPropertySet::default()
            .with_order(SortOrder::new(vec![SortKey::asc(ColumnRef::new("t", "a"))]));
        let mut optimizer =
            CascadesOptimizer::new(required.clone(), rules, &join_plan(), context).unwrap();
        optimizer.explore().unwrap();
        optimizer.optimize().unwrap();

        let plan = optimizer.copy_out().unwrap();
        let root = plan.root();
        assert!(matches!(
            root.operator(),
            Operator::Physical(PhysicalOperator::PhysicalSort(_))
        ));
        assert_eq!(Some(&required), root.physical_props());
        assert_eq!(
            Some(&PhysicalPropertySet::default()),
            root.inputs()[0].physical_props()
        );
    }

    #[test]
    fn test_missing_implementation_is_unimplementable() {
        let context = context(QueryOptions::default());
        let rules: Vec<RuleImpl> = active_rules(context.options())
            .into_iter()
            .filter(|r| r.rule_id() != RuleId::TableScanImpl)
            .collect();
        let mut optimizer =
            CascadesOptimizer::new(PhysicalPropertySet::default(), rules, &join_plan(), context)
                .unwrap();
        let err = optimizer.optimize().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::Unimplementable { .. })
        ));
    }

    #[test]
    fn test_budget_fail_aborts_exploration() {
        let mut options = QueryOptions::default().disable(OptimizerFeature::AggSplit);
        options.budget = SearchBudget {
            max_rule_applications: 0,
            policy: BudgetPolicy::Fail,
            ..SearchBudget::default()
        };
        let mut optimizer = optimizer(options);
        let err = optimizer.explore().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::BudgetExceeded(_))
        ));
    }

    #[test]
    fn test_budget_stop_still_produces_a_plan() {
        let mut options = QueryOptions::default();
        options.budget.max_rule_applications = 0;
        let optimizer = optimizer(options);
        let plan = optimizer.find_best_plan().unwrap();
        assert!(plan.is_physical());
    }

    fn aggregate_optimizer(
        aggregates: Vec<AggregateExpr>,
        having: Option<Expr>,
    ) -> CascadesOptimizer {
        let context = context(QueryOptions::default());
        let rules = active_rules(context.options());
        let plan = LogicalPlanBuilder::new()
            .scan("t")
            .aggregate(vec![ColumnRef::new("t", "b")], aggregates, having)
            .build()
            .unwrap();
        CascadesOptimizer::new(PhysicalPropertySet::default(), rules, &plan, context).unwrap()
    }

    fn logical_aggregate(optimizer: &CascadesOptimizer, member: MemberId) -> Option<&Aggregate> {
        optimizer
            .memo()
            .member(member)
            .operator()
            .as_logical()
            .and_then(|op| op.as_logical_aggregate())
    }

    fn partial(name: &str) -> Expr {
        Expr::Column(ColumnRef::unqualified(name))
    }

    #[test]
    fn test_aggregate_split_in_memo() {
        let mut optimizer = aggregate_optimizer(
            vec![
                AggregateExpr::new(AggregateFunction::Sum, Some(col("t", "a")), "s"),
                AggregateExpr::new(AggregateFunction::Avg, Some(col("t", "a")), "m"),
            ],
            Some(partial("m").gt(lit(5.0))),
        );
        optimizer.explore().unwrap();

        let root = optimizer.root();
        let derived_member = logical_members(&optimizer, root)
            .into_iter()
            .find(|m| {
                logical_aggregate(&optimizer, *m).map(|a| a.phase())
                    == Some(AggregatePhase::Derived)
            })
            .unwrap();
        let derived = logical_aggregate(&optimizer, derived_member).unwrap();
        let average = Expr::binary(BinaryOperator::Divide, partial("m$sum"), partial("m$count"));
        assert_eq!(Some(&average.clone().gt(lit(5.0))), derived.having());
        assert_eq!(
            vec![
                ("s".to_string(), partial("s$partial")),
                ("m".to_string(), average)
            ],
            derived.finalize().to_vec()
        );
        // the split keeps the output columns of the original aggregate
        let outputs = optimizer.memo().group(root).logical_prop().output_columns().to_vec();
        assert!(outputs.contains(&ColumnRef::unqualified("m")));

        let local_group = optimizer.memo().member(derived_member).inputs()[0];
        let local = logical_members(&optimizer, local_group)
            .into_iter()
            .find_map(|m| logical_aggregate(&optimizer, m))
            .unwrap();
        assert_eq!(AggregatePhase::Local, local.phase());
        let partials: Vec<&str> = local.aggregates().iter().map(|a| a.alias()).collect();
        assert_eq!(vec!["s$partial", "m$sum", "m$count"], partials);

        optimizer.optimize().unwrap();
        let plan = optimizer.copy_out().unwrap();
        assert!(plan.is_physical());
        let root = plan.root();
        let root_agg = match root.operator() {
            Operator::Physical(PhysicalOperator::HashAgg(agg)) => agg,
            other => panic!("unexpected root {}", other),
        };
        if root_agg.phase() == AggregatePhase::Derived {
            assert!(matches!(
                root.inputs()[0].operator(),
                Operator::Physical(PhysicalOperator::HashAgg(local))
                    if local.phase() == AggregatePhase::Local
            ));
        }
    }

    #[test]
    fn test_count_distinct_stays_global() {
        let mut optimizer = aggregate_optimizer(
            vec![AggregateExpr::new(
                AggregateFunction::CountDistinct,
                Some(col("t", "a")),
                "c",
            )],
            None,
        );
        optimizer.explore().unwrap();

        let phases: Vec<AggregatePhase> = (0..optimizer.memo().member_count())
            .filter_map(|m| logical_aggregate(&optimizer, MemberId(m)))
            .map(|a| a.phase())
            .collect();
        assert_eq!(vec![AggregatePhase::Global], phases);

        optimizer.optimize().unwrap();
        let plan = optimizer.copy_out().unwrap();
        assert!(matches!(
            plan.root().operator(),
            Operator::Physical(PhysicalOperator::HashAgg(agg))
                if agg.phase() == AggregatePhase::Global
        ));
    }

    #[test]
    fn test_physical_input_is_rejected() {
        let context = context(QueryOptions::default());
        let scan = PhysicalTableScan::new(TableScan::new("t"));
        let plan = Plan::new(Rc::new(PlanNode::new(
            0,
            Operator::Physical(scan.into()),
            vec![],
        )));
        let err = CascadesOptimizer::new(PhysicalPropertySet::default(), vec![], &plan, context)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::InvalidPlan(_))
        ));
    }
}
