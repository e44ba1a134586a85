use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;
use std::mem::swap;
use std::rc::Rc;

use strum_macros::Display;

use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, Expr, SubqueryId};
use crate::operator::LogicalOperator::*;
use crate::operator::Operator::Logical;
use crate::operator::*;
use crate::properties::{LogicalProperty, PhysicalPropertySet, SortOrder};
use crate::stat::Statistics;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Rc<PlanNode>;

/// One node in a plan.
///
/// This is used in both input and output of an optimizer. Given that we may have many different
/// phases in query optimization, we use one data structure to represent a plan.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: Operator,
    inputs: Vec<PlanNodeRef>,
    logical_prop: Option<LogicalProperty>,
    stat: Option<Statistics>,
    physical_props: Option<PhysicalPropertySet>,
    /// Cost of the whole subtree rooted at this node.
    cost: Option<Cost>,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator
            && self.inputs == other.inputs
            && self.logical_prop == other.logical_prop
            && self.stat == other.stat
            && self.physical_props == other.physical_props
            && self.cost == other.cost
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SubqueryKind {
    Scalar,
    Exists,
    In,
}

/// A subquery referenced from an expression of the enclosing query through its id.
#[derive(Debug, PartialEq)]
pub struct Subquery {
    id: SubqueryId,
    kind: SubqueryKind,
    plan: PlanNodeRef,
    cacheable: bool,
    /// Columns of enclosing queries the subquery reads.
    free_columns: BTreeSet<ColumnRef>,
}

impl Subquery {
    pub fn new(id: SubqueryId, kind: SubqueryKind, plan: PlanNodeRef) -> Self {
        Self {
            id,
            kind,
            plan,
            cacheable: true,
            free_columns: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> SubqueryId {
        self.id
    }

    pub fn kind(&self) -> SubqueryKind {
        self.kind
    }

    pub fn plan(&self) -> PlanNodeRef {
        self.plan.clone()
    }

    /// Whether one evaluation can be reused for every row of the enclosing query.
    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn free_columns(&self) -> &BTreeSet<ColumnRef> {
        &self.free_columns
    }

    pub(crate) fn with_plan(&self, plan: PlanNodeRef) -> Self {
        Self {
            id: self.id,
            kind: self.kind,
            plan,
            cacheable: self.cacheable,
            free_columns: self.free_columns.clone(),
        }
    }

    pub(crate) fn with_free_columns(mut self, free_columns: BTreeSet<ColumnRef>) -> Self {
        self.cacheable = free_columns.is_empty();
        self.free_columns = free_columns;
        self
    }
}

#[derive(Debug, PartialEq)]
pub struct CteDefinition {
    id: CteId,
    name: String,
    plan: PlanNodeRef,
}

impl CteDefinition {
    pub fn new<S: Into<String>>(id: CteId, name: S, plan: PlanNodeRef) -> Self {
        Self {
            id,
            name: name.into(),
            plan,
        }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plan(&self) -> PlanNodeRef {
        self.plan.clone()
    }

    pub(crate) fn with_plan(&self, plan: PlanNodeRef) -> Self {
        Self::new(self.id, self.name.clone(), plan)
    }
}

/// A query plan.
///
/// A query plan is a single root dag(directed acyclic graph). It can be used in many places, for
/// example, logical plan after validating an ast, a physical plan after completing optimizer.
/// Subqueries and common table expressions referenced from the main tree are carried alongside.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
    subqueries: Vec<Subquery>,
    ctes: Vec<CteDefinition>,
}

/// Breath first iterator of a single root dag plan.
struct BFSPlanNodeIter {
    visited: HashSet<PlanNodeId>,
    cur_level: Vec<PlanNodeRef>,
    next_level: Vec<PlanNodeRef>,
}

impl Iterator for BFSPlanNodeIter {
    type Item = PlanNodeRef;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur_level.is_empty() {
            swap(&mut self.cur_level, &mut self.next_level);
        }

        if let Some(p) = self.cur_level.pop() {
            for input in &p.inputs {
                if !self.visited.contains(&input.id) {
                    self.next_level.push(input.clone());
                    self.visited.insert(input.id);
                }
            }

            Some(p)
        } else {
            None
        }
    }
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self {
            root,
            subqueries: vec![],
            ctes: vec![],
        }
    }

    pub fn with_subqueries(mut self, subqueries: Vec<Subquery>) -> Self {
        self.subqueries = subqueries;
        self
    }

    pub fn with_ctes(mut self, ctes: Vec<CteDefinition>) -> Self {
        self.ctes = ctes;
        self
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    pub fn subqueries(&self) -> &[Subquery] {
        &self.subqueries
    }

    pub fn subquery(&self, id: SubqueryId) -> Option<&Subquery> {
        self.subqueries.iter().find(|s| s.id == id)
    }

    pub fn ctes(&self) -> &[CteDefinition] {
        &self.ctes
    }

    pub fn cte(&self, id: CteId) -> Option<&CteDefinition> {
        self.ctes.iter().find(|c| c.id == id)
    }

    pub fn bfs_iterator(&self) -> impl Iterator<Item = PlanNodeRef> {
        let mut visited = HashSet::new();
        visited.insert(self.root.id);

        BFSPlanNodeIter {
            cur_level: vec![self.root.clone()],
            next_level: vec![],
            visited,
        }
    }

    /// Cost of the main tree, present once the plan is physical.
    pub fn cost(&self) -> Option<Cost> {
        self.root.cost
    }

    /// Whether any node of the main tree is still logical.
    pub fn is_physical(&self) -> bool {
        self.bfs_iterator().all(|n| n.operator.is_physical())
    }

    /// Indented rendering of the main tree with cardinalities and costs.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        self.root.explain(0, &mut out);
        out
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: Operator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
            logical_prop: None,
            stat: None,
            physical_props: None,
            cost: None,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }

    pub fn logical_prop(&self) -> Option<&LogicalProperty> {
        self.logical_prop.as_ref()
    }

    pub fn stat(&self) -> Option<&Statistics> {
        self.stat.as_ref()
    }

    pub fn physical_props(&self) -> Option<&PhysicalPropertySet> {
        self.physical_props.as_ref()
    }

    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    fn explain(&self, depth: usize, out: &mut String) {
        let _ = write!(out, "{:indent$}{}", "", self.operator, indent = depth * 2);
        if let Some(stat) = &self.stat {
            let _ = write!(out, " {}", stat);
        }
        if let Some(cost) = &self.cost {
            let _ = write!(out, " cost={}", cost);
        }
        out.push('\n');
        for input in &self.inputs {
            input.explain(depth + 1, out);
        }
    }
}

pub struct PlanNodeBuilder {
    plan_node: PlanNode,
}

impl PlanNodeBuilder {
    pub fn new(id: PlanNodeId, operator: &Operator) -> Self {
        Self {
            plan_node: PlanNode::new(id, operator.clone(), vec![]),
        }
    }

    pub fn add_inputs<I>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = PlanNodeRef>,
    {
        self.plan_node.inputs.extend(inputs);
        self
    }

    pub fn with_logical_prop(mut self, logical_prop: Option<LogicalProperty>) -> Self {
        self.plan_node.logical_prop = logical_prop;
        self
    }

    pub fn with_statistics(mut self, stat: Option<Statistics>) -> Self {
        self.plan_node.stat = stat;
        self
    }

    pub fn with_physical_props(mut self, physical_props: Option<PhysicalPropertySet>) -> Self {
        self.plan_node.physical_props = physical_props;
        self
    }

    pub fn with_cost(mut self, cost: Option<Cost>) -> Self {
        self.plan_node.cost = cost;
        self
    }

    pub fn build(self) -> PlanNode {
        self.plan_node
    }
}

/// Builds bound logical plans bottom up.
///
/// Each method puts a new operator on top of the current root. Node ids stay unique across
/// [`build`](LogicalPlanBuilder::build) calls, so one builder can produce both sides of a join.
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    next_plan_node_id: PlanNodeId,
    subqueries: Vec<Subquery>,
    ctes: Vec<CteDefinition>,
}

impl Default for LogicalPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            next_plan_node_id: 0,
            subqueries: vec![],
            ctes: vec![],
        }
    }

    fn reset_root(&mut self, new_root: PlanNodeRef) -> &mut Self {
        self.root = Some(new_root);
        self.next_plan_node_id += 1;
        self
    }

    fn leaf(&mut self, operator: LogicalOperator) -> &mut Self {
        let plan_node = Rc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(operator),
            vec![],
        ));
        self.reset_root(plan_node)
    }

    /// A missing input is kept as a node without inputs and reported when the plan is validated.
    fn unary(&mut self, operator: LogicalOperator) -> &mut Self {
        let inputs = self.root.take().into_iter().collect();
        let plan_node = Rc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(operator),
            inputs,
        ));
        self.reset_root(plan_node)
    }

    fn merge(&mut self, other: Plan) -> PlanNodeRef {
        self.subqueries.extend(other.subqueries);
        self.ctes.extend(other.ctes);
        other.root
    }

    pub fn scan<S: Into<String>>(&mut self, table_name: S) -> &mut Self {
        self.leaf(LogicalScan(TableScan::new(table_name)))
    }

    pub fn scan_as<S: Into<String>, A: Into<String>>(&mut self, table_name: S, alias: A) -> &mut Self {
        self.leaf(LogicalScan(TableScan::new(table_name).with_alias(alias)))
    }

    /// Scan with a filter already pushed into it.
    pub fn filtered_scan<S: Into<String>>(&mut self, table_name: S, filter: Expr) -> &mut Self {
        self.leaf(LogicalScan(TableScan::new(table_name).with_filter(filter)))
    }

    pub fn filter(&mut self, predicate: Expr) -> &mut Self {
        self.unary(LogicalFilter(Filter::new(predicate)))
    }

    pub fn projection(&mut self, items: Vec<ProjectionItem>) -> &mut Self {
        self.unary(LogicalProjection(Projection::new(items)))
    }

    pub fn aggregate(
        &mut self,
        group_by: Vec<ColumnRef>,
        aggregates: Vec<AggregateExpr>,
        having: Option<Expr>,
    ) -> &mut Self {
        self.unary(LogicalAggregate(
            Aggregate::new(group_by, aggregates).with_having(having),
        ))
    }

    pub fn sort(&mut self, order: SortOrder) -> &mut Self {
        self.unary(LogicalSort(Sort::new(order)))
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.unary(LogicalLimit(Limit::new(limit)))
    }

    pub fn project_set<S: Into<String>>(&mut self, function: Expr, alias: S) -> &mut Self {
        self.unary(LogicalProjectSet(ProjectSet::new(function, alias)))
    }

    pub fn gather(&mut self) -> &mut Self {
        self.unary(LogicalGather(Gather::new()))
    }

    pub fn broadcast(&mut self) -> &mut Self {
        self.unary(LogicalBroadcast(Broadcast::new()))
    }

    pub fn redistribute(&mut self, keys: Vec<ColumnRef>) -> &mut Self {
        self.unary(LogicalRedistribute(Redistribute::new(keys)))
    }

    pub fn join(&mut self, join_type: JoinType, condition: Option<Expr>, right: Plan) -> &mut Self {
        let join = Join::new(join_type, condition);
        let right = self.merge(right);
        let inputs = self.root.take().into_iter().chain(Some(right)).collect();
        let plan_node = Rc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(LogicalJoin(join)),
            inputs,
        ));

        self.reset_root(plan_node)
    }

    /// `UNION ALL` of the current plan and `others`.
    pub fn append(&mut self, others: Vec<Plan>) -> &mut Self {
        let others: Vec<PlanNodeRef> = others.into_iter().map(|p| self.merge(p)).collect();
        let inputs = self.root.take().into_iter().chain(others).collect();
        let plan_node = Rc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(LogicalAppend(Append::new())),
            inputs,
        ));

        self.reset_root(plan_node)
    }

    /// Reads the common table expression `cte` under `alias`.
    pub fn cte_consumer<S: Into<String>>(&mut self, cte: CteId, alias: S) -> &mut Self {
        self.leaf(LogicalCteConsumer(CteConsumer::new(cte, alias)))
    }

    /// Marks the current plan as the scope in which `cte` is visible.
    pub fn cte_anchor(&mut self, cte: CteId) -> &mut Self {
        self.unary(LogicalCteAnchor(CteAnchor::new(cte)))
    }

    pub fn with_cte<S: Into<String>>(&mut self, id: CteId, name: S, definition: Plan) -> &mut Self {
        let root = self.merge(definition);
        self.ctes.push(CteDefinition::new(id, name, root));
        self
    }

    pub fn with_subquery(&mut self, id: SubqueryId, kind: SubqueryKind, plan: Plan) -> &mut Self {
        let root = self.merge(plan);
        self.subqueries.push(Subquery::new(id, kind, root));
        self
    }

    /// Consume current plan, but not rest state, e.g. plan node id.
    ///
    /// This is useful for building multi child plan, e.g. join.
    pub fn build(&mut self) -> OptResult<Plan> {
        let root = self
            .root
            .take()
            .ok_or_else(|| OptimizerError::InvalidPlan("empty plan".to_string()))?;
        Ok(Plan {
            root,
            subqueries: std::mem::take(&mut self.subqueries),
            ctes: std::mem::take(&mut self.ctes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::col;

    #[test]
    fn test_builder_node_ids_are_unique() {
        let mut builder = LogicalPlanBuilder::new();
        let right = builder.scan("u").build().unwrap();
        let plan = builder
            .scan("t")
            .join(
                JoinType::Inner,
                Some(col("t", "a").eq(col("u", "a"))),
                right,
            )
            .limit(10)
            .build()
            .unwrap();

        let ids: HashSet<PlanNodeId> = plan.bfs_iterator().map(|n| n.id()).collect();
        assert_eq!(4, ids.len());
        assert!(!plan.is_physical());
    }

    #[test]
    fn test_build_empty_plan_fails() {
        assert!(LogicalPlanBuilder::new().build().is_err());
    }
}
