//! Query level entry point.
//!
//! [`Planner::create_plan`] validates a bound plan and derives it, [`Planner::optimize`] then
//! produces the physical plan either through memo search or, with `use_memo` switched off,
//! through direct substitution. The main query and every subquery are optimized as separate query
//! blocks, each with a memo of its own.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::rc::Rc;

use anyhow::{bail, ensure};
use itertools::Itertools;
use log::debug;

use crate::cascades::CascadesOptimizer;
use crate::catalog::Catalog;
use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, Expr, SubqueryId};
use crate::heuristic::HepOptimizer;
use crate::operator::{CteId, JoinBlock, LogicalOperator, Operator};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::options::QueryOptions;
use crate::plan::{CteDefinition, Plan, PlanNode, PlanNodeRef, Subquery};
use crate::properties::PhysicalPropertySet;
use crate::rules::{active_rules, Rule, RuleId, RuleImpl, RuleType};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryBlock {
    Main,
    Subquery(SubqueryId),
}

impl Display for QueryBlock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryBlock::Main => write!(f, "main"),
            QueryBlock::Subquery(id) => write!(f, "subquery {}", id),
        }
    }
}

pub struct Planner {
    /// Context before any query specific state is registered.
    base_context: OptimizerContext,
    context: OptimizerContext,
    plan: Option<Plan>,
    blocks: Vec<(QueryBlock, CascadesOptimizer)>,
}

impl Planner {
    pub fn new(catalog: Rc<dyn Catalog>, options: QueryOptions) -> OptResult<Self> {
        let context = OptimizerContext::new(catalog, options)?;
        Ok(Self {
            base_context: context.clone(),
            context,
            plan: None,
            blocks: vec![],
        })
    }

    pub fn context(&self) -> &OptimizerContext {
        &self.context
    }

    pub fn options(&self) -> &QueryOptions {
        self.context.options()
    }

    /// Plan registered by the last [`create_plan`](Planner::create_plan).
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    /// Validates and derives `plan`.
    ///
    /// Common table expressions and subqueries are derived in dependency order. A subquery is
    /// cacheable when it reads no column of an enclosing query, the columns a correlated subquery
    /// reads are recorded in the context. With the join order solver enabled, every maximal tree
    /// of inner joins is collapsed into one join block first.
    pub fn create_plan(&mut self, plan: Plan) -> OptResult<&Plan> {
        self.context = self.base_context.clone();
        self.blocks.clear();
        self.plan = None;

        let solver = self.options().use_join_order_solver;
        let prepare = |node: &PlanNodeRef| {
            if solver {
                form_join_blocks(node)
            } else {
                node.clone()
            }
        };

        let cte_ids: Vec<CteId> = plan.ctes().iter().map(|c| c.id()).collect();
        let mut ctes = Vec::with_capacity(cte_ids.len());
        for cte in dependency_order(&cte_ids, |id| cte_dependencies(&plan, id))? {
            let definition = plan
                .cte(cte)
                .ok_or_else(|| OptimizerError::InvalidPlan(format!("undefined {}", cte)))?;
            let root = self.context.derive_plan(&prepare(&definition.plan()))?;
            self.context.add_cte(cte, root.clone())?;
            ctes.push(definition.with_plan(root));
        }

        let main_refs = subqueries_referenced(&plan.root());
        let subquery_ids: Vec<SubqueryId> = plan.subqueries().iter().map(|s| s.id()).collect();
        for id in &main_refs {
            ensure!(
                subquery_ids.contains(id),
                OptimizerError::InvalidPlan(format!("unknown subquery {}", id))
            );
        }
        let mut subqueries = HashMap::with_capacity(subquery_ids.len());
        for id in dependency_order(&subquery_ids, |id| subquery_dependencies(&plan, id))? {
            let subquery = plan
                .subquery(id)
                .ok_or_else(|| OptimizerError::InvalidPlan(format!("unknown subquery {}", id)))?;
            let root = self.context.derive_plan(&prepare(&subquery.plan()))?;
            let free_columns: BTreeSet<ColumnRef> = root
                .logical_prop()
                .map(|p| p.outer_refs().clone())
                .unwrap_or_default();
            if free_columns.is_empty() {
                debug!("{} is cacheable", id);
            } else {
                debug!("{} is correlated on {}", id, free_columns.iter().join(", "));
            }
            self.context.add_subquery(id, free_columns.clone());
            subqueries.insert(id, subquery.with_plan(root).with_free_columns(free_columns));
        }

        let root = self.context.derive_plan(&prepare(&plan.root()))?;
        if let Some(prop) = root.logical_prop() {
            ensure!(
                prop.outer_refs().is_empty(),
                OptimizerError::InvalidPlan(format!(
                    "unresolved columns {}",
                    prop.outer_refs().iter().join(", ")
                ))
            );
        }

        let subqueries = subquery_ids
            .iter()
            .filter_map(|id| subqueries.remove(id))
            .collect();
        self.plan = Some(Plan::new(root).with_subqueries(subqueries).with_ctes(ctes));
        self.created_plan()
    }

    fn created_plan(&self) -> OptResult<&Plan> {
        self.plan.as_ref().ok_or_else(|| {
            OptimizerError::InvalidPlan("no plan has been created".to_string()).into()
        })
    }

    fn query_blocks(&self) -> OptResult<Vec<(QueryBlock, PlanNodeRef)>> {
        let plan = self.created_plan()?;
        Ok(std::iter::once((QueryBlock::Main, plan.root()))
            .chain(
                plan.subqueries()
                    .iter()
                    .map(|s| (QueryBlock::Subquery(s.id()), s.plan())),
            )
            .collect())
    }

    /// Rewrites every query block straight into a physical plan, taking the first implementation
    /// each node offers.
    pub fn substitution_optimize(&self) -> OptResult<Plan> {
        let rules: Vec<RuleImpl> = active_rules(self.options())
            .into_iter()
            .filter(|r| {
                r.rule_type() == RuleType::Implementation
                    || r.rule_id() == RuleId::CteAnchorToSequence
            })
            .collect();

        let mut roots = HashMap::new();
        for (block, root) in self.query_blocks()? {
            let optimizer = HepOptimizer::new(
                self.options().match_order,
                self.options().max_iter_times,
                rules.clone(),
                &Plan::new(root),
                self.context.clone(),
            )?;
            let optimized = optimizer.find_best_plan()?;
            debug!("{} substituted with cost {:?}", block, optimized.cost());
            roots.insert(block, optimized.root());
        }
        self.assemble(roots)
    }

    /// Copies every query block into a memo of its own.
    pub fn init_root_plan(&mut self) -> OptResult<()> {
        let rules = active_rules(self.options());
        let mut blocks = vec![];
        for (block, root) in self.query_blocks()? {
            let optimizer = CascadesOptimizer::new(
                PhysicalPropertySet::default(),
                rules.clone(),
                &Plan::new(root),
                self.context.clone(),
            )?;
            blocks.push((block, optimizer));
        }
        self.blocks = blocks;
        Ok(())
    }

    /// Explores and optimizes every memo, returning the cost of the main query.
    pub fn optimize_root_plan(&mut self) -> OptResult<Cost> {
        ensure!(
            !self.blocks.is_empty(),
            OptimizerError::InternalError("memo is not initialized".to_string())
        );
        let mut main_cost = None;
        for (block, optimizer) in &mut self.blocks {
            optimizer.explore()?;
            let cost = optimizer.optimize()?;
            debug!("{} optimized with cost {}", block, cost);
            if *block == QueryBlock::Main {
                main_cost = Some(cost);
            }
        }
        main_cost.ok_or_else(|| {
            OptimizerError::InternalError("main query block is missing".to_string()).into()
        })
    }

    /// Builds the physical plan from the winners of every memo.
    pub fn copy_out_optimal_plan(&self) -> OptResult<Plan> {
        ensure!(
            !self.blocks.is_empty(),
            OptimizerError::InternalError("memo is not initialized".to_string())
        );
        let mut roots = HashMap::new();
        for (block, optimizer) in &self.blocks {
            roots.insert(*block, optimizer.copy_out()?.root());
        }
        self.assemble(roots)
    }

    /// Creates and optimizes `plan` according to the `use_memo` option.
    pub fn optimize(&mut self, plan: Plan) -> OptResult<Plan> {
        self.create_plan(plan)?;
        if self.options().use_memo {
            self.init_root_plan()?;
            self.optimize_root_plan()?;
            self.copy_out_optimal_plan()
        } else {
            self.substitution_optimize()
        }
    }

    /// Memo of every query block, empty before [`init_root_plan`](Planner::init_root_plan).
    pub fn dump_memo(&self) -> String {
        self.blocks
            .iter()
            .map(|(block, optimizer)| format!("{}:\n{}", block, optimizer.memo().dump()))
            .join("\n")
    }

    pub fn memo(&self, block: QueryBlock) -> Option<&CascadesOptimizer> {
        self.blocks
            .iter()
            .find(|(b, _)| *b == block)
            .map(|(_, optimizer)| optimizer)
    }

    fn assemble(&self, mut roots: HashMap<QueryBlock, PlanNodeRef>) -> OptResult<Plan> {
        let plan = self.created_plan()?;
        let root = roots.remove(&QueryBlock::Main).ok_or_else(|| {
            OptimizerError::InternalError("main query block is missing".to_string())
        })?;
        let subqueries = plan
            .subqueries()
            .iter()
            .map(|s| {
                roots
                    .remove(&QueryBlock::Subquery(s.id()))
                    .map(|r| s.with_plan(r))
                    .ok_or_else(|| {
                        OptimizerError::InternalError(format!("{} was not optimized", s.id()))
                            .into()
                    })
            })
            .collect::<OptResult<Vec<Subquery>>>()?;
        let ctes: Vec<CteDefinition> = plan.ctes().iter().map(|c| c.with_plan(c.plan())).collect();
        Ok(Plan::new(root).with_subqueries(subqueries).with_ctes(ctes))
    }
}

/// Orders `ids` so that every id follows the ids it depends on.
fn dependency_order<K, F>(ids: &[K], dependencies: F) -> OptResult<Vec<K>>
where
    K: Copy + Eq + Hash + Display,
    F: Fn(K) -> OptResult<Vec<K>>,
{
    fn visit<K, F>(
        id: K,
        dependencies: &F,
        visiting: &mut HashSet<K>,
        done: &mut HashSet<K>,
        order: &mut Vec<K>,
    ) -> OptResult<()>
    where
        K: Copy + Eq + Hash + Display,
        F: Fn(K) -> OptResult<Vec<K>>,
    {
        if done.contains(&id) {
            return Ok(());
        }
        if !visiting.insert(id) {
            bail!(OptimizerError::InvalidPlan(format!("{} depends on itself", id)));
        }
        for dependency in dependencies(id)? {
            visit(dependency, dependencies, visiting, done, order)?;
        }
        visiting.remove(&id);
        done.insert(id);
        order.push(id);
        Ok(())
    }

    let mut visiting = HashSet::new();
    let mut done = HashSet::new();
    let mut order = Vec::with_capacity(ids.len());
    for id in ids {
        visit(*id, &dependencies, &mut visiting, &mut done, &mut order)?;
    }
    Ok(order)
}

fn logical_operators(root: &PlanNodeRef) -> Vec<LogicalOperator> {
    Plan::new(root.clone())
        .bfs_iterator()
        .filter_map(|n| n.operator().as_logical().cloned())
        .collect()
}

fn cte_dependencies(plan: &Plan, cte: CteId) -> OptResult<Vec<CteId>> {
    let definition = plan
        .cte(cte)
        .ok_or_else(|| OptimizerError::InvalidPlan(format!("undefined {}", cte)))?;
    Ok(logical_operators(&definition.plan())
        .iter()
        .filter_map(|op| match op {
            LogicalOperator::LogicalCteConsumer(consumer) => Some(consumer.cte()),
            LogicalOperator::LogicalCteAnchor(anchor) => Some(anchor.cte()),
            _ => None,
        })
        .unique()
        .collect())
}

fn subqueries_referenced(root: &PlanNodeRef) -> Vec<SubqueryId> {
    logical_operators(root)
        .iter()
        .flat_map(|op| {
            op.expressions()
                .into_iter()
                .flat_map(|e| e.subqueries())
                .collect::<Vec<_>>()
        })
        .unique()
        .collect()
}

fn subquery_dependencies(plan: &Plan, id: SubqueryId) -> OptResult<Vec<SubqueryId>> {
    let subquery = plan
        .subquery(id)
        .ok_or_else(|| OptimizerError::InvalidPlan(format!("unknown subquery {}", id)))?;
    Ok(subqueries_referenced(&subquery.plan()))
}

fn is_inner_join(node: &PlanNode) -> bool {
    matches!(
        node.operator(),
        Operator::Logical(LogicalOperator::LogicalJoin(join)) if join.is_inner()
    )
}

/// Collapses every maximal tree of inner joins into a join block over its leaves.
fn form_join_blocks(node: &PlanNodeRef) -> PlanNodeRef {
    if is_inner_join(node) {
        let mut leaves = vec![];
        let mut predicates = vec![];
        collect_join_tree(node, &mut leaves, &mut predicates);
        let leaves = leaves.iter().map(form_join_blocks).collect();
        return Rc::new(PlanNode::new(
            node.id(),
            Operator::Logical(LogicalOperator::LogicalJoinBlock(JoinBlock::new(predicates))),
            leaves,
        ));
    }

    let inputs = node.inputs().iter().map(form_join_blocks).collect();
    Rc::new(PlanNode::new(node.id(), node.operator().clone(), inputs))
}

fn collect_join_tree(
    node: &PlanNodeRef,
    leaves: &mut Vec<PlanNodeRef>,
    predicates: &mut Vec<Expr>,
) {
    match node.operator() {
        Operator::Logical(LogicalOperator::LogicalJoin(join)) if join.is_inner() => {
            if let Some(predicate) = join.predicate() {
                predicates.extend(predicate.clone().into_conjuncts());
            }
            for input in node.inputs() {
                collect_join_tree(input, leaves, predicates);
            }
        }
        _ => leaves.push(node.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnStatistics, InMemoryCatalog, TableDef};
    use crate::expr::{col, lit};
    use crate::operator::JoinType;
    use crate::plan::{LogicalPlanBuilder, SubqueryKind};

    fn catalog() -> Rc<dyn Catalog> {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table(TableDef::new("t1", vec!["id", "v"]), 100.0)
            .add_table(TableDef::new("t2", vec!["id", "v"]), 1000.0)
            .add_table(TableDef::new("t3", vec!["id", "v"]), 10.0);
        for table in ["t1", "t2", "t3"] {
            catalog.add_column_stats(table, "id", ColumnStatistics::new(10, 0.0));
        }
        Rc::new(catalog)
    }

    fn three_way_join(builder: &mut LogicalPlanBuilder) -> Plan {
        let t2 = builder.scan("t2").build().unwrap();
        let t3 = builder.scan("t3").build().unwrap();
        builder
            .scan("t1")
            .join(
                JoinType::Inner,
                Some(col("t1", "id").eq(col("t2", "id"))),
                t2,
            )
            .join(
                JoinType::Inner,
                Some(col("t2", "id").eq(col("t3", "id"))),
                t3,
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_inner_joins_form_one_block() {
        let options = QueryOptions {
            use_join_order_solver: true,
            ..QueryOptions::default()
        };
        let mut planner = Planner::new(catalog(), options).unwrap();
        let plan = three_way_join(&mut LogicalPlanBuilder::new());
        let created = planner.create_plan(plan).unwrap();

        let root = created.root();
        match root.operator() {
            Operator::Logical(LogicalOperator::LogicalJoinBlock(block)) => {
                assert_eq!(2, block.predicates().len())
            }
            other => panic!("expected join block, got {}", other),
        }
        assert_eq!(3, root.inputs().len());
    }

    #[test]
    fn test_unresolved_column_is_invalid() {
        let mut planner = Planner::new(catalog(), QueryOptions::default()).unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1")
            .filter(col("t9", "id").eq(lit(1.0)))
            .build()
            .unwrap();

        let err = planner.create_plan(plan).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<OptimizerError>(),
            Some(OptimizerError::InvalidPlan(_))
        ));
    }

    #[test]
    fn test_subquery_cacheability() {
        let mut planner = Planner::new(catalog(), QueryOptions::default()).unwrap();
        let mut builder = LogicalPlanBuilder::new();
        let uncorrelated = builder.scan("t3").build().unwrap();
        let correlated = builder
            .scan("t2")
            .filter(col("t2", "id").eq(col("t1", "id")))
            .build()
            .unwrap();
        let plan = builder
            .scan("t1")
            .filter(Expr::Subquery(SubqueryId(1)).and(Expr::Subquery(SubqueryId(2))))
            .with_subquery(SubqueryId(1), SubqueryKind::Exists, uncorrelated)
            .with_subquery(SubqueryId(2), SubqueryKind::Exists, correlated)
            .build()
            .unwrap();

        let created = planner.create_plan(plan).unwrap();
        let first = created.subquery(SubqueryId(1)).unwrap();
        let second = created.subquery(SubqueryId(2)).unwrap();
        assert!(first.is_cacheable());
        assert!(!second.is_cacheable());
        assert!(second.free_columns().contains(&ColumnRef::new("t1", "id")));
        assert!(planner
            .context()
            .correlated_columns()
            .contains(&ColumnRef::new("t1", "id")));
    }

    #[test]
    fn test_one_memo_per_query_block() {
        let mut planner = Planner::new(catalog(), QueryOptions::default()).unwrap();
        let mut builder = LogicalPlanBuilder::new();
        let subquery = builder.scan("t3").build().unwrap();
        let plan = builder
            .scan("t1")
            .filter(Expr::Subquery(SubqueryId(7)))
            .with_subquery(SubqueryId(7), SubqueryKind::Exists, subquery)
            .build()
            .unwrap();

        let optimized = planner.optimize(plan).unwrap();
        assert!(optimized.is_physical());
        assert!(optimized.subquery(SubqueryId(7)).unwrap().plan().operator().is_physical());
        assert!(planner.memo(QueryBlock::Main).is_some());
        assert!(planner.memo(QueryBlock::Subquery(SubqueryId(7))).is_some());
        let dump = planner.dump_memo();
        assert!(dump.contains("main:"));
        assert!(dump.contains("subquery $sq7:"));
    }

    #[test]
    fn test_unknown_subquery_is_invalid() {
        let mut planner = Planner::new(catalog(), QueryOptions::default()).unwrap();
        let plan = LogicalPlanBuilder::new()
            .scan("t1")
            .filter(Expr::Subquery(SubqueryId(3)))
            .build()
            .unwrap();
        assert!(planner.create_plan(plan).is_err());
    }

    #[test]
    fn test_steps_require_created_plan() {
        let mut planner = Planner::new(catalog(), QueryOptions::default()).unwrap();
        assert!(planner.init_root_plan().is_err());
        assert!(planner.optimize_root_plan().is_err());
        assert!(planner.substitution_optimize().is_err());
    }
}
