//! Abstractions shared by the heuristic and the cascades optimizer.
//!
//! Rules only see the traits in this module, so the same rule implementation runs against a
//! petgraph plan graph as well as against the memo.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use anyhow::ensure;

use crate::catalog::Catalog;
use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, SubqueryId};
use crate::operator::{CteId, LogicalOperator, Operator};
use crate::options::QueryOptions;
use crate::plan::{Plan, PlanNode, PlanNodeBuilder, PlanNodeRef};
use crate::properties::LogicalProperty;
use crate::stat::{estimator, CardinalityEstimator, EstimateContext, EstimateInput, Statistics};

pub trait Optimizer: Sized {
    type Expr: OptExpr<O = Self>;
    type ExprHandle: OptExprHandle<O = Self>;
    type Group: OptGroup;
    type GroupHandle: OptGroupHandle<O = Self>;

    fn context(&self) -> &OptimizerContext;

    fn group_at(&self, group_handle: Self::GroupHandle) -> &Self::Group;

    fn expr_at(&self, expr_handle: Self::ExprHandle) -> &Self::Expr;

    /// Alternatives of a group, in insertion order.
    fn group_exprs(&self, group_handle: Self::GroupHandle) -> Vec<Self::ExprHandle>;

    /// Group an expression belongs to.
    fn expr_group(&self, expr_handle: Self::ExprHandle) -> Self::GroupHandle;

    fn find_best_plan(self) -> OptResult<Plan>;
}

pub trait OptExpr {
    type O: Optimizer;

    fn operator(&self) -> &Operator;

    fn inputs_len(&self, opt: &Self::O) -> usize;

    fn input_at(&self, idx: usize, opt: &Self::O) -> <Self::O as Optimizer>::GroupHandle;
}

pub trait OptGroup {
    fn logical_prop(&self) -> &LogicalProperty;

    fn statistics(&self) -> &Statistics;
}

pub trait OptExprHandle: Copy + Clone + Debug + Hash + Eq {
    type O: Optimizer<ExprHandle = Self>;
}

pub trait OptGroupHandle: Copy + Clone + Debug + Hash + Eq {
    type O: Optimizer<GroupHandle = Self>;
}

/// Query level state shared by every optimizer working on the query.
#[derive(Clone)]
pub struct OptimizerContext {
    catalog: Rc<dyn Catalog>,
    options: QueryOptions,
    estimator: &'static dyn CardinalityEstimator,
    ctes: HashMap<CteId, PlanNodeRef>,
    cte_props: HashMap<CteId, LogicalProperty>,
    cte_row_counts: HashMap<CteId, f64>,
    subquery_outer_refs: HashMap<SubqueryId, BTreeSet<ColumnRef>>,
    /// Outer columns read by correlated subqueries of the query.
    correlated_columns: BTreeSet<ColumnRef>,
}

impl OptimizerContext {
    pub fn new(catalog: Rc<dyn Catalog>, options: QueryOptions) -> OptResult<Self> {
        let estimator = estimator(options.estimator_version)?;
        Ok(Self {
            catalog,
            options,
            estimator,
            ctes: HashMap::new(),
            cte_props: HashMap::new(),
            cte_row_counts: HashMap::new(),
            subquery_outer_refs: HashMap::new(),
            correlated_columns: BTreeSet::new(),
        })
    }

    pub fn catalog(&self) -> &dyn Catalog {
        &*self.catalog
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn estimator(&self) -> &'static dyn CardinalityEstimator {
        self.estimator
    }

    /// Derived definition of a common table expression.
    pub fn cte_definition(&self, cte: CteId) -> OptResult<&PlanNodeRef> {
        self.ctes
            .get(&cte)
            .ok_or_else(|| OptimizerError::InvalidPlan(format!("undefined {}", cte)).into())
    }

    pub fn cte_prop(&self, cte: CteId) -> OptResult<&LogicalProperty> {
        self.cte_props
            .get(&cte)
            .ok_or_else(|| OptimizerError::InvalidPlan(format!("undefined {}", cte)).into())
    }

    pub fn subquery_outer_refs(&self, subquery: SubqueryId) -> Option<&BTreeSet<ColumnRef>> {
        self.subquery_outer_refs.get(&subquery)
    }

    pub fn correlated_columns(&self) -> &BTreeSet<ColumnRef> {
        &self.correlated_columns
    }

    /// Registers an already derived CTE definition.
    pub(crate) fn add_cte(&mut self, cte: CteId, definition: PlanNodeRef) -> OptResult<()> {
        let (prop, stat) = match (definition.logical_prop(), definition.stat()) {
            (Some(prop), Some(stat)) => (prop.clone(), stat.row_count()),
            _ => {
                return Err(OptimizerError::InternalError(format!(
                    "definition of {} is not derived",
                    cte
                ))
                .into())
            }
        };
        self.cte_props.insert(cte, prop);
        self.cte_row_counts.insert(cte, stat);
        self.ctes.insert(cte, definition);
        Ok(())
    }

    pub(crate) fn add_subquery(&mut self, subquery: SubqueryId, outer_refs: BTreeSet<ColumnRef>) {
        self.correlated_columns.extend(outer_refs.iter().cloned());
        self.subquery_outer_refs.insert(subquery, outer_refs);
    }

    /// Logical property and cardinality of `operator` over inputs with the given properties and
    /// row counts.
    pub fn derive(
        &self,
        operator: &LogicalOperator,
        inputs: &[(&LogicalProperty, f64)],
    ) -> OptResult<(LogicalProperty, Statistics)> {
        let props: Vec<&LogicalProperty> = inputs.iter().map(|(prop, _)| *prop).collect();
        let prop = operator.derive_logical_prop(&props, self)?;

        let estimate_inputs: Vec<EstimateInput> = inputs
            .iter()
            .map(|(prop, row_count)| EstimateInput {
                row_count: *row_count,
                prop,
            })
            .collect();
        let context = EstimateContext {
            catalog: &*self.catalog,
            cte_row_counts: &self.cte_row_counts,
        };
        let rows = self
            .estimator
            .estimate(operator, &prop, &estimate_inputs, &context)?;
        ensure!(
            rows.is_finite() && rows >= 1.0,
            OptimizerError::InternalError(format!("cardinality {} estimated for {}", rows, operator))
        );

        Ok((prop, Statistics::new(rows)))
    }

    /// Derives properties and statistics of every node of a logical plan, bottom up.
    pub fn derive_plan(&self, node: &PlanNode) -> OptResult<PlanNodeRef> {
        let inputs = node
            .inputs()
            .iter()
            .map(|input| self.derive_plan(input))
            .collect::<OptResult<Vec<_>>>()?;

        let operator = node.operator().as_logical().ok_or_else(|| {
            OptimizerError::InvalidPlan(format!("physical operator {} in input plan", node.operator()))
        })?;

        let mut derived_inputs = Vec::with_capacity(inputs.len());
        for input in &inputs {
            match (input.logical_prop(), input.stat()) {
                (Some(prop), Some(stat)) => derived_inputs.push((prop, stat.row_count())),
                _ => {
                    return Err(OptimizerError::InternalError(format!(
                        "input {} of {} is not derived",
                        input.id(),
                        operator
                    ))
                    .into())
                }
            }
        }
        let (prop, stat) = self.derive(operator, &derived_inputs)?;

        Ok(Rc::new(
            PlanNodeBuilder::new(node.id(), node.operator())
                .add_inputs(inputs)
                .with_logical_prop(Some(prop))
                .with_statistics(Some(stat))
                .build(),
        ))
    }
}
