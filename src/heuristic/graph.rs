use std::collections::HashMap;
use std::convert::TryFrom;
use std::rc::Rc;

use anyhow::ensure;
use petgraph::prelude::{NodeIndex, StableGraph};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::{Directed, Direction};

use crate::cascades::GroupId;
use crate::cost::Cost;
use crate::error::{OptResult, OptimizerError};
use crate::heuristic::{HepOptimizer, MatchOrder};
use crate::operator::{CostContext, DerivePropContext, Operator, PhysicalOperatorTrait};
use crate::optimizer::{OptExpr, OptExprHandle, OptGroup, OptGroupHandle, OptimizerContext};
use crate::plan::{Plan, PlanNode, PlanNodeBuilder, PlanNodeId, PlanNodeRef};
use crate::properties::{LogicalProperty, PhysicalPropertySet};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::OptExpression;
use crate::stat::Statistics;

/// Edges point from a node to its inputs and carry the input position.
type HepGraph = StableGraph<HepOptimizerNode, usize, Directed, PlanNodeId>;
pub type HepNodeId = NodeIndex<PlanNodeId>;

pub struct HepOptimizerNode {
    id: HepNodeId,
    operator: Operator,
    logical_prop: LogicalProperty,
    stat: Statistics,
}

/// A plan should be a single root dag.
pub(super) struct PlanGraph {
    pub(super) graph: HepGraph,
    root: HepNodeId,
}

impl PlanGraph {
    pub(super) fn nodes_iter(
        &self,
        match_order: MatchOrder,
    ) -> Box<dyn Iterator<Item = HepNodeId>> {
        match match_order {
            MatchOrder::TopDown => Box::new(self.top_down_node_iters()),
            MatchOrder::BottomUp => Box::new(self.bottom_up_node_iters()),
        }
    }

    /// Inputs of a node in position order.
    pub(super) fn inputs(&self, node_id: HepNodeId) -> Vec<HepNodeId> {
        let mut edges: Vec<(usize, HepNodeId)> = self
            .graph
            .edges_directed(node_id, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(position, _)| *position);
        edges.into_iter().map(|(_, input)| input).collect()
    }

    /// Replace relational expression with optimizer rule result.
    ///
    /// # Return
    ///
    /// The return value indicates whether graph changed.
    pub(super) fn replace_opt_expression(
        &mut self,
        opt_node: OptExpression<HepOptimizer>,
        origin_node_id: HepNodeId,
        context: &OptimizerContext,
    ) -> OptResult<bool> {
        let new_hep_node_id = self.insert_opt_node(&opt_node, Some(origin_node_id), context)?;
        if new_hep_node_id == origin_node_id {
            return Ok(false);
        }

        // Redirect parents's child to new node
        let parent_edges: Vec<(HepNodeId, usize)> = self
            .graph
            .edges_directed(origin_node_id, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
            .collect();
        for (parent, position) in parent_edges {
            self.graph.add_edge(parent, new_hep_node_id, position);
        }
        self.graph.remove_node(origin_node_id);

        if self.root == origin_node_id {
            self.root = new_hep_node_id;
        }
        Ok(true)
    }

    /// Adds the new operators of `opt_expr` to the graph.
    ///
    /// New logical nodes get their properties derived from their inputs. The only physical
    /// operator a rule may return is its root, which takes over the properties of the node it
    /// replaces.
    fn insert_opt_node(
        &mut self,
        opt_expr: &OptExpression<HepOptimizer>,
        replaced: Option<HepNodeId>,
        context: &OptimizerContext,
    ) -> OptResult<HepNodeId> {
        match opt_expr.node() {
            ExprHandleNode(expr_handle) => Ok(*expr_handle),
            GroupHandleNode(group_handle) => Ok(*group_handle),
            OperatorNode(operator) => {
                let input_hep_node_ids = opt_expr
                    .inputs()
                    .iter()
                    .map(|input_expr| self.insert_opt_node(input_expr, None, context))
                    .collect::<OptResult<Vec<_>>>()?;

                let (logical_prop, stat) = match (operator, replaced) {
                    (Operator::Logical(logical), _) => {
                        let inputs: Vec<(&LogicalProperty, f64)> = input_hep_node_ids
                            .iter()
                            .map(|id| {
                                let node = &self.graph[*id];
                                (&node.logical_prop, node.stat.row_count())
                            })
                            .collect();
                        context.derive(logical, &inputs)?
                    }
                    (Operator::Physical(_), Some(replaced)) => {
                        let node = &self.graph[replaced];
                        (node.logical_prop.clone(), node.stat.clone())
                    }
                    (Operator::Physical(physical), None) => {
                        return Err(OptimizerError::InternalError(format!(
                            "physical operator {} below the root of a rule result",
                            physical
                        ))
                        .into())
                    }
                };

                let hep_node = HepOptimizerNode {
                    id: HepNodeId::default(),
                    operator: operator.clone(),
                    logical_prop,
                    stat,
                };

                let new_node_id = self.graph.add_node(hep_node);
                // reset node id
                self.graph[new_node_id].id = new_node_id;
                for (position, input_hep_node_id) in input_hep_node_ids.into_iter().enumerate() {
                    self.graph.add_edge(new_node_id, input_hep_node_id, position);
                }
                Ok(new_node_id)
            }
        }
    }

    fn bfs_node_ids(&self) -> Vec<HepNodeId> {
        let mut ids = Vec::with_capacity(self.graph.node_count());
        let mut bfs = Bfs::new(&self.graph, self.root);
        while let Some(node_id) = bfs.next(&self.graph) {
            ids.push(node_id);
        }
        ids
    }

    /// Return node ids in bottom up order.
    fn bottom_up_node_iters(&self) -> impl Iterator<Item = HepNodeId> {
        self.bfs_node_ids().into_iter().rev()
    }

    /// Return node ids in top down order.
    fn top_down_node_iters(&self) -> impl Iterator<Item = HepNodeId> {
        self.bfs_node_ids().into_iter()
    }

    /// Builds the costed physical plan, failing on any node left logical.
    pub(super) fn to_plan(&self, context: &OptimizerContext) -> OptResult<Plan> {
        let mut next_plan_node_id = 0u32;
        let mut hep_node_id_to_plan_node = HashMap::<HepNodeId, PlanNodeRef>::new();
        // Traverse nodes in bottom up order, when visiting a node, its children all inserted
        // into map
        for node_id in self.bottom_up_node_iters() {
            if hep_node_id_to_plan_node.contains_key(&node_id) {
                continue;
            }
            let node = &self.graph[node_id];
            let physical = node.operator.as_physical().ok_or_else(|| {
                OptimizerError::Unimplementable {
                    group: GroupId(node_id.index()),
                    required: PhysicalPropertySet::default().to_string(),
                }
            })?;

            let inputs = self
                .inputs(node_id)
                .into_iter()
                .map(|input| {
                    hep_node_id_to_plan_node.get(&input).cloned().ok_or_else(|| {
                        OptimizerError::InternalError(format!(
                            "input {:?} of {:?} visited after its parent",
                            input, node_id
                        ))
                        .into()
                    })
                })
                .collect::<OptResult<Vec<PlanNodeRef>>>()?;

            let input_rows: Vec<f64> = inputs
                .iter()
                .map(|i| i.stat().map_or(1.0, Statistics::row_count))
                .collect();
            let local_cost = physical.cost(&CostContext {
                output_rows: node.stat.row_count(),
                input_rows: &input_rows,
                catalog: context.catalog(),
            });
            let cost = local_cost + inputs.iter().filter_map(|i| i.cost()).sum::<Cost>();
            let provided = physical
                .derive_properties(DerivePropContext {
                    required: &PhysicalPropertySet::default(),
                    input_count: inputs.len(),
                })
                .into_iter()
                .next()
                .map(|d| d.output_prop)
                .unwrap_or_default();

            next_plan_node_id += 1;
            let plan_node = PlanNodeBuilder::new(next_plan_node_id, &node.operator)
                .with_statistics(Some(node.stat.clone()))
                .with_logical_prop(Some(node.logical_prop.clone()))
                .with_physical_props(Some(provided))
                .with_cost(Some(cost))
                .add_inputs(inputs)
                .build();
            hep_node_id_to_plan_node.insert(node_id, Rc::new(plan_node));
        }

        hep_node_id_to_plan_node
            .get(&self.root)
            .map(|plan_node| Plan::new(plan_node.clone()))
            .ok_or_else(|| OptimizerError::InternalError("plan graph lost its root".to_string()).into())
    }
}

/// Converts from a derived plan to plan graph.
impl TryFrom<&Plan> for PlanGraph {
    type Error = anyhow::Error;

    fn try_from(plan: &Plan) -> OptResult<Self> {
        let mut graph = HepGraph::default();
        let mut inputs = HashMap::<PlanNodeId, Vec<PlanNodeId>>::new();
        let mut node_id_map = HashMap::<PlanNodeId, HepNodeId>::new();

        for plan_node_ref in plan.bfs_iterator() {
            inputs.insert(
                plan_node_ref.id(),
                plan_node_ref.inputs().iter().map(|i| i.id()).collect(),
            );
            let plan_node = HepOptimizerNode::try_from(&*plan_node_ref)?;
            let plan_node_id = graph.add_node(plan_node);
            graph[plan_node_id].id = plan_node_id;
            node_id_map.insert(plan_node_ref.id(), plan_node_id);
        }

        let hep_id = |id: &PlanNodeId| -> OptResult<HepNodeId> {
            node_id_map.get(id).copied().ok_or_else(|| {
                OptimizerError::InvalidPlan(format!("plan node {} is not reachable", id)).into()
            })
        };
        for (node_id, input_ids) in &inputs {
            let parent = hep_id(node_id)?;
            for (position, input_id) in input_ids.iter().enumerate() {
                graph.add_edge(parent, hep_id(input_id)?, position);
            }
        }

        let root = hep_id(&plan.root().id())?;
        Ok(Self { graph, root })
    }
}

impl<'a> TryFrom<&'a PlanNode> for HepOptimizerNode {
    type Error = anyhow::Error;

    fn try_from(t: &'a PlanNode) -> OptResult<Self> {
        let (logical_prop, stat) = match (t.logical_prop(), t.stat()) {
            (Some(prop), Some(stat)) => (prop.clone(), stat.clone()),
            _ => {
                return Err(OptimizerError::InternalError(format!(
                    "plan node {} is not derived",
                    t.id()
                ))
                .into())
            }
        };
        ensure!(
            t.operator().is_logical(),
            OptimizerError::InvalidPlan(format!("physical operator {} in input plan", t.operator()))
        );
        Ok(Self {
            id: HepNodeId::default(),
            operator: t.operator().clone(),
            logical_prop,
            stat,
        })
    }
}

impl OptGroup for HepOptimizerNode {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn statistics(&self) -> &Statistics {
        &self.stat
    }
}

impl OptExpr for HepOptimizerNode {
    type O = HepOptimizer;

    fn operator(&self) -> &Operator {
        &self.operator
    }

    fn inputs_len(&self, opt: &HepOptimizer) -> usize {
        opt.graph
            .graph
            .edges_directed(self.id, Direction::Outgoing)
            .count()
    }

    fn input_at(&self, idx: usize, opt: &HepOptimizer) -> HepNodeId {
        opt.graph.inputs(self.id)[idx]
    }
}

impl OptExprHandle for HepNodeId {
    type O = HepOptimizer;
}

impl OptGroupHandle for HepNodeId {
    type O = HepOptimizer;
}
