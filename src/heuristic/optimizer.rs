use std::convert::TryFrom;

use anyhow::ensure;
use log::{debug, trace};
use strum_macros::{Display, EnumString};

use crate::error::{OptResult, OptimizerError};
use crate::heuristic::graph::{HepOptimizerNode, PlanGraph};
use crate::heuristic::HepNodeId;
use crate::optimizer::{OptExpr, Optimizer, OptimizerContext};
use crate::plan::Plan;
use crate::rules::{Binding, Rule, RuleImpl, RuleResult};

/// Match order of plan tree.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MatchOrder {
    BottomUp,
    TopDown,
}

pub struct HepOptimizer {
    match_order: MatchOrder,
    /// Max number of iteration
    max_iter_times: usize,
    rules: Vec<RuleImpl>,
    pub(super) graph: PlanGraph,
    context: OptimizerContext,
}

impl Optimizer for HepOptimizer {
    type Expr = HepOptimizerNode;
    type ExprHandle = HepNodeId;
    type Group = HepOptimizerNode;
    type GroupHandle = HepNodeId;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[group_handle]
    }

    fn expr_at(&self, expr_handle: HepNodeId) -> &HepOptimizerNode {
        &self.graph.graph[expr_handle]
    }

    /// Every node is a group of its own.
    fn group_exprs(&self, group_handle: HepNodeId) -> Vec<HepNodeId> {
        vec![group_handle]
    }

    fn expr_group(&self, expr_handle: HepNodeId) -> HepNodeId {
        expr_handle
    }

    fn find_best_plan(mut self) -> OptResult<Plan> {
        let mut iterations = 0;
        for _times in 0..self.max_iter_times {
            iterations += 1;
            // The plan no longer changes after iteration
            let mut fixed_point = true;
            let node_ids: Vec<HepNodeId> = self.graph.nodes_iter(self.match_order).collect();
            for node_id in node_ids {
                let operator = self.expr_at(node_id).operator().to_string();
                for rule in &self.rules.clone() {
                    if self.apply_rule(rule, node_id)? {
                        trace!("{} replaced {}", rule.rule_id(), operator);
                        fixed_point = false;
                        break;
                    }
                }

                if !fixed_point {
                    break;
                }
            }

            if fixed_point {
                break;
            }
        }
        debug!("substitution finished after {} iterations", iterations);

        self.graph.to_plan(&self.context)
    }
}

impl HepOptimizer {
    /// Fails with [`OptimizerError::InvalidPlan`] when `plan` is not a derived logical plan.
    pub fn new(
        match_order: MatchOrder,
        max_iter_times: usize,
        rules: Vec<RuleImpl>,
        plan: &Plan,
        context: OptimizerContext,
    ) -> OptResult<Self> {
        Ok(Self {
            match_order,
            max_iter_times,
            rules,
            graph: PlanGraph::try_from(plan)?,
            context,
        })
    }

    fn apply_rule(&mut self, rule: &RuleImpl, expr_handle: HepNodeId) -> OptResult<bool> {
        let original_hep_node_id = expr_handle;
        let bindings: Vec<_> = Binding::new(expr_handle, rule.pattern(), &*self).collect();
        for opt_node in bindings {
            if !rule.appliable(&opt_node, &*self) {
                continue;
            }
            let mut results = RuleResult::new();
            rule.apply(opt_node, &*self, &mut results)?;

            let mut results = results.results();
            if let Some(new_expr) = results.next() {
                ensure!(
                    results.next().is_none(),
                    OptimizerError::InternalError(format!(
                        "{} returned more than one substitution",
                        rule.rule_id()
                    ))
                );
                return self.graph.replace_opt_expression(
                    new_expr,
                    original_hep_node_id,
                    &self.context,
                );
            }
        }

        // No transformation generated.
        Ok(false)
    }
}
