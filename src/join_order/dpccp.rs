use std::collections::HashMap;

use log::{debug, trace};

use crate::cost::Cost;
use crate::error::OptResult;
use crate::expr::Expr;
use crate::join_order::{BitSet, JoinGraph, JoinMethod, JoinTree, SolvedJoin};
use crate::operator::{
    CostContext, HashJoin, Join, JoinKeys, LogicalOperator, NestedLoopJoin, PhysicalOperator,
    PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;
use crate::rules::{active_rule_ids, RuleId};

struct SubPlan {
    tree: JoinTree,
    prop: LogicalProperty,
    rows: f64,
    cost: Cost,
}

/// Bottom up dynamic programming over the subsets of a join graph.
pub struct JoinOrderSolver<'a> {
    context: &'a OptimizerContext,
    graph: &'a JoinGraph,
    hash_join: bool,
    nested_loop_join: bool,
}

impl<'a> JoinOrderSolver<'a> {
    pub fn new(context: &'a OptimizerContext, graph: &'a JoinGraph) -> Self {
        let rules = active_rule_ids(context.options());
        Self {
            context,
            graph,
            hash_join: rules.contains(RuleId::HashJoin),
            nested_loop_join: rules.contains(RuleId::NestedLoopJoin),
        }
    }

    pub fn solve(&self) -> OptResult<Option<SolvedJoin>> {
        let mut best = self.leaves();
        let pairs = self.csg_cmp_pairs();
        trace!("{} csg-cmp pairs in {} relations", pairs.len(), self.graph.vertex_count());
        for (s1, s2) in pairs {
            self.consider(&mut best, s1, s2)?;
        }
        Ok(self.finish(best))
    }

    /// Splits every connected subset in every way, ascending by subset.
    pub fn brute_force(&self) -> OptResult<Option<SolvedJoin>> {
        let mut best = self.leaves();
        let all = self.graph.all_vertices();
        for set in all.subsets() {
            if set.len() < 2 || !self.graph.is_connected(set) {
                continue;
            }
            for s1 in set.subsets() {
                let s2 = set.difference(s1);
                if s2.is_empty()
                    || !self.graph.is_connected(s1)
                    || !self.graph.is_connected(s2)
                    || self.graph.neighbours(s1).intersection(s2).is_empty()
                {
                    continue;
                }
                self.consider(&mut best, s1, s2)?;
            }
        }
        Ok(self.finish(best))
    }

    fn finish(&self, mut best: HashMap<BitSet, SubPlan>) -> Option<SolvedJoin> {
        let plan = best.remove(&self.graph.all_vertices())?;
        debug!("best join order {} with cost {}", plan.tree, plan.cost);
        Some(SolvedJoin {
            tree: plan.tree,
            rows: plan.rows,
            cost: plan.cost,
        })
    }

    fn leaves(&self) -> HashMap<BitSet, SubPlan> {
        (0..self.graph.vertex_count())
            .map(|vertex| {
                let relation = self.graph.relation(vertex);
                let plan = SubPlan {
                    tree: JoinTree::Leaf(self.graph.relation_index(vertex)),
                    prop: relation.prop.clone(),
                    rows: relation.rows,
                    cost: Cost::ZERO,
                };
                (BitSet::singleton(vertex), plan)
            })
            .collect()
    }

    /// Joins the best plans of `s1` and `s2` in both orientations with every usable method, and
    /// keeps the result for `s1 ∪ s2` when it is strictly cheaper than the one known.
    fn consider(
        &self,
        best: &mut HashMap<BitSet, SubPlan>,
        s1: BitSet,
        s2: BitSet,
    ) -> OptResult<()> {
        let set = s1.union(s2);
        let predicate = Expr::conjunction(self.graph.predicates_between(s1, s2));

        for (l, r) in [(s1, s2), (s2, s1)] {
            let candidate = match (best.get(&l), best.get(&r)) {
                (Some(left), Some(right)) => self.cheapest_join(left, right, predicate.clone())?,
                _ => return Ok(()),
            };
            if let Some(candidate) = candidate {
                let better = best
                    .get(&set)
                    .map_or(true, |current| candidate.cost < current.cost);
                if better {
                    trace!("{} = {} with cost {}", set, candidate.tree, candidate.cost);
                    best.insert(set, candidate);
                }
            }
        }
        Ok(())
    }

    fn cheapest_join(
        &self,
        left: &SubPlan,
        right: &SubPlan,
        predicate: Option<Expr>,
    ) -> OptResult<Option<SubPlan>> {
        let join = Join::inner(predicate);
        let (prop, stat) = self.context.derive(
            &LogicalOperator::LogicalJoin(join.clone()),
            &[(&left.prop, left.rows), (&right.prop, right.rows)],
        )?;
        let input_rows = [left.rows, right.rows];
        let cost_context = CostContext {
            output_rows: stat.row_count(),
            input_rows: &input_rows,
            catalog: self.context.catalog(),
        };

        let mut cheapest: Option<(JoinMethod, Cost)> = None;
        for method in self.methods(&join, left, right) {
            let operator: PhysicalOperator = match method {
                JoinMethod::Hash => HashJoin::new(join.clone()).into(),
                JoinMethod::NestedLoop => NestedLoopJoin::new(join.clone()).into(),
            };
            let cost = operator.cost(&cost_context) + left.cost + right.cost;
            if cheapest.map_or(true, |(_, c)| cost < c) {
                cheapest = Some((method, cost));
            }
        }

        Ok(cheapest.map(|(method, cost)| SubPlan {
            tree: JoinTree::Join {
                method,
                join,
                left: Box::new(left.tree.clone()),
                right: Box::new(right.tree.clone()),
            },
            prop,
            rows: stat.row_count(),
            cost,
        }))
    }

    /// Usable join methods, hash join first.
    fn methods(&self, join: &Join, left: &SubPlan, right: &SubPlan) -> Vec<JoinMethod> {
        let mut methods = vec![];
        if self.hash_join {
            let correlated = self.context.correlated_columns();
            let hashable = JoinKeys::extract(join.predicate(), &left.prop, &right.prop).is_hashable();
            if hashable && !left.prop.output_columns().iter().any(|c| correlated.contains(c)) {
                methods.push(JoinMethod::Hash);
            }
        }
        if self.nested_loop_join {
            methods.push(JoinMethod::NestedLoop);
        }
        methods
    }

    /// Every csg-cmp pair once, processed smallest union first so that both sides are final
    /// when a pair is joined.
    fn csg_cmp_pairs(&self) -> Vec<(BitSet, BitSet)> {
        let mut pairs = vec![];
        for s1 in self.enumerate_csg() {
            for s2 in self.enumerate_cmp(s1) {
                pairs.push((s1, s2));
            }
        }
        pairs.sort_by_key(|(s1, s2)| s1.union(*s2).len());
        pairs
    }

    fn enumerate_csg(&self) -> Vec<BitSet> {
        let mut csgs = vec![];
        for i in (0..self.graph.vertex_count()).rev() {
            let vi = BitSet::singleton(i);
            csgs.push(vi);
            self.enumerate_csg_rec(vi, BitSet::first(i + 1), &mut csgs);
        }
        csgs
    }

    fn enumerate_csg_rec(&self, s: BitSet, x: BitSet, out: &mut Vec<BitSet>) {
        let n = self.graph.neighbours(s).difference(x);
        if n.is_empty() {
            return;
        }
        for s_prime in n.subsets() {
            out.push(s.union(s_prime));
        }
        let x = x.union(n);
        for s_prime in n.subsets() {
            self.enumerate_csg_rec(s.union(s_prime), x, out);
        }
    }

    fn enumerate_cmp(&self, s1: BitSet) -> Vec<BitSet> {
        let mut cmps = vec![];
        let min = match s1.min() {
            Some(min) => min,
            None => return cmps,
        };
        let x = BitSet::first(min + 1).union(s1);
        let n = self.graph.neighbours(s1).difference(x);
        for i in n.iter().rev() {
            let vi = BitSet::singleton(i);
            cmps.push(vi);
            let bi = BitSet::first(i + 1).intersection(n);
            self.enumerate_csg_rec(vi, x.union(bi), &mut cmps);
        }
        cmps
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::catalog::{ColumnStatistics, InMemoryCatalog, TableDef};
    use crate::expr::{col, ColumnRef};
    use crate::join_order::JoinRelation;
    use crate::options::QueryOptions;
    use crate::properties::BaseColumn;

    fn context(tables: &[(&str, f64)]) -> OptimizerContext {
        let mut catalog = InMemoryCatalog::new();
        for (name, rows) in tables {
            catalog
                .add_table(TableDef::new(*name, vec!["id", "fk"]), *rows)
                .add_column_stats(name, "id", ColumnStatistics::new(*rows as u64, 0.0))
                .add_column_stats(name, "fk", ColumnStatistics::new(10, 0.0));
        }
        OptimizerContext::new(Rc::new(catalog), QueryOptions::default()).unwrap()
    }

    fn relation(name: &str, rows: f64) -> JoinRelation {
        let columns = vec![ColumnRef::new(name, "id"), ColumnRef::new(name, "fk")];
        let prop = LogicalProperty::new(columns.clone())
            .with_relation(name)
            .with_lineage(columns[0].clone(), BaseColumn::new(name, "id"))
            .with_lineage(columns[1].clone(), BaseColumn::new(name, "fk"));
        JoinRelation::new(prop, rows)
    }

    fn count_pairs(tables: &[(&str, f64)], predicates: &[Expr]) -> usize {
        let context = context(tables);
        let relations = tables.iter().map(|(n, r)| relation(n, *r)).collect();
        let graph = JoinGraph::new(relations, predicates).unwrap();
        JoinOrderSolver::new(&context, &graph).csg_cmp_pairs().len()
    }

    #[test]
    fn test_csg_cmp_pair_counts() {
        let tables = [("a", 10.0), ("b", 20.0), ("c", 30.0), ("d", 40.0)];
        // chain: (n^3 - n) / 6
        let chain = [
            col("a", "fk").eq(col("b", "id")),
            col("b", "fk").eq(col("c", "id")),
            col("c", "fk").eq(col("d", "id")),
        ];
        assert_eq!(10, count_pairs(&tables, &chain));

        // star: (n - 1) * 2^(n - 2)
        let star = [
            col("a", "fk").eq(col("b", "id")),
            col("a", "fk").eq(col("c", "id")),
            col("a", "fk").eq(col("d", "id")),
        ];
        assert_eq!(12, count_pairs(&tables, &star));

        // clique: (3^n - 2^(n + 1) + 1) / 2
        let clique = [
            col("a", "id").eq(col("b", "id")),
            col("a", "id").eq(col("c", "id")),
            col("a", "id").eq(col("d", "id")),
            col("b", "id").eq(col("c", "id")),
            col("b", "id").eq(col("d", "id")),
            col("c", "id").eq(col("d", "id")),
        ];
        assert_eq!(25, count_pairs(&tables, &clique));
    }

    #[test]
    fn test_single_relation_is_returned_unchanged() {
        let context = context(&[("a", 10.0)]);
        let graph = JoinGraph::new(vec![relation("a", 10.0)], &[]).unwrap();
        let solved = JoinOrderSolver::new(&context, &graph).solve().unwrap().unwrap();
        assert_eq!(JoinTree::Leaf(0), solved.tree);
        assert_eq!(Cost::ZERO, solved.cost);
    }
}
