//! DPccp against enumeration of every bushy join tree on the classic graph shapes.

mod common;

use common::{contains_operator, physical_operators, planner, tpch_catalog};
use memo_optimizer::expr::{col, Expr};
use memo_optimizer::join_order::{brute_force_cost, solve, BitSet, JoinGraph, JoinRelation};
use memo_optimizer::operator::{
    CostContext, HashJoin, Join, JoinKeys, JoinType, LogicalOperator, NestedLoopJoin,
    PhysicalOperator, PhysicalOperatorTrait, TableScan,
};
use memo_optimizer::properties::LogicalProperty;
use memo_optimizer::optimizer::OptimizerContext;
use memo_optimizer::options::QueryOptions;
use memo_optimizer::plan::LogicalPlanBuilder;

fn context() -> OptimizerContext {
    OptimizerContext::new(tpch_catalog(), QueryOptions::default()).unwrap()
}

fn join_graph(context: &OptimizerContext, tables: &[&str], predicates: &[Expr]) -> JoinGraph {
    let relations = tables
        .iter()
        .map(|table| {
            let scan = LogicalOperator::LogicalScan(TableScan::new(*table));
            let (prop, stat) = context.derive(&scan, &[]).unwrap();
            JoinRelation::new(prop, stat.row_count())
        })
        .collect();
    JoinGraph::new(relations, predicates).unwrap()
}

/// A complete join tree built without any subset table.
struct EnumeratedTree {
    prop: LogicalProperty,
    rows: f64,
    cost: f64,
}

/// Every bushy tree over `set` that never joins two unconnected sides, with every usable join
/// method at every join.
fn every_tree(context: &OptimizerContext, graph: &JoinGraph, set: BitSet) -> Vec<EnumeratedTree> {
    if set.len() == 1 {
        let relation = graph.relation(set.min().unwrap());
        return vec![EnumeratedTree {
            prop: relation.prop.clone(),
            rows: relation.rows,
            cost: 0.0,
        }];
    }

    let mut trees = vec![];
    for left_set in set.subsets() {
        let right_set = set.difference(left_set);
        if left_set.is_empty()
            || right_set.is_empty()
            || !graph.is_connected(left_set)
            || !graph.is_connected(right_set)
            || graph.neighbours(left_set).intersection(right_set).is_empty()
        {
            continue;
        }
        let join = Join::inner(Expr::conjunction(graph.predicates_between(left_set, right_set)));
        let lefts = every_tree(context, graph, left_set);
        let rights = every_tree(context, graph, right_set);
        for left in &lefts {
            for right in &rights {
                let (prop, stat) = context
                    .derive(
                        &LogicalOperator::LogicalJoin(join.clone()),
                        &[(&left.prop, left.rows), (&right.prop, right.rows)],
                    )
                    .unwrap();
                let input_rows = [left.rows, right.rows];
                let cost_context = CostContext {
                    output_rows: stat.row_count(),
                    input_rows: &input_rows,
                    catalog: context.catalog(),
                };

                let mut methods: Vec<PhysicalOperator> =
                    vec![NestedLoopJoin::new(join.clone()).into()];
                if JoinKeys::extract(join.predicate(), &left.prop, &right.prop).is_hashable() {
                    methods.push(HashJoin::new(join.clone()).into());
                }
                for method in methods {
                    trees.push(EnumeratedTree {
                        prop: prop.clone(),
                        rows: stat.row_count(),
                        cost: method.cost(&cost_context).value() + left.cost + right.cost,
                    });
                }
            }
        }
    }
    trees
}

fn assert_close(expected: f64, actual: f64, what: &str) {
    assert!(
        (expected - actual).abs() <= expected.abs() * 1e-9,
        "{}: expected {} got {}",
        what,
        expected,
        actual
    );
}

fn assert_matches_brute_force(tables: &[&str], predicates: &[Expr]) {
    let context = context();
    let graph = join_graph(&context, tables, predicates);

    let solved = solve(&context, &graph).unwrap().unwrap();
    let dpccp = solved.cost.value();

    let trees = every_tree(&context, &graph, graph.all_vertices());
    assert!(!trees.is_empty());
    let cheapest = trees
        .iter()
        .map(|tree| tree.cost)
        .fold(f64::INFINITY, f64::min);
    assert_close(cheapest, dpccp, &format!("dpccp {} over {} trees", solved.tree, trees.len()));

    let subset_dp = brute_force_cost(&context, &graph).unwrap().unwrap();
    assert_close(subset_dp.value(), dpccp, "exhaustive subset split");

    let mut leaves = solved.tree.leaves();
    leaves.sort_unstable();
    assert_eq!((0..tables.len()).collect::<Vec<_>>(), leaves);
}

#[test]
fn test_chain() {
    assert_matches_brute_force(
        &["region", "nation", "customer", "orders"],
        &[
            col("region", "r_regionkey").eq(col("nation", "n_regionkey")),
            col("nation", "n_nationkey").eq(col("customer", "c_nationkey")),
            col("customer", "c_custkey").eq(col("orders", "o_custkey")),
        ],
    );
}

#[test]
fn test_star() {
    assert_matches_brute_force(
        &["lineitem", "orders", "part", "supplier"],
        &[
            col("lineitem", "l_orderkey").eq(col("orders", "o_orderkey")),
            col("lineitem", "l_partkey").eq(col("part", "p_partkey")),
            col("lineitem", "l_suppkey").eq(col("supplier", "s_suppkey")),
        ],
    );
}

#[test]
fn test_cycle() {
    assert_matches_brute_force(
        &["nation", "supplier", "customer", "region"],
        &[
            col("supplier", "s_nationkey").eq(col("nation", "n_nationkey")),
            col("customer", "c_nationkey").eq(col("nation", "n_nationkey")),
            col("customer", "c_nationkey").eq(col("supplier", "s_nationkey")),
            col("nation", "n_regionkey").eq(col("region", "r_regionkey")),
        ],
    );
}

#[test]
fn test_cycle_with_chord() {
    assert_matches_brute_force(
        &["customer", "orders", "nation", "supplier"],
        &[
            col("customer", "c_custkey").eq(col("orders", "o_custkey")),
            col("customer", "c_nationkey").eq(col("nation", "n_nationkey")),
            col("supplier", "s_nationkey").eq(col("nation", "n_nationkey")),
            col("supplier", "s_nationkey").eq(col("customer", "c_nationkey")),
        ],
    );
}

#[test]
fn test_disconnected_relations_are_still_joined() {
    let context = context();
    let graph = join_graph(
        &context,
        &["nation", "region", "part"],
        &[col("nation", "n_regionkey").eq(col("region", "r_regionkey"))],
    );
    let solved = solve(&context, &graph).unwrap().unwrap();
    assert_eq!(3, solved.tree.leaves().len());
}

#[test]
fn test_solver_plans_join_blocks() {
    let mut builder = LogicalPlanBuilder::new();
    let nation = builder.scan("nation").build().unwrap();
    let customer = builder.scan("customer").build().unwrap();
    let orders = builder.scan("orders").build().unwrap();
    let plan = builder
        .scan("region")
        .join(
            JoinType::Inner,
            Some(col("region", "r_regionkey").eq(col("nation", "n_regionkey"))),
            nation,
        )
        .join(
            JoinType::Inner,
            Some(col("nation", "n_nationkey").eq(col("customer", "c_nationkey"))),
            customer,
        )
        .join(
            JoinType::Inner,
            Some(col("customer", "c_custkey").eq(col("orders", "o_custkey"))),
            orders,
        )
        .build()
        .unwrap();

    let options = QueryOptions {
        use_join_order_solver: true,
        ..QueryOptions::default()
    };
    let optimized = planner(options).optimize(plan).unwrap();

    assert!(optimized.is_physical());
    assert!(contains_operator(&optimized, "HashJoin"));
    let scans = physical_operators(&optimized)
        .into_iter()
        .filter(|name| *name == "PhysicalTableScan")
        .count();
    assert_eq!(4, scans);
}
