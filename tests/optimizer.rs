//! End to end tests of memo search on the TPC-H fixture.

mod common;

use std::collections::HashSet;

use common::{contains_operator, physical_operators, planner};
use memo_optimizer::cost::Cost;
use memo_optimizer::error::OptimizerError;
use memo_optimizer::expr::{col, lit};
use memo_optimizer::operator::{AggregateExpr, AggregateFunction, JoinType, Operator};
use memo_optimizer::options::{BudgetPolicy, OptimizerFeature, QueryOptions};
use memo_optimizer::plan::{LogicalPlanBuilder, Plan};
use memo_optimizer::planner::QueryBlock;

/// `customer ⋈ orders ⋈ lineitem` with a filter on the market segment.
fn customer_orders_lineitem() -> Plan {
    let mut builder = LogicalPlanBuilder::new();
    let orders = builder.scan("orders").build().unwrap();
    let lineitem = builder.scan("lineitem").build().unwrap();
    builder
        .scan("customer")
        .filter(col("customer", "c_mktsegment").eq(lit("BUILDING")))
        .join(
            JoinType::Inner,
            Some(col("customer", "c_custkey").eq(col("orders", "o_custkey"))),
            orders,
        )
        .join(
            JoinType::Inner,
            Some(col("orders", "o_orderkey").eq(col("lineitem", "l_orderkey"))),
            lineitem,
        )
        .build()
        .unwrap()
}

#[test]
fn test_optimization_is_deterministic() {
    let first = planner(QueryOptions::default())
        .optimize(customer_orders_lineitem())
        .unwrap();
    let second = planner(QueryOptions::default())
        .optimize(customer_orders_lineitem())
        .unwrap();

    assert_eq!(first.explain(), second.explain());
    assert_eq!(first.cost(), second.cost());
}

#[test]
fn test_memo_holds_no_duplicate_members() {
    let mut planner = planner(QueryOptions::default());
    planner.optimize(customer_orders_lineitem()).unwrap();
    let memo = planner.memo(QueryBlock::Main).unwrap().memo();

    let mut seen = HashSet::new();
    for group in memo.groups() {
        for member in group.members() {
            let member = memo.member(*member);
            assert_eq!(group.id(), member.group());
            assert!(
                seen.insert((member.operator().clone(), member.inputs().to_vec())),
                "duplicate member {}",
                member.operator()
            );
        }
    }
    assert_eq!(memo.member_count(), seen.len());
}

#[test]
fn test_winner_costs_include_their_inputs() {
    let mut planner = planner(QueryOptions::default());
    planner.optimize(customer_orders_lineitem()).unwrap();
    let memo = planner.memo(QueryBlock::Main).unwrap().memo();

    for group in memo.groups() {
        for (_, winner) in group.winners() {
            let member = memo.member(winner.member);
            let inputs: Cost = member
                .inputs()
                .iter()
                .zip(&winner.input_required)
                .map(|(input, required)| memo.group(*input).winner(required).unwrap().cost)
                .sum();
            assert!(winner.cost.is_valid());
            assert!(winner.cost >= inputs);
        }
    }
}

#[test]
fn test_memo_search_beats_substitution() {
    let searched = planner(QueryOptions::default())
        .optimize(customer_orders_lineitem())
        .unwrap();
    let substituted = planner(QueryOptions {
        use_memo: false,
        ..QueryOptions::default()
    })
    .optimize(customer_orders_lineitem())
    .unwrap();

    let searched = searched.cost().unwrap().value();
    let substituted = substituted.cost().unwrap().value();
    assert!(searched <= substituted + 1e-6, "{} > {}", searched, substituted);
}

#[test]
fn test_hash_join_disabled() {
    let options = QueryOptions::default().disable(OptimizerFeature::HashJoin);
    let mut planner = planner(options);
    let plan = planner.optimize(customer_orders_lineitem()).unwrap();

    assert!(plan.is_physical());
    assert!(!contains_operator(&plan, "HashJoin"));
    assert!(contains_operator(&plan, "NestedLoopJoin"));

    let memo = planner.memo(QueryBlock::Main).unwrap().memo();
    for group in memo.groups() {
        for member in group.members() {
            assert!(!matches!(
                memo.member(*member).operator(),
                Operator::Physical(p) if p.name() == "HashJoin"
            ));
        }
    }
}

#[test]
fn test_equi_joins_use_hash_join() {
    let plan = planner(QueryOptions::default())
        .optimize(customer_orders_lineitem())
        .unwrap();
    assert_eq!(
        2,
        physical_operators(&plan)
            .iter()
            .filter(|name| **name == "HashJoin")
            .count()
    );
}

#[test]
fn test_budget_stop_still_plans() {
    let mut options = QueryOptions::default();
    options.budget.max_rule_applications = 1;
    options.budget.policy = BudgetPolicy::Stop;
    let plan = planner(options)
        .optimize(customer_orders_lineitem())
        .unwrap();
    assert!(plan.is_physical());
}

#[test]
fn test_budget_fail_aborts() {
    let mut options = QueryOptions::default();
    options.budget.max_rule_applications = 1;
    options.budget.policy = BudgetPolicy::Fail;
    let err = planner(options)
        .optimize(customer_orders_lineitem())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<OptimizerError>(),
        Some(OptimizerError::BudgetExceeded(_))
    ));
}

#[test]
fn test_sorted_aggregate() {
    let plan = LogicalPlanBuilder::new()
        .scan("lineitem")
        .aggregate(
            vec![memo_optimizer::expr::ColumnRef::new("lineitem", "l_orderkey")],
            vec![AggregateExpr::new(
                AggregateFunction::Sum,
                Some(col("lineitem", "l_quantity")),
                "qty",
            )],
            None,
        )
        .build()
        .unwrap();

    let options = QueryOptions::default().enable(OptimizerFeature::StreamAgg);
    let optimized = planner(options).optimize(plan).unwrap();
    assert!(optimized.is_physical());
    let operators = physical_operators(&optimized);
    assert!(operators.contains(&"HashAgg") || operators.contains(&"StreamAgg"));
}
