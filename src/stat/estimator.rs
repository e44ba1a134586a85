use std::collections::HashMap;

use strum_macros::{Display, EnumIter, EnumString};

use crate::catalog::{Catalog, ColumnStatistics};
use crate::error::{OptResult, OptimizerError};
use crate::operator::{CteId, JoinKeys, JoinType, LogicalOperator};
use crate::properties::LogicalProperty;
use crate::stat::{column_stats, selectivity};

/// Row count assumed for tables without statistics.
pub const DEFAULT_TABLE_ROWS: f64 = 1000.0;
/// Rows produced per input row by a set returning projection.
pub const PROJECT_SET_FAN_OUT: f64 = 10.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum EstimatorVersion {
    #[strum(serialize = "1.0")]
    V1_0,
    #[strum(serialize = "1.1")]
    V1_1,
}

/// Estimated input of an operator.
///
/// Inputs are always memo groups (or already estimated plan nodes), so a reference to a group
/// simply carries that group's own estimate.
pub struct EstimateInput<'a> {
    pub row_count: f64,
    pub prop: &'a LogicalProperty,
}

pub struct EstimateContext<'a> {
    pub catalog: &'a dyn Catalog,
    pub cte_row_counts: &'a HashMap<CteId, f64>,
}

/// A released, immutable set of cardinality formulas.
pub trait CardinalityEstimator: Send + Sync {
    fn version(&self) -> EstimatorVersion;

    /// Output row count of `operator`, never below 1.
    fn estimate(
        &self,
        operator: &LogicalOperator,
        output: &LogicalProperty,
        inputs: &[EstimateInput],
        context: &EstimateContext,
    ) -> OptResult<f64>;
}

lazy_static! {
    static ref ESTIMATORS: HashMap<EstimatorVersion, &'static dyn CardinalityEstimator> = {
        let mut estimators: HashMap<EstimatorVersion, &'static dyn CardinalityEstimator> =
            HashMap::new();
        estimators.insert(EstimatorVersion::V1_0, &EstimatorV1_0);
        estimators.insert(EstimatorVersion::V1_1, &EstimatorV1_1);
        estimators
    };
}

pub fn estimator(version: EstimatorVersion) -> OptResult<&'static dyn CardinalityEstimator> {
    ESTIMATORS
        .get(&version)
        .copied()
        .ok_or_else(|| OptimizerError::UnknownEstimatorVersion(version.to_string()).into())
}

/// The first released estimator.
pub struct EstimatorV1_0;

impl EstimatorV1_0 {
    fn default_estimate(inputs: &[EstimateInput]) -> f64 {
        inputs.iter().map(|i| i.row_count).fold(1.0, f64::max)
    }

    fn scan(
        table: &str,
        filter: Option<&crate::expr::Expr>,
        output: &LogicalProperty,
        catalog: &dyn Catalog,
    ) -> f64 {
        let rows = catalog.row_count(table).unwrap_or(DEFAULT_TABLE_ROWS);
        let sel = filter.map_or(1.0, |f| selectivity(f, output, catalog));
        (rows * sel).max(1.0)
    }

    fn aggregate(
        group_by: &[crate::expr::ColumnRef],
        input: &EstimateInput,
        catalog: &dyn Catalog,
    ) -> f64 {
        if group_by.is_empty() {
            return 1.0;
        }

        // keys without statistics contribute nothing to the product
        let distinct = group_by
            .iter()
            .filter_map(|key| column_stats(key, input.prop, catalog))
            .map(ColumnStatistics::distinct_count)
            .fold(1u64, |product, ndistinct| product.saturating_mul(ndistinct.max(1)));

        (distinct as f64).min(input.row_count).max(1.0)
    }

    fn join(
        join_type: JoinType,
        keys: &JoinKeys,
        left: &EstimateInput,
        right: &EstimateInput,
        catalog: &dyn Catalog,
    ) -> f64 {
        let fallback = left.row_count.max(right.row_count);
        let rows = if !keys.others().is_empty() {
            fallback
        } else {
            let mut divisor = 1.0;
            let mut known = true;
            for (l, r) in keys.pairs() {
                let dl = column_stats(l, left.prop, catalog).map(ColumnStatistics::distinct_count);
                let dr =
                    column_stats(r, right.prop, catalog).map(ColumnStatistics::distinct_count);
                match (dl, dr) {
                    (Some(dl), Some(dr)) => divisor *= dl.min(dr) as f64,
                    _ => {
                        known = false;
                        break;
                    }
                }
            }
            if known {
                (left.row_count * right.row_count / divisor).max(1.0)
            } else {
                fallback
            }
        };

        match join_type {
            JoinType::Semi | JoinType::Anti => rows.min(left.row_count).max(1.0),
            _ => rows,
        }
    }

    fn join_block(
        predicates: &[crate::expr::Expr],
        inputs: &[EstimateInput],
        catalog: &dyn Catalog,
    ) -> f64 {
        let fallback = Self::default_estimate(inputs);
        let owner = |c: &crate::expr::ColumnRef| inputs.iter().position(|i| i.prop.contains(c));

        let mut divisor = 1.0;
        for conjunct in predicates.iter().flat_map(|p| p.conjuncts()) {
            let (l, r) = match conjunct.as_column_equality() {
                Some(pair) => pair,
                None => return fallback,
            };
            match (owner(l), owner(r)) {
                (Some(li), Some(ri)) if li != ri => {
                    let dl = column_stats(l, inputs[li].prop, catalog);
                    let dr = column_stats(r, inputs[ri].prop, catalog);
                    match (dl, dr) {
                        (Some(dl), Some(dr)) => {
                            divisor *= dl.distinct_count().min(dr.distinct_count()) as f64
                        }
                        _ => return fallback,
                    }
                }
                _ => return fallback,
            }
        }

        let product: f64 = inputs.iter().map(|i| i.row_count).product();
        (product / divisor).max(1.0)
    }
}

impl CardinalityEstimator for EstimatorV1_0 {
    fn version(&self) -> EstimatorVersion {
        EstimatorVersion::V1_0
    }

    fn estimate(
        &self,
        operator: &LogicalOperator,
        output: &LogicalProperty,
        inputs: &[EstimateInput],
        context: &EstimateContext,
    ) -> OptResult<f64> {
        let catalog = context.catalog;
        let rows = match operator {
            LogicalOperator::LogicalLimit(limit) => (limit.limit() as f64).max(1.0),
            LogicalOperator::LogicalCteConsumer(consumer) => context
                .cte_row_counts
                .get(&consumer.cte())
                .copied()
                .unwrap_or(1.0)
                .max(1.0),
            LogicalOperator::LogicalProjectSet(_) => {
                (Self::default_estimate(inputs) * PROJECT_SET_FAN_OUT).max(1.0)
            }
            LogicalOperator::LogicalScan(scan) => {
                Self::scan(scan.table(), scan.filter(), output, catalog)
            }
            LogicalOperator::LogicalFilter(filter) => {
                let input = single_input(operator, inputs)?;
                (input.row_count * selectivity(filter.predicate(), input.prop, catalog)).max(1.0)
            }
            LogicalOperator::LogicalAggregate(agg) => {
                Self::aggregate(agg.group_by(), single_input(operator, inputs)?, catalog)
            }
            LogicalOperator::LogicalJoin(join) => {
                ensure_inputs(operator, inputs, 2)?;
                let keys = JoinKeys::extract(join.predicate(), inputs[0].prop, inputs[1].prop);
                Self::join(join.join_type(), &keys, &inputs[0], &inputs[1], catalog)
            }
            LogicalOperator::LogicalJoinBlock(block) => {
                Self::join_block(block.predicates(), inputs, catalog)
            }
            _ => Self::default_estimate(inputs),
        };
        Ok(rows)
    }
}

/// Same as [`EstimatorV1_0`] except that an append sums its inputs.
pub struct EstimatorV1_1;

impl CardinalityEstimator for EstimatorV1_1 {
    fn version(&self) -> EstimatorVersion {
        EstimatorVersion::V1_1
    }

    fn estimate(
        &self,
        operator: &LogicalOperator,
        output: &LogicalProperty,
        inputs: &[EstimateInput],
        context: &EstimateContext,
    ) -> OptResult<f64> {
        match operator {
            LogicalOperator::LogicalAppend(_) => {
                Ok(inputs.iter().map(|i| i.row_count).sum::<f64>().max(1.0))
            }
            _ => EstimatorV1_0.estimate(operator, output, inputs, context),
        }
    }
}

fn ensure_inputs(operator: &LogicalOperator, inputs: &[EstimateInput], n: usize) -> OptResult<()> {
    if inputs.len() != n {
        return Err(OptimizerError::InternalError(format!(
            "{} expects {} inputs for estimation, got {}",
            operator.kind(),
            n,
            inputs.len()
        ))
        .into());
    }
    Ok(())
}

fn single_input<'a, 'b>(
    operator: &LogicalOperator,
    inputs: &'a [EstimateInput<'b>],
) -> OptResult<&'a EstimateInput<'b>> {
    ensure_inputs(operator, inputs, 1)?;
    Ok(&inputs[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, TableDef};
    use crate::expr::{col, lit, ColumnRef};
    use crate::operator::{Aggregate, Filter, Join, Limit, TableScan};
    use crate::properties::BaseColumn;

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table(TableDef::new("t", vec!["a", "b"]), 100.0)
            .add_column_stats("t", "a", ColumnStatistics::new(10, 0.0))
            .add_column_stats("t", "b", ColumnStatistics::new(1000, 0.0))
            .add_table(TableDef::new("u", vec!["a"]), 50.0)
            .add_column_stats("u", "a", ColumnStatistics::new(25, 0.0));
        catalog
    }

    fn prop(relation: &str, columns: &[&str]) -> LogicalProperty {
        let mut prop = LogicalProperty::new(
            columns
                .iter()
                .map(|c| ColumnRef::new(relation, *c))
                .collect(),
        );
        for c in columns {
            prop = prop.with_lineage(ColumnRef::new(relation, *c), BaseColumn::new(relation, *c));
        }
        prop
    }

    fn estimate(
        operator: LogicalOperator,
        output: &LogicalProperty,
        inputs: &[EstimateInput],
    ) -> f64 {
        let catalog = catalog();
        let ctes = HashMap::new();
        let context = EstimateContext {
            catalog: &catalog,
            cte_row_counts: &ctes,
        };
        EstimatorV1_0
            .estimate(&operator, output, inputs, &context)
            .unwrap()
    }

    #[test]
    fn test_equality_filter() {
        let t = prop("t", &["a", "b"]);
        let rows = estimate(
            LogicalOperator::LogicalFilter(Filter::new(col("t", "a").eq(lit(1i64)))),
            &t,
            &[EstimateInput {
                row_count: 100.0,
                prop: &t,
            }],
        );
        assert_eq!(10.0, rows);

        // 100 / 1000 distinct is floored to one row
        let rows = estimate(
            LogicalOperator::LogicalFilter(Filter::new(col("t", "b").eq(lit(1i64)))),
            &t,
            &[EstimateInput {
                row_count: 100.0,
                prop: &t,
            }],
        );
        assert_eq!(1.0, rows);
    }

    #[test]
    fn test_scan_with_pushed_filter() {
        let t = prop("t", &["a", "b"]);
        let scan = TableScan::new("t").with_filter(col("t", "a").eq(lit(1i64)));
        assert_eq!(10.0, estimate(LogicalOperator::LogicalScan(scan), &t, &[]));
    }

    #[test]
    fn test_join() {
        let t = prop("t", &["a", "b"]);
        let u = prop("u", &["a"]);
        let inputs = [
            EstimateInput {
                row_count: 100.0,
                prop: &t,
            },
            EstimateInput {
                row_count: 50.0,
                prop: &u,
            },
        ];

        let equi = Join::new(JoinType::Inner, Some(col("t", "a").eq(col("u", "a"))));
        // 100 * 50 / min(10, 25)
        assert_eq!(500.0, estimate(LogicalOperator::LogicalJoin(equi), &t, &inputs));

        let theta = Join::new(JoinType::Inner, Some(col("t", "a").lt(col("u", "a"))));
        assert_eq!(100.0, estimate(LogicalOperator::LogicalJoin(theta), &t, &inputs));

        let cross = Join::new(JoinType::Inner, None);
        assert_eq!(5000.0, estimate(LogicalOperator::LogicalJoin(cross), &t, &inputs));
    }

    #[test]
    fn test_aggregate() {
        let t = prop("t", &["a", "b"]);
        let input = [EstimateInput {
            row_count: 100.0,
            prop: &t,
        }];

        let by_a = Aggregate::new(vec![ColumnRef::new("t", "a")], vec![]);
        assert_eq!(10.0, estimate(LogicalOperator::LogicalAggregate(by_a), &t, &input));

        // 10 * 1000 is capped by the input
        let by_ab = Aggregate::new(
            vec![ColumnRef::new("t", "a"), ColumnRef::new("t", "b")],
            vec![],
        );
        assert_eq!(100.0, estimate(LogicalOperator::LogicalAggregate(by_ab), &t, &input));

        // an unknown leading key does not hide the keys after it
        let t_with_unknown = prop("t", &["c", "a"]);
        let by_ca = Aggregate::new(
            vec![ColumnRef::new("t", "c"), ColumnRef::new("t", "a")],
            vec![],
        );
        let input_with_unknown = [EstimateInput {
            row_count: 100.0,
            prop: &t_with_unknown,
        }];
        assert_eq!(
            10.0,
            estimate(
                LogicalOperator::LogicalAggregate(by_ca),
                &t_with_unknown,
                &input_with_unknown
            )
        );

        let scalar = Aggregate::new(vec![], vec![]);
        assert_eq!(1.0, estimate(LogicalOperator::LogicalAggregate(scalar), &t, &input));
    }

    #[test]
    fn test_limit_and_fallback() {
        let t = prop("t", &["a", "b"]);
        let input = [EstimateInput {
            row_count: 100.0,
            prop: &t,
        }];
        assert_eq!(
            7.0,
            estimate(LogicalOperator::LogicalLimit(Limit::new(7)), &t, &input)
        );
        assert_eq!(
            1.0,
            estimate(LogicalOperator::LogicalLimit(Limit::new(0)), &t, &input)
        );
    }

    #[test]
    fn test_registry() {
        assert_eq!(
            EstimatorVersion::V1_0,
            estimator(EstimatorVersion::V1_0).unwrap().version()
        );
        assert_eq!(
            EstimatorVersion::V1_1,
            estimator("1.1".parse().unwrap()).unwrap().version()
        );
    }
}
