use std::cmp::Ordering;

use crate::catalog::{Catalog, ColumnStatistics, Histogram};
use crate::expr::{BinaryOperator, ColumnRef, Expr, ScalarValue};
use crate::properties::LogicalProperty;

/// Selectivity used when nothing is known about a predicate.
pub const DEFAULT_SELECTIVITY: f64 = 1.0;

/// Expected fraction of rows of `input` surviving `predicate`, always in `[0, 1]`.
pub fn selectivity(predicate: &Expr, input: &LogicalProperty, catalog: &dyn Catalog) -> f64 {
    let sel = match predicate {
        Expr::And(conjuncts) => conjuncts
            .iter()
            .map(|c| selectivity(c, input, catalog))
            .product(),
        Expr::Or(disjuncts) => {
            1.0 - disjuncts
                .iter()
                .map(|d| 1.0 - selectivity(d, input, catalog))
                .product::<f64>()
        }
        Expr::Not(e) => 1.0 - selectivity(e, input, catalog),
        Expr::Literal(ScalarValue::Boolean(false)) => 0.0,
        Expr::InList { expr, list } => match expr.as_ref() {
            Expr::Column(c) => match column_stats(c, input, catalog) {
                Some(stats) => list
                    .iter()
                    .map(|item| match item {
                        Expr::Literal(v) => equality_selectivity(stats, v),
                        _ => 1.0 / stats.distinct_count() as f64,
                    })
                    .sum::<f64>()
                    .min(1.0),
                None => DEFAULT_SELECTIVITY,
            },
            _ => DEFAULT_SELECTIVITY,
        },
        Expr::Binary { .. } => binary_selectivity(predicate, input, catalog),
        _ => DEFAULT_SELECTIVITY,
    };

    sel.clamp(0.0, 1.0)
}

fn binary_selectivity(predicate: &Expr, input: &LogicalProperty, catalog: &dyn Catalog) -> f64 {
    if let Some((column, op, value)) = predicate.as_column_comparison() {
        let stats = match column_stats(column, input, catalog) {
            Some(stats) => stats,
            None => return DEFAULT_SELECTIVITY,
        };
        return match op {
            BinaryOperator::Eq => equality_selectivity(stats, value),
            BinaryOperator::NotEq => 1.0 - equality_selectivity(stats, value),
            op if op.is_range() => stats
                .histogram()
                .and_then(|h| histogram_selectivity(h, op, value))
                .unwrap_or(DEFAULT_SELECTIVITY),
            _ => DEFAULT_SELECTIVITY,
        };
    }

    if let Some((left, right)) = predicate.as_column_equality() {
        let distinct = [left, right]
            .iter()
            .filter_map(|c| column_stats(c, input, catalog))
            .map(ColumnStatistics::distinct_count)
            .max();
        if let Some(d) = distinct {
            return 1.0 / d as f64;
        }
    }

    DEFAULT_SELECTIVITY
}

fn equality_selectivity(stats: &ColumnStatistics, value: &ScalarValue) -> f64 {
    stats
        .mcv()
        .and_then(|mcv| mcv.frequency(value))
        .unwrap_or(1.0 / stats.distinct_count() as f64)
}

/// Statistics of the base column behind `column`, following the lineage recorded in `input`.
pub fn column_stats<'a>(
    column: &ColumnRef,
    input: &LogicalProperty,
    catalog: &'a dyn Catalog,
) -> Option<&'a ColumnStatistics> {
    input
        .base_column(column)
        .and_then(|base| catalog.column_stats(&base.table, &base.column))
}

fn compare(left: &ScalarValue, right: &ScalarValue) -> Ordering {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
        _ => left.cmp(right),
    }
}

/// Fraction of histogram rows satisfying `column op value`.
///
/// Buckets fully covered count entirely. Within the bucket containing `value` numeric data is
/// assumed uniformly spread.
pub fn histogram_selectivity(
    histogram: &Histogram,
    op: BinaryOperator,
    value: &ScalarValue,
) -> Option<f64> {
    let bounds = histogram.bounds();
    let nbuckets = histogram.num_buckets();
    if nbuckets == 0 || !op.is_range() {
        return None;
    }

    // 0: below every bucket, nbuckets + 1: above every bucket, otherwise the 1-based bucket.
    let which = if compare(value, &bounds[0]) == Ordering::Less {
        0
    } else {
        bounds
            .iter()
            .skip(1)
            .position(|upper| compare(value, upper) == Ordering::Less)
            .map(|idx| idx + 1)
            .unwrap_or(nbuckets + 1)
    };

    let in_bucket = |which: usize| -> f64 {
        match (bounds[which - 1].as_f64(), bounds[which].as_f64(), value.as_f64()) {
            (Some(lo), Some(hi), Some(v)) if hi > lo => ((v - lo) / (hi - lo)).clamp(0.0, 1.0),
            _ => 0.0,
        }
    };

    let n = nbuckets as f64;
    let sel = match op {
        BinaryOperator::Gt | BinaryOperator::GtEq => {
            if which == 0 {
                1.0
            } else if which == nbuckets + 1 {
                0.0
            } else {
                ((nbuckets - which) as f64 + (1.0 - in_bucket(which))) / n
            }
        }
        _ => {
            if which == 0 {
                0.0
            } else if which == nbuckets + 1 {
                1.0
            } else {
                ((which - 1) as f64 + in_bucket(which)) / n
            }
        }
    };
    Some(sel.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, McvList, TableDef};
    use crate::expr::{col, lit};
    use crate::properties::BaseColumn;

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table(TableDef::new("t", vec!["a", "b"]), 100.0)
            .add_column_stats(
                "t",
                "a",
                ColumnStatistics::new(10, 0.0).with_histogram(Histogram::new(
                    vec![0i64, 10, 20, 30, 40].into_iter().map(ScalarValue::from).collect(),
                )),
            )
            .add_column_stats(
                "t",
                "b",
                ColumnStatistics::new(4, 0.0)
                    .with_mcv(McvList::new(vec![(ScalarValue::from(7i64), 0.5)])),
            );
        catalog
    }

    fn input() -> LogicalProperty {
        LogicalProperty::new(vec![ColumnRef::new("t", "a"), ColumnRef::new("t", "b")])
            .with_lineage(ColumnRef::new("t", "a"), BaseColumn::new("t", "a"))
            .with_lineage(ColumnRef::new("t", "b"), BaseColumn::new("t", "b"))
    }

    #[test]
    fn test_equality_selectivity() {
        let catalog = catalog();
        let sel = selectivity(&col("t", "a").eq(lit(3i64)), &input(), &catalog);
        assert!((sel - 0.1).abs() < 1e-9);

        // most common value frequency wins over 1/distinct
        let sel = selectivity(&col("t", "b").eq(lit(7i64)), &input(), &catalog);
        assert!((sel - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_range_selectivity() {
        let catalog = catalog();
        let sel = selectivity(&col("t", "a").lt(lit(20i64)), &input(), &catalog);
        assert!((sel - 0.5).abs() < 1e-9);

        let sel = selectivity(&col("t", "a").gt(lit(35i64)), &input(), &catalog);
        assert!((sel - 0.125).abs() < 1e-9);

        assert_eq!(1.0, selectivity(&col("t", "a").gt(lit(-5i64)), &input(), &catalog));
        assert_eq!(0.0, selectivity(&col("t", "a").gt(lit(100i64)), &input(), &catalog));
    }

    #[test]
    fn test_boolean_combinations() {
        let catalog = catalog();
        let eq = col("t", "a").eq(lit(3i64));
        let and = eq.clone().and(col("t", "a").eq(lit(4i64)));
        assert!((selectivity(&and, &input(), &catalog) - 0.01).abs() < 1e-9);

        let or = eq.clone().or(col("t", "a").eq(lit(4i64)));
        assert!((selectivity(&or, &input(), &catalog) - 0.19).abs() < 1e-9);

        let not = Expr::Not(Box::new(eq));
        assert!((selectivity(&not, &input(), &catalog) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_column_is_not_selective() {
        let catalog = catalog();
        let sel = selectivity(&col("u", "z").eq(lit(1i64)), &input(), &catalog);
        assert_eq!(DEFAULT_SELECTIVITY, sel);
    }
}
