use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::IntoStaticStr;

use crate::cost::Cost;
use crate::operator::*;

/// Physical relational operator.
#[enum_dispatch(PhysicalOperatorTrait)]
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, IntoStaticStr)]
pub enum PhysicalOperator {
    PhysicalTableScan,
    IndexSeek,
    PhysicalFilter,
    PhysicalProjection,
    HashJoin,
    NestedLoopJoin,
    HashAgg,
    StreamAgg,
    PhysicalSort,
    PhysicalLimit,
    PhysicalAppend,
    PhysicalSequence,
    PhysicalCteProducer,
    CteScan,
    PhysicalSelectCte,
    PhysicalGather,
    PhysicalBroadcast,
    PhysicalRedistribute,
    PhysicalProjectSet,
}

impl PhysicalOperator {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub fn is_join(&self) -> bool {
        matches!(
            self,
            PhysicalOperator::HashJoin(_) | PhysicalOperator::NestedLoopJoin(_)
        )
    }
}

impl Display for PhysicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = self.name();
        match self {
            PhysicalOperator::PhysicalTableScan(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::IndexSeek(op) => {
                write!(f, "{}({} using {})", name, **op, op.index().name())
            }
            PhysicalOperator::PhysicalFilter(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalProjection(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::HashJoin(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::NestedLoopJoin(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::HashAgg(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::StreamAgg(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalSort(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalLimit(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalAppend(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalSequence(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalCteProducer(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::CteScan(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalSelectCte(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalGather(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalBroadcast(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalRedistribute(op) => write!(f, "{}({})", name, **op),
            PhysicalOperator::PhysicalProjectSet(op) => write!(f, "{}({})", name, **op),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, TableDef};
    use crate::expr::{col, ColumnRef};
    use crate::properties::{PhysicalPropertySet, SortKey, SortOrder};

    fn cost_of(op: PhysicalOperator, output_rows: f64, input_rows: &[f64]) -> Cost {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_table(TableDef::new("t", vec!["a"]), 300.0);
        op.cost(&CostContext {
            output_rows,
            input_rows,
            catalog: &catalog,
        })
    }

    #[test]
    fn test_join_costs() {
        let join = Join::inner(Some(col("t", "a").eq(col("u", "a"))));
        assert_eq!(
            Cost::from(100.0 * 2.0 + 50.0 + 20.0),
            cost_of(HashJoin::new(join.clone()).into(), 20.0, &[100.0, 50.0])
        );
        assert_eq!(
            Cost::from(110.0 * 60.0),
            cost_of(NestedLoopJoin::new(join).into(), 20.0, &[100.0, 50.0])
        );
    }

    #[test]
    fn test_scan_cost_uses_table_rows() {
        let scan = PhysicalTableScan::new(TableScan::new("t"));
        assert_eq!(Cost::from(300.0), cost_of(scan.into(), 30.0, &[]));
    }

    #[test]
    fn test_stream_agg_requires_sorted_input() {
        let agg = StreamAgg::new(Aggregate::new(vec![ColumnRef::new("t", "a")], vec![]));
        let required = PhysicalPropertySet::default();
        let results = PhysicalOperator::from(agg).derive_properties(DerivePropContext {
            required: &required,
            input_count: 1,
        });

        let order = SortOrder::new(vec![SortKey::asc(ColumnRef::new("t", "a"))]);
        assert_eq!(1, results.len());
        assert_eq!(&order, results[0].input_required_props[0].order());
        assert_eq!(&order, results[0].output_prop.order());
    }
}
