use crate::catalog::{Catalog, IndexDef};
use crate::error::OptResult;
use crate::expr::BinaryOperator;
use crate::operator::{
    IndexSeek, LogicalOperator, LogicalOperatorKind, Operator, PhysicalOperator, TableScan,
};
use crate::optimizer::Optimizer;
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleResult, RuleType};

/// Filtered scan implemented as a seek on an index whose leading column the filter restricts.
#[derive(Clone, Debug)]
pub struct IndexSeekRule {
    pattern: Pattern,
}

impl IndexSeekRule {
    pub fn new() -> Self {
        Self {
            pattern: Pattern::leaf(LogicalOperatorKind::LogicalScan),
        }
    }
}

impl Default for IndexSeekRule {
    fn default() -> Self {
        Self::new()
    }
}

/// First index of the scanned table usable for the scan's filter.
pub fn seekable_index<'a>(scan: &TableScan, catalog: &'a dyn Catalog) -> Option<&'a IndexDef> {
    let filter = scan.filter()?;
    let table = catalog.table(scan.table())?;
    let sargable: Vec<&str> = filter
        .conjuncts()
        .into_iter()
        .filter_map(|c| c.as_column_comparison())
        .filter(|(column, op, _)| {
            column.relation() == Some(scan.relation())
                && (*op == BinaryOperator::Eq || op.is_range())
        })
        .map(|(column, _, _)| column.name())
        .collect();

    table
        .indexes()
        .iter()
        .find(|index| index.leading_column().map_or(false, |c| sargable.contains(&c)))
}

fn bound_scan<'a, O: Optimizer>(
    input: &'a OptExpression<O>,
    optimizer: &'a O,
) -> Option<&'a TableScan> {
    match input.get_logical_operator(optimizer) {
        Ok(LogicalOperator::LogicalScan(scan)) => Some(scan),
        _ => None,
    }
}

impl Rule for IndexSeekRule {
    fn appliable<O: Optimizer>(&self, input: &OptExpression<O>, optimizer: &O) -> bool {
        bound_scan(input, optimizer)
            .and_then(|scan| seekable_index(scan, optimizer.context().catalog()))
            .is_some()
    }

    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let scan = match bound_scan(&input, optimizer) {
            Some(scan) => scan,
            None => return Ok(()),
        };
        if let Some(index) = seekable_index(scan, optimizer.context().catalog()) {
            let seek = IndexSeek::new(scan.clone(), index.clone());
            result.add(OptExpression::with_operator(
                Operator::Physical(PhysicalOperator::IndexSeek(seek)),
                vec![],
            ));
        }
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn rule_id(&self) -> RuleId {
        RuleId::IndexSeek
    }

    fn rule_type(&self) -> RuleType {
        RuleType::Implementation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryCatalog, TableDef};
    use crate::expr::{col, lit};

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog
            .add_table(TableDef::new("t", vec!["a", "b"]), 100.0)
            .add_index("t", IndexDef::new("t_b", vec!["b"], false));
        catalog
    }

    #[test]
    fn test_seek_on_leading_column() {
        let catalog = catalog();
        let scan = TableScan::new("t").with_filter(col("t", "b").gt(lit(3i64)));
        assert_eq!(
            Some("t_b"),
            seekable_index(&scan, &catalog).map(|i| i.name())
        );

        // literal on the left is normalized
        let scan = TableScan::new("t").with_filter(lit(3i64).eq(col("t", "b")));
        assert!(seekable_index(&scan, &catalog).is_some());
    }

    #[test]
    fn test_no_seek_without_sargable_predicate() {
        let catalog = catalog();
        assert!(seekable_index(&TableScan::new("t"), &catalog).is_none());

        let on_other_column = TableScan::new("t").with_filter(col("t", "a").eq(lit(1i64)));
        assert!(seekable_index(&on_other_column, &catalog).is_none());

        let not_eq = TableScan::new("t").with_filter(col("t", "b").not_eq(lit(1i64)));
        assert!(seekable_index(&not_eq, &catalog).is_none());
    }
}
