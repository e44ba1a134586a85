use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use enum_as_inner::EnumAsInner;
use strum_macros::{Display as StrumDisplay, EnumDiscriminants, EnumIter};

use crate::error::{OptResult, OptimizerError};
use crate::expr::{ColumnRef, Expr};
use crate::operator::*;
use crate::optimizer::OptimizerContext;
use crate::properties::{BaseColumn, LogicalProperty};

/// Logical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, EnumDiscriminants)]
#[strum_discriminants(name(LogicalOperatorKind), derive(Hash, StrumDisplay, EnumIter))]
pub enum LogicalOperator {
    LogicalScan(TableScan),
    LogicalFilter(Filter),
    LogicalProjection(Projection),
    LogicalJoin(Join),
    LogicalJoinBlock(JoinBlock),
    LogicalAggregate(Aggregate),
    LogicalSort(Sort),
    LogicalLimit(Limit),
    LogicalAppend(Append),
    LogicalCteAnchor(CteAnchor),
    LogicalCteConsumer(CteConsumer),
    LogicalCteProducer(CteProducer),
    LogicalSequence(Sequence),
    LogicalSelectCte(SelectCte),
    LogicalGather(Gather),
    LogicalBroadcast(Broadcast),
    LogicalRedistribute(Redistribute),
    LogicalProjectSet(ProjectSet),
}

/// Number of inputs an operator takes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == *k,
            Arity::AtLeast(k) => n >= *k,
        }
    }
}

impl LogicalOperator {
    pub fn kind(&self) -> LogicalOperatorKind {
        self.into()
    }

    pub fn arity(&self) -> Arity {
        match self {
            LogicalOperator::LogicalScan(_) | LogicalOperator::LogicalCteConsumer(_) => {
                Arity::Exactly(0)
            }
            LogicalOperator::LogicalJoin(_) | LogicalOperator::LogicalSequence(_) => {
                Arity::Exactly(2)
            }
            LogicalOperator::LogicalJoinBlock(_) => Arity::AtLeast(2),
            LogicalOperator::LogicalAppend(_) => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }

    /// Scalar expressions evaluated by this operator.
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            LogicalOperator::LogicalScan(scan) => scan.filter().into_iter().collect(),
            LogicalOperator::LogicalFilter(filter) => vec![filter.predicate()],
            LogicalOperator::LogicalProjection(p) => p.items().iter().map(|i| i.expr()).collect(),
            LogicalOperator::LogicalJoin(join) => join.predicate().into_iter().collect(),
            LogicalOperator::LogicalJoinBlock(block) => block.predicates().iter().collect(),
            LogicalOperator::LogicalAggregate(agg) => agg
                .aggregates()
                .iter()
                .filter_map(|a| a.arg())
                .chain(agg.having())
                .chain(agg.finalize().iter().map(|(_, e)| e))
                .collect(),
            LogicalOperator::LogicalProjectSet(ps) => vec![ps.function()],
            _ => vec![],
        }
    }

    /// Derives output columns, outer references and lineage from the inputs' properties.
    pub fn derive_logical_prop(
        &self,
        inputs: &[&LogicalProperty],
        context: &OptimizerContext,
    ) -> OptResult<LogicalProperty> {
        if !self.arity().accepts(inputs.len()) {
            return Err(OptimizerError::InvalidPlan(format!(
                "{} does not accept {} inputs",
                self.kind(),
                inputs.len()
            ))
            .into());
        }

        let prop = match self {
            LogicalOperator::LogicalScan(scan) => {
                let table = context.catalog().table(scan.table()).ok_or_else(|| {
                    OptimizerError::InvalidPlan(format!("unknown table {}", scan.table()))
                })?;
                let relation = scan.relation();
                let mut prop = LogicalProperty::new(
                    table
                        .columns()
                        .iter()
                        .map(|c| ColumnRef::new(relation, c.clone()))
                        .collect(),
                )
                .with_relation(relation);
                for c in table.columns() {
                    prop = prop.with_lineage(
                        ColumnRef::new(relation, c.clone()),
                        BaseColumn::new(table.name(), c.clone()),
                    );
                }
                if let Some(unknown) = scan
                    .filter()
                    .and_then(|f| f.columns().into_iter().find(|c| !prop.contains(c)))
                {
                    return Err(OptimizerError::InvalidPlan(format!(
                        "scan of {} filters on unknown column {}",
                        scan.table(),
                        unknown
                    ))
                    .into());
                }
                prop
            }
            LogicalOperator::LogicalProjection(projection) => {
                let input = inputs[0];
                let mut prop = LogicalProperty::new(
                    projection.items().iter().map(|i| i.output_column()).collect(),
                )
                .with_relations(input.relations().clone());
                for item in projection.items() {
                    if let Expr::Column(c) = item.expr() {
                        if let Some(base) = input.base_column(c) {
                            prop = prop.with_lineage(item.output_column(), base.clone());
                        }
                    }
                }
                prop
            }
            LogicalOperator::LogicalJoin(join) => match join.join_type() {
                JoinType::Semi | JoinType::Anti => inputs[0].clone(),
                _ => LogicalProperty::union(inputs),
            },
            LogicalOperator::LogicalJoinBlock(_) => LogicalProperty::union(inputs),
            LogicalOperator::LogicalAggregate(agg) => {
                let input = inputs[0];
                let mut prop = LogicalProperty::new(agg.output_columns())
                    .with_relations(input.relations().clone());
                for key in agg.group_by() {
                    if let Some(base) = input.base_column(key) {
                        prop = prop.with_lineage(key.clone(), base.clone());
                    }
                }
                prop
            }
            LogicalOperator::LogicalAppend(_) => {
                let mut prop = inputs[0].clone();
                for input in &inputs[1..] {
                    prop = prop.with_relations(input.relations().clone());
                }
                prop
            }
            LogicalOperator::LogicalSequence(_) => {
                let mut prop = inputs[inputs.len() - 1].clone();
                for input in inputs {
                    prop = prop.with_relations(input.relations().clone());
                }
                prop
            }
            LogicalOperator::LogicalCteConsumer(consumer) => {
                let definition = context.cte_prop(consumer.cte())?;
                definition.renamed(consumer.alias())
            }
            LogicalOperator::LogicalSelectCte(select) => inputs[0].renamed(select.alias()),
            LogicalOperator::LogicalProjectSet(ps) => {
                let mut columns = inputs[0].output_columns().to_vec();
                columns.push(ps.output_column());
                let mut prop = inputs[0].clone();
                prop.set_output_columns(columns);
                prop
            }
            LogicalOperator::LogicalFilter(_)
            | LogicalOperator::LogicalSort(_)
            | LogicalOperator::LogicalLimit(_)
            | LogicalOperator::LogicalCteAnchor(_)
            | LogicalOperator::LogicalCteProducer(_)
            | LogicalOperator::LogicalGather(_)
            | LogicalOperator::LogicalBroadcast(_)
            | LogicalOperator::LogicalRedistribute(_) => inputs[0].clone(),
        };

        let outer_refs = self.outer_refs(inputs, &prop, context);
        Ok(prop.with_outer_refs(outer_refs))
    }

    /// Columns used in this subtree that nothing inside it produces.
    fn outer_refs(
        &self,
        inputs: &[&LogicalProperty],
        output: &LogicalProperty,
        context: &OptimizerContext,
    ) -> BTreeSet<ColumnRef> {
        let mut used: BTreeSet<ColumnRef> = inputs
            .iter()
            .flat_map(|i| i.outer_refs().iter().cloned())
            .collect();
        for expr in self.expressions() {
            used.extend(expr.columns());
            for subquery in expr.subqueries() {
                if let Some(refs) = context.subquery_outer_refs(subquery) {
                    used.extend(refs.iter().cloned());
                }
            }
        }

        used.into_iter()
            .filter(|c| !output.contains(c) && !inputs.iter().any(|i| i.contains(c)))
            .collect()
    }
}

impl Display for LogicalOperator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let kind = self.kind();
        match self {
            LogicalOperator::LogicalScan(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalFilter(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalProjection(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalJoin(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalJoinBlock(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalAggregate(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalSort(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalLimit(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalAppend(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalCteAnchor(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalCteConsumer(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalCteProducer(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalSequence(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalSelectCte(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalGather(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalBroadcast(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalRedistribute(op) => write!(f, "{}({})", kind, op),
            LogicalOperator::LogicalProjectSet(op) => write!(f, "{}({})", kind, op),
        }
    }
}
