use std::fmt::{Display, Formatter};

use derive_more::Deref;
use itertools::Itertools;
use strum_macros::{Display as StrumDisplay, EnumString};

use crate::cost::Cost;
use crate::expr::{ColumnRef, Expr};
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};
use crate::properties::{PhysicalPropertySet, SortKey, SortOrder};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    CountStar,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct AggregateExpr {
    func: AggregateFunction,
    arg: Option<Expr>,
    alias: String,
}

impl AggregateExpr {
    pub fn new<S: Into<String>>(func: AggregateFunction, arg: Option<Expr>, alias: S) -> Self {
        Self {
            func,
            arg,
            alias: alias.into(),
        }
    }

    pub fn func(&self) -> AggregateFunction {
        self.func
    }

    pub fn arg(&self) -> Option<&Expr> {
        self.arg.as_ref()
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn output_column(&self) -> ColumnRef {
        ColumnRef::unqualified(self.alias.clone())
    }
}

impl Display for AggregateExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}({}) as {}", self.func, arg, self.alias),
            None => write!(f, "{}(*) as {}", self.func, self.alias),
        }
    }
}

/// Phase of a possibly split aggregation.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum AggregatePhase {
    /// Unsplit aggregation.
    Global,
    /// Partial aggregation close to the data.
    Local,
    /// Recombines partial results of a local aggregation.
    Derived,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Aggregate {
    group_by: Vec<ColumnRef>,
    aggregates: Vec<AggregateExpr>,
    having: Option<Expr>,
    phase: AggregatePhase,
    /// Output columns computed over `aggregates`, e.g. `avg = sum / count` after a split.
    finalize: Vec<(String, Expr)>,
}

impl Aggregate {
    pub fn new(group_by: Vec<ColumnRef>, aggregates: Vec<AggregateExpr>) -> Self {
        Self {
            group_by,
            aggregates,
            having: None,
            phase: AggregatePhase::Global,
            finalize: vec![],
        }
    }

    pub fn with_having(mut self, having: Option<Expr>) -> Self {
        self.having = having;
        self
    }

    pub fn with_phase(mut self, phase: AggregatePhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_finalize(mut self, finalize: Vec<(String, Expr)>) -> Self {
        self.finalize = finalize;
        self
    }

    pub fn group_by(&self) -> &[ColumnRef] {
        &self.group_by
    }

    pub fn aggregates(&self) -> &[AggregateExpr] {
        &self.aggregates
    }

    pub fn having(&self) -> Option<&Expr> {
        self.having.as_ref()
    }

    pub fn phase(&self) -> AggregatePhase {
        self.phase
    }

    pub fn finalize(&self) -> &[(String, Expr)] {
        &self.finalize
    }

    pub fn output_columns(&self) -> Vec<ColumnRef> {
        let computed: Vec<ColumnRef> = if self.finalize.is_empty() {
            self.aggregates.iter().map(|a| a.output_column()).collect()
        } else {
            self.finalize
                .iter()
                .map(|(alias, _)| ColumnRef::unqualified(alias.clone()))
                .collect()
        };
        self.group_by.iter().cloned().chain(computed).collect()
    }
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] by [{}]",
            self.phase,
            self.aggregates.iter().join(", "),
            self.group_by.iter().join(", ")
        )?;
        if !self.finalize.is_empty() {
            write!(
                f,
                " finalize [{}]",
                self.finalize
                    .iter()
                    .map(|(alias, e)| format!("{} as {}", e, alias))
                    .join(", ")
            )?;
        }
        if let Some(having) = &self.having {
            write!(f, " having {}", having)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct HashAgg {
    aggregate: Aggregate,
}

impl HashAgg {
    pub fn new(aggregate: Aggregate) -> Self {
        Self { aggregate }
    }
}

impl PhysicalOperatorTrait for HashAgg {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.input_rows(0) + context.output_rows * 2.0)
    }
}

/// Aggregation over input sorted on the group keys.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct StreamAgg {
    aggregate: Aggregate,
}

impl StreamAgg {
    pub fn new(aggregate: Aggregate) -> Self {
        Self { aggregate }
    }

    fn group_order(&self) -> SortOrder {
        SortOrder::new(
            self.aggregate
                .group_by()
                .iter()
                .cloned()
                .map(SortKey::asc)
                .collect(),
        )
    }
}

impl PhysicalOperatorTrait for StreamAgg {
    fn derive_properties(&self, _context: DerivePropContext) -> Vec<DerivePropResult> {
        let order = self.group_order();
        vec![DerivePropResult {
            output_prop: PhysicalPropertySet::default().with_order(order.clone()),
            input_required_props: vec![PhysicalPropertySet::default().with_order(order)],
        }]
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows * 2.0)
    }
}
