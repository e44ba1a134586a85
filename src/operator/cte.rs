//! Common table expression operators.
//!
//! A CTE referenced more than once is bound as an anchor over the query body plus one consumer
//! leaf per reference. Exploration turns the anchor into `Sequence(CteProducer, body)` so the
//! definition is evaluated once, while each consumer may either read the produced rows
//! ([`CteScan`]) or evaluate the definition inline ([`SelectCte`]).

use std::fmt::{Display, Formatter};

use derive_more::{Deref, Display as DeriveDisplay, From};

use crate::cost::Cost;
use crate::operator::{CostContext, PhysicalOperatorTrait};

#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, DeriveDisplay, From)]
#[display(fmt = "cte{}", _0)]
pub struct CteId(pub u32);

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteAnchor {
    cte: CteId,
}

impl CteAnchor {
    pub fn new(cte: CteId) -> Self {
        Self { cte }
    }

    pub fn cte(&self) -> CteId {
        self.cte
    }
}

impl Display for CteAnchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cte)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteConsumer {
    cte: CteId,
    alias: String,
}

impl CteConsumer {
    pub fn new<S: Into<String>>(cte: CteId, alias: S) -> Self {
        Self {
            cte,
            alias: alias.into(),
        }
    }

    pub fn cte(&self) -> CteId {
        self.cte
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Display for CteConsumer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} as {}", self.cte, self.alias)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CteProducer {
    cte: CteId,
}

impl CteProducer {
    pub fn new(cte: CteId) -> Self {
        Self { cte }
    }

    pub fn cte(&self) -> CteId {
        self.cte
    }
}

impl Display for CteProducer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cte)
    }
}

/// Runs all inputs in order and returns the rows of the last one.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Sequence {}

impl Sequence {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "seq")
    }
}

/// Inline evaluation of a CTE definition under a consumer's alias.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SelectCte {
    cte: CteId,
    alias: String,
}

impl SelectCte {
    pub fn new<S: Into<String>>(cte: CteId, alias: S) -> Self {
        Self {
            cte,
            alias: alias.into(),
        }
    }

    pub fn cte(&self) -> CteId {
        self.cte
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl Display for SelectCte {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} as {}", self.cte, self.alias)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalCteProducer {
    producer: CteProducer,
}

impl PhysicalCteProducer {
    pub fn new(producer: CteProducer) -> Self {
        Self { producer }
    }
}

impl PhysicalOperatorTrait for PhysicalCteProducer {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.input_rows(0))
    }
}

/// Reads the rows materialized by the matching producer.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct CteScan {
    consumer: CteConsumer,
}

impl CteScan {
    pub fn new(consumer: CteConsumer) -> Self {
        Self { consumer }
    }
}

impl PhysicalOperatorTrait for CteScan {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalSequence {
    sequence: Sequence,
}

impl PhysicalSequence {
    pub fn new(sequence: Sequence) -> Self {
        Self { sequence }
    }
}

impl PhysicalOperatorTrait for PhysicalSequence {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalSelectCte {
    select: SelectCte,
}

impl PhysicalSelectCte {
    pub fn new(select: SelectCte) -> Self {
        Self { select }
    }
}

impl PhysicalOperatorTrait for PhysicalSelectCte {
    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.input_rows(0))
    }
}
