//! Data movement between workers. The optimizer only costs these, it does not schedule them.

use std::fmt::{Display, Formatter};

use derive_more::Deref;
use itertools::Itertools;

use crate::cost::Cost;
use crate::expr::ColumnRef;
use crate::operator::{CostContext, DerivePropContext, DerivePropResult, PhysicalOperatorTrait};
use crate::properties::{Distribution, PhysicalPropertySet};

#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Gather {}

impl Gather {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Gather {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "to coordinator")
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Broadcast {}

impl Broadcast {
    pub fn new() -> Self {
        Self {}
    }
}

impl Display for Broadcast {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "to all")
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Redistribute {
    keys: Vec<ColumnRef>,
}

impl Redistribute {
    pub fn new(keys: Vec<ColumnRef>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &[ColumnRef] {
        &self.keys
    }
}

impl Display for Redistribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "by [{}]", self.keys.iter().join(", "))
    }
}

fn distributed(distribution: Distribution, input_count: usize) -> Vec<DerivePropResult> {
    vec![DerivePropResult {
        output_prop: PhysicalPropertySet::default().with_distribution(distribution),
        input_required_props: vec![PhysicalPropertySet::default(); input_count],
    }]
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalGather {
    gather: Gather,
}

impl PhysicalGather {
    pub fn new(gather: Gather) -> Self {
        Self { gather }
    }
}

impl PhysicalOperatorTrait for PhysicalGather {
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        distributed(Distribution::Singleton, context.input_count)
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows * 0.1)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalBroadcast {
    broadcast: Broadcast,
}

impl PhysicalBroadcast {
    pub fn new(broadcast: Broadcast) -> Self {
        Self { broadcast }
    }
}

impl PhysicalOperatorTrait for PhysicalBroadcast {
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        distributed(Distribution::Replicated, context.input_count)
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Deref)]
pub struct PhysicalRedistribute {
    redistribute: Redistribute,
}

impl PhysicalRedistribute {
    pub fn new(redistribute: Redistribute) -> Self {
        Self { redistribute }
    }
}

impl PhysicalOperatorTrait for PhysicalRedistribute {
    fn derive_properties(&self, context: DerivePropContext) -> Vec<DerivePropResult> {
        distributed(
            Distribution::Hashed(self.redistribute.keys().to_vec()),
            context.input_count,
        )
    }

    fn cost(&self, context: &CostContext) -> Cost {
        Cost::from(context.output_rows)
    }
}
