use std::fmt::{Display, Formatter};

use itertools::Itertools;

use crate::expr::ColumnRef;
use crate::properties::PhysicalProp;

/// How rows are spread over workers.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub enum Distribution {
    #[default]
    Any,
    Singleton,
    Replicated,
    Hashed(Vec<ColumnRef>),
}

impl PhysicalProp for Distribution {
    fn satisfies(&self, required: &Self) -> bool {
        match required {
            Distribution::Any => true,
            other => self == other,
        }
    }
}

impl Display for Distribution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Distribution::Any => write!(f, "any"),
            Distribution::Singleton => write!(f, "singleton"),
            Distribution::Replicated => write!(f, "replicated"),
            Distribution::Hashed(keys) => write!(f, "hashed({})", keys.iter().join(", ")),
        }
    }
}
