use std::fmt::{Display, Formatter};

use crate::properties::{Distribution, PhysicalProp, SortOrder};

/// Physical properties required from or provided by a plan.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct PhysicalPropertySet {
    order: SortOrder,
    distribution: Distribution,
}

impl PhysicalPropertySet {
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn order(&self) -> &SortOrder {
        &self.order
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// The same requirement with the ordering dropped, what a sort enforcer asks of its input.
    pub fn without_order(&self) -> Self {
        Self {
            order: SortOrder::default(),
            distribution: self.distribution.clone(),
        }
    }
}

impl PhysicalProp for PhysicalPropertySet {
    fn satisfies(&self, required: &Self) -> bool {
        self.order.satisfies(&required.order) && self.distribution.satisfies(&required.distribution)
    }
}

impl Display for PhysicalPropertySet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "order={} dist={}", self.order, self.distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ColumnRef;
    use crate::properties::SortKey;

    #[test]
    fn test_satisfies() {
        let a = SortKey::asc(ColumnRef::new("t", "a"));
        let b = SortKey::asc(ColumnRef::new("t", "b"));
        let ab = PhysicalPropertySet::default().with_order(SortOrder::new(vec![a.clone(), b]));
        let only_a = PhysicalPropertySet::default().with_order(SortOrder::new(vec![a]));

        assert!(ab.satisfies(&only_a));
        assert!(!only_a.satisfies(&ab));
        assert!(only_a.satisfies(&PhysicalPropertySet::default()));

        let singleton = PhysicalPropertySet::default().with_distribution(Distribution::Singleton);
        assert!(!ab.satisfies(&singleton));
        assert!(singleton.satisfies(&PhysicalPropertySet::default()));
    }
}
