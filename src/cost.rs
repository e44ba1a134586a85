use std::iter::Sum;

use derive_more::{Add, AddAssign, Display, From, Into};

/// Estimated cost of a plan, in abstract units proportional to rows touched.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Add, AddAssign, From, Into, Display)]
#[display(fmt = "{:.2}", _0)]
pub struct Cost(f64);

impl Cost {
    pub const ZERO: Cost = Cost(0.0);

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

impl Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Self {
        iter.fold(Cost::ZERO, |acc, c| acc + c)
    }
}
