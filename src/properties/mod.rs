//! Properties of relation operators.
//!
//! Logical properties are shared by every member of a group, physical properties differ between
//! alternatives and are what a parent may require from its inputs.

mod distribution;

use std::fmt::Debug;
use std::hash::Hash;

pub use distribution::*;
mod order;
pub use order::*;
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether self satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}
