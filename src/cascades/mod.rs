//! Memo based cost optimizer.
//!
//! The input plan is copied into a [`Memo`], one group per node. Exploration rules add logically
//! equivalent members to groups until no rule produces anything new, implementation rules add
//! physical members, and every group is then optimized top down under the physical property its
//! parent requires. The cheapest member per (group, required property) is kept as the group's
//! [`Winner`] and the final plan is copied out from the root's winner.

mod memo;
pub use memo::*;
mod optimizer;
pub use optimizer::*;
