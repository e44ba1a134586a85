//! Implementation of heuristic optimizer.
//!
//! Heuristic optimizer optimizes query plan by applying a batch of rewrite rules to query plan
//! until some condition is met, e.g. max number of iterations or reached fixed point. The
//! implementation is heavily inspired by [apache calcite](https://github.com/apache/calcite)'s
//! HepPlanner.
//!
//! Here it serves as the substitution optimizer: every node is replaced by the first physical
//! alternative an implementation rule offers, without any costing.

mod optimizer;
pub use optimizer::*;
mod graph;
pub use graph::*;
