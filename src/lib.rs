//! A cost based query optimizer built around a memo.
//!
//! ## Overview
//!
//! The optimizer takes a bound logical [`Plan`](plan::Plan) together with a
//! [`Catalog`](catalog::Catalog) and per query [`QueryOptions`](options::QueryOptions) and returns
//! the cheapest physical plan it can find. [`Planner`](planner::Planner) is the entry point: it
//! validates and derives the input, splits it into query blocks (the main query and each subquery)
//! and optimizes every block on its own.
//!
//! Two strategies are available.
//!
//! ### Substitution
//!
//! The [`heuristic`] optimizer rewrites a petgraph copy of the plan in place, replacing each
//! logical node by the first physical alternative an implementation rule offers. No costs are
//! compared, which keeps it cheap enough for simple queries.
//!
//! ### Memo search
//!
//! The [`cascades`] optimizer keeps every alternative it finds in a [`Memo`](cascades::Memo) of
//! groups [2]. Exploration rules add logically equivalent members to a group, implementation
//! rules add physical ones, and each group remembers its cheapest member per required physical
//! property. Costs are computed from cardinalities estimated by a versioned
//! [`CardinalityEstimator`](stat::CardinalityEstimator).
//!
//! ### Join order
//!
//! With the join order solver enabled, trees of inner joins are collapsed into join blocks whose
//! order is chosen by DPccp [3] over the join graph, the bottom up dynamic programming approach of
//! [1] restricted to connected subgraphs.
//!
//! ## Reference
//!
//! 1. Selinger, P. Griffiths, et al. "Access path selection in a relational database management
//! system." Readings in Artificial Intelligence and Databases. Morgan Kaufmann, 1989. 511-522.
//! 2. Graefe, G., 1995. The cascades framework for query optimization. IEEE Data Eng. Bull., 18(3),
//! pp.19-29.
//! 3. Moerkotte, G. and Neumann, T., 2006. Analysis of two existing and one new dynamic
//! programming algorithm for the generation of optimal bushy join trees without cross products.
//! VLDB, pp.930-941.

#[macro_use]
extern crate prettytable;
#[macro_use]
extern crate lazy_static;

pub mod cascades;
pub mod catalog;
pub mod cost;
pub mod error;
pub mod expr;
pub mod heuristic;
pub mod join_order;
pub mod operator;
pub mod optimizer;
pub mod options;
pub mod plan;
pub mod planner;
pub mod properties;
pub mod rules;
pub mod stat;
