use thiserror::Error;

use crate::cascades::GroupId;

pub type OptResult<T> = anyhow::Result<T>;

/// Errors raised by the optimizer.
///
/// Everything is propagated as [`anyhow::Error`], callers can `downcast_ref::<OptimizerError>()`
/// to distinguish planning failures from invalid input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizerError {
    /// The bound plan is semantically invalid, e.g. an unknown table or unresolved column.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    /// A reachable group has no physical implementation for the required property.
    #[error("no physical implementation found for group {group} under {required}")]
    Unimplementable { group: GroupId, required: String },
    /// Memo invariant broken.
    #[error("internal error: {0}")]
    InternalError(String),
    #[error("search budget exceeded: {0}")]
    BudgetExceeded(String),
    #[error("unknown cardinality estimator version: {0}")]
    UnknownEstimatorVersion(String),
    #[error("invalid option {key}={value}")]
    InvalidOption { key: String, value: String },
}
