use crate::response::merge::MergeConflict;

/// A defect that makes the whole plan execution meaningless.
///
/// Everything recoverable ends up as a path-scoped error in the result instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PlanExecutionError {
    #[error("Query plan produced inconsistent data: {0}")]
    MergeConflict(#[from] MergeConflict),
}
