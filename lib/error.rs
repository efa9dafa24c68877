//! Fatal errors and non-fatal structural diagnostics.

use itertools::Itertools;
use thiserror::Error;

/// Errors raised when a gate cannot be built or asked for something it does
/// not support.
#[derive(Debug, Error)]
pub enum GateError {
    /// Attempted to re-embed a gate that still takes parameters.
    #[error("{gate} takes {params} parameter(s); only constant gates can be upgraded")]
    NotConstant { gate: String, params: usize },

    /// Target qudit dimension is not larger than the source's.
    #[error("cannot upgrade from dimension {from} to {to}: target must be larger")]
    DimensionNotIncreasing { from: usize, to: usize },

    /// A composite was given no children.
    #[error("{0} requires at least one subgate")]
    EmptyComposite(&'static str),

    /// A supplied matrix is not square or not sized as a register of qudits.
    #[error("matrix of shape {rows}×{cols} is not a register of dimension-{dim} qudits")]
    BadMatrixShape { rows: usize, cols: usize, dim: usize },

    /// A supplied matrix is not unitary to within [`DEFAULT_ATOL`][crate::DEFAULT_ATOL].
    #[error("supplied {rows}×{rows} matrix is not unitary")]
    NotUnitary { rows: usize },

    /// A source gate failed structural validation, so its matrix cannot be
    /// read.
    #[error("{gate} is structurally invalid: {}", .issues.iter().join("; "))]
    InvalidSource { gate: String, issues: Vec<StructureIssue> },

    /// A gate was given where one on a different number of qudits is needed.
    #[error("{gate} acts on {found} qudit(s) but {expected} are required")]
    WrongQuditCount { gate: String, expected: usize, found: usize },

    /// A Jacobian was requested from a gate that only computes matrices.
    #[error("{0} does not supply Jacobians")]
    NoJacobian(String),
}

pub type GateResult<T> = Result<T, GateError>;

/// Inconsistencies found by [`Gate::structure_issues`][crate::Gate::structure_issues].
///
/// These are reported rather than raised so that callers can inspect or
/// repair a structure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StructureIssue {
    #[error("{composite} had a parameter count mismatch: expected {expected} but got {found}")]
    ParamMismatch {
        composite: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{composite} had a qudit count mismatch: expected {expected} but got {found}")]
    QuditMismatch {
        composite: &'static str,
        expected: usize,
        found: usize,
    },

    /// A sequential child acts on a different number of qudits than its
    /// parent.
    #[error("Product had a size mismatch: expected {expected} but got {found} in {child}")]
    SizeMismatch { expected: usize, found: usize, child: String },

    #[error("Nonadjacent gate indices out of range: both {control} and {target} must be smaller than {qudits}")]
    BadPosition { qudits: usize, control: usize, target: usize },

    #[error("Nonadjacent gate indices must differ: got {0} for both")]
    SameIndices(usize),
}
