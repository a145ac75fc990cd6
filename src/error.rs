//! Error types for matdual.

use thiserror::Error;

/// Result type alias using matdual's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while propagating derivatives, planning a session or
/// sampling.
///
/// None of these is recovered internally: a propagation rule that fails
/// aborts the user function, and the error surfaces unchanged at the
/// [`auto_diff`](crate::auto_diff) or [`finite_diff`](crate::finite_diff)
/// call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Operand shapes are incompatible for the requested operation.
    #[error("dimension mismatch in '{op}': {lhs:?} vs {rhs:?}")]
    Dimension {
        /// The operation that rejected its operands.
        op: &'static str,
        /// Shape of the left (or only) operand.
        lhs: (usize, usize),
        /// Shape of the right operand, or the shape that was required.
        rhs: (usize, usize),
    },

    /// An index lies outside the extent it addresses.
    #[error("index {index} out of bounds for extent {bound} in '{op}'")]
    Index {
        /// The operation that received the index.
        op: &'static str,
        /// The offending index.
        index: usize,
        /// Size of the indexed dimension.
        bound: usize,
    },

    /// An argument is not of the kind the operation needs.
    #[error("type error in '{op}': {reason}")]
    Type {
        /// The operation that received the argument.
        op: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid request detected before any computation started.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The user function asked for an argument that was never supplied.
    #[error("no argument named '{0}'")]
    MissingArgument(String),

    /// The operation has no finite result at these operands.
    #[error("numeric error in '{op}': {reason}")]
    Numeric {
        /// The operation that failed.
        op: &'static str,
        /// Why no value could be produced.
        reason: String,
    },
}

impl Error {
    pub(crate) fn dimension(op: &'static str, lhs: (usize, usize), rhs: (usize, usize)) -> Self {
        Error::Dimension { op, lhs, rhs }
    }

    pub(crate) fn numeric(op: &'static str, reason: impl Into<String>) -> Self {
        Error::Numeric {
            op,
            reason: reason.into(),
        }
    }
}
