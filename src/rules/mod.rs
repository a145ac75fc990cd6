//! Operator propagation rules.
//!
//! Each rule is a method on [`Numeric`] that computes the result value and,
//! when any operand is dual, the result derivative
//! `d vec C = (∂vec C/∂vec A) dA + (∂vec C/∂vec B) dB` with its closed-form
//! factors. Only dual operands contribute terms; two constants give a
//! constant.

mod arithmetic;
mod elementwise;
mod linalg;
mod matmul;
mod reduce;
mod rounding;
mod shape;

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::numeric::{DualMatrix, Matrix, Numeric};
use crate::session::{self, structure};
use crate::sparse::Derivative;
use crate::structural::Structure;

/// Result value plus the running sum of derivative contributions.
pub(crate) struct Propagation {
    op: &'static str,
    value: Matrix,
    derivative: Option<Derivative>,
}

impl Propagation {
    pub(crate) fn new(op: &'static str, value: Matrix) -> Self {
        Propagation {
            op,
            value,
            derivative: None,
        }
    }

    /// A rule with exactly one derivative term.
    pub(crate) fn single(op: &'static str, value: Matrix, term: Derivative) -> Self {
        debug_assert_eq!(term.nrows(), value.len());
        Propagation {
            op,
            value,
            derivative: Some(term),
        }
    }

    /// Add one operand's contribution `factor · dX`.
    pub(crate) fn push(&mut self, term: Derivative) -> Result<()> {
        debug_assert_eq!(term.nrows(), self.value.len());
        self.derivative = match self.derivative.take() {
            None => Some(term),
            Some(acc) => {
                if acc.ncols() != term.ncols() {
                    return Err(Error::dimension(self.op, acc.shape(), term.shape()));
                }
                Some(acc.add(&term))
            }
        };
        Ok(())
    }

    /// Finish, letting the session thresholds pick the representation.
    pub(crate) fn finish(self) -> Numeric {
        match self.derivative {
            None => Numeric::Constant(self.value),
            Some(d) => {
                let d = session::with_context(|ctx| ctx.compact(d));
                Numeric::Dual(DualMatrix::from_parts(self.value, d))
            }
        }
    }

    /// Finish keeping the representation the factors produced (diagonal and
    /// selection factors preserve sparsity).
    pub(crate) fn finish_structural(self) -> Numeric {
        match self.derivative {
            None => Numeric::Constant(self.value),
            Some(d) => Numeric::Dual(DualMatrix::from_parts(self.value, d)),
        }
    }
}

/// Result shape of a binary elementwise operation, broadcasting 1×1 operands.
pub(crate) fn broadcast_shape(op: &'static str, a: &Numeric, b: &Numeric) -> Result<(usize, usize)> {
    match (a.shape(), b.shape()) {
        (sa, sb) if sa == sb => Ok(sa),
        ((1, 1), sb) => Ok(sb),
        (sa, (1, 1)) => Ok(sa),
        (sa, sb) => Err(Error::dimension(op, sa, sb)),
    }
}

/// The value of `x` at `shape`: itself, or its single entry repeated.
pub(crate) fn expand_value(x: &Numeric, shape: (usize, usize)) -> Cow<'_, Matrix> {
    if x.shape() == shape {
        Cow::Borrowed(x.value())
    } else {
        Cow::Owned(Matrix::from_element(shape.0, shape.1, x.value()[(0, 0)]))
    }
}

/// The derivative of `x` broadcast to `len` entries through the cached ones
/// column.
pub(crate) fn expand_derivative(d: &Derivative, len: usize) -> Cow<'_, Derivative> {
    if d.nrows() == len {
        Cow::Borrowed(d)
    } else {
        Cow::Owned(d.left_mul(&structure(Structure::Ones(len))))
    }
}

/// Common width of the dual operands, checking they agree.
pub(crate) fn common_width(op: &'static str, parts: &[&Numeric]) -> Result<Option<usize>> {
    let mut width = None;
    for part in parts {
        if let Some(d) = part.derivative() {
            match width {
                None => width = Some(d.ncols()),
                Some(w) if w != d.ncols() => {
                    return Err(Error::dimension(op, (part.len(), w), d.shape()))
                }
                Some(_) => {}
            }
        }
    }
    Ok(width)
}
