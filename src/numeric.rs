//! Matrix dual numbers and the constant/dual operand type.
//!
//! User functions are written against [`Numeric`]. Inside
//! [`auto_diff`](crate::auto_diff) the differentiated arguments arrive as
//! [`Numeric::Dual`] and everything else as [`Numeric::Constant`]; every
//! operation matches on the operand variants and runs the propagation rule
//! only for dual operands.

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::sparse::Derivative;

/// Dense real matrix, column-major (the `vec` order of the derivative rows).
pub type Matrix = DMatrix<f64>;

/// A matrix value paired with its Jacobian under the vectorization
/// convention.
///
/// For a value of shape `(m, n)` the derivative has `m·n` rows, one per
/// entry of `vec(value)` in column-major order, and `d` columns, one per
/// entry of the flattened differentiation targets.
#[derive(Clone, Debug)]
pub struct DualMatrix {
    value: Matrix,
    derivative: Derivative,
}

impl DualMatrix {
    /// Pair a value with a derivative, checking `derivative.nrows() == m·n`.
    pub fn new(value: Matrix, derivative: impl Into<Derivative>) -> Result<Self> {
        let derivative = derivative.into();
        if derivative.nrows() != value.len() {
            return Err(Error::dimension(
                "dual",
                (derivative.nrows(), derivative.ncols()),
                (value.len(), derivative.ncols()),
            ));
        }
        Ok(DualMatrix { value, derivative })
    }

    /// A constant lifted into dual space: zero derivative with `width` columns.
    pub fn constant(value: Matrix, width: usize) -> Self {
        let derivative = Derivative::zeros(value.len(), width);
        DualMatrix { value, derivative }
    }

    /// A differentiation target: identity columns at `offset..offset + m·n`.
    pub fn seed(value: Matrix, offset: usize, width: usize) -> Result<Self> {
        if offset + value.len() > width {
            return Err(Error::Configuration(format!(
                "seed block at offset {} of length {} exceeds width {}",
                offset,
                value.len(),
                width
            )));
        }
        let derivative = Derivative::seed(value.len(), offset, width);
        Ok(DualMatrix { value, derivative })
    }

    pub(crate) fn from_parts(value: Matrix, derivative: Derivative) -> Self {
        debug_assert_eq!(derivative.nrows(), value.len());
        DualMatrix { value, derivative }
    }

    #[inline]
    pub fn value(&self) -> &Matrix {
        &self.value
    }

    #[inline]
    pub fn derivative(&self) -> &Derivative {
        &self.derivative
    }

    /// Differentiation width `d`.
    #[inline]
    pub fn width(&self) -> usize {
        self.derivative.ncols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value.shape()
    }

    pub fn into_parts(self) -> (Matrix, Derivative) {
        (self.value, self.derivative)
    }
}

/// Operand of every matrix operation: a plain constant or a dual matrix.
#[derive(Clone, Debug)]
pub enum Numeric {
    Constant(Matrix),
    Dual(DualMatrix),
}

impl Numeric {
    /// A 1×1 constant.
    pub fn scalar(x: f64) -> Self {
        Numeric::Constant(Matrix::from_element(1, 1, x))
    }

    /// A column-vector constant.
    pub fn column(values: &[f64]) -> Self {
        Numeric::Constant(Matrix::from_column_slice(values.len(), 1, values))
    }

    #[inline]
    pub fn value(&self) -> &Matrix {
        match self {
            Numeric::Constant(m) => m,
            Numeric::Dual(d) => d.value(),
        }
    }

    /// The derivative block, `None` for constants.
    #[inline]
    pub fn derivative(&self) -> Option<&Derivative> {
        match self {
            Numeric::Constant(_) => None,
            Numeric::Dual(d) => Some(d.derivative()),
        }
    }

    /// Differentiation width, `None` for constants.
    pub fn width(&self) -> Option<usize> {
        self.derivative().map(Derivative::ncols)
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, Numeric::Dual(_))
    }

    pub fn shape(&self) -> (usize, usize) {
        self.value().shape()
    }

    pub fn nrows(&self) -> usize {
        self.value().nrows()
    }

    pub fn ncols(&self) -> usize {
        self.value().ncols()
    }

    /// Number of entries, `m·n`.
    pub fn len(&self) -> usize {
        self.value().len()
    }

    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// The single entry of a 1×1 value.
    pub fn to_scalar(&self) -> Result<f64> {
        match self.shape() {
            (1, 1) => Ok(self.value()[(0, 0)]),
            shape => Err(Error::dimension("to_scalar", shape, (1, 1))),
        }
    }

    /// The value as a constant, cutting derivative flow (accept/reject
    /// decisions, stopping criteria).
    pub fn detach(&self) -> Numeric {
        Numeric::Constant(self.value().clone())
    }

    pub fn into_value(self) -> Matrix {
        match self {
            Numeric::Constant(m) => m,
            Numeric::Dual(d) => d.value,
        }
    }

    /// Whether every value entry is finite.
    pub fn is_finite(&self) -> bool {
        self.value().iter().all(|v| v.is_finite())
    }
}

impl From<Matrix> for Numeric {
    fn from(m: Matrix) -> Self {
        Numeric::Constant(m)
    }
}

impl From<f64> for Numeric {
    fn from(x: f64) -> Self {
        Numeric::scalar(x)
    }
}

impl From<DualMatrix> for Numeric {
    fn from(d: DualMatrix) -> Self {
        Numeric::Dual(d)
    }
}
