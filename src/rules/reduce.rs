//! Sums and other reductions. Factors are rows of ones, from the cache.

use std::sync::Arc;

use super::Propagation;
use crate::error::{Error, Result};
use crate::numeric::{Matrix, Numeric};
use crate::session::structure;
use crate::sparse::SparseMatrix;
use crate::structural::Structure;

impl Numeric {
    fn reduce(&self, op: &'static str, value: Matrix, factor: impl FnOnce() -> Arc<SparseMatrix>) -> Numeric {
        match self.derivative() {
            None => Numeric::Constant(value),
            Some(d) => {
                Propagation::single(op, value, d.left_mul(&factor())).finish()
            }
        }
    }

    /// Sum of all entries (1×1).
    pub fn sum(&self) -> Numeric {
        let len = self.len();
        let value = Matrix::from_element(1, 1, self.value().sum());
        self.reduce("sum", value, || structure(Structure::Summation(len)))
    }

    /// Row sums as an `m × 1` column: factor `1ᵀ_n ⊗ I_m`.
    pub fn row_sums(&self) -> Numeric {
        let (m, n) = self.shape();
        let value = Matrix::from_fn(m, 1, |i, _| self.value().row(i).sum());
        self.reduce("row_sums", value, || {
            Arc::new(structure(Structure::Summation(n)).kron(&structure(Structure::Identity(m))))
        })
    }

    /// Column sums as a `1 × n` row: factor `I_n ⊗ 1ᵀ_m`.
    pub fn col_sums(&self) -> Numeric {
        let (m, n) = self.shape();
        let value = Matrix::from_fn(1, n, |_, j| self.value().column(j).sum());
        self.reduce("col_sums", value, || {
            Arc::new(structure(Structure::Identity(n)).kron(&structure(Structure::Summation(m))))
        })
    }

    /// Mean of all entries.
    pub fn mean(&self) -> Numeric {
        self.sum().scale(1.0 / self.len() as f64)
    }

    /// Sum of the diagonal of a square matrix.
    pub fn trace(&self) -> Result<Numeric> {
        if self.nrows() != self.ncols() {
            return Err(Error::dimension("trace", self.shape(), (self.nrows(), self.nrows())));
        }
        Ok(self.diag()?.sum())
    }

    /// Inner product `Σ aᵢ bᵢ` of two operands with the same number of
    /// entries.
    pub fn dot(&self, rhs: &Numeric) -> Result<Numeric> {
        if self.len() != rhs.len() {
            return Err(Error::dimension("dot", self.shape(), rhs.shape()));
        }
        Ok(self.vec().mul(&rhs.vec())?.sum())
    }
}
