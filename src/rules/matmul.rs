//! Matrix products.

use super::{common_width, Propagation};
use crate::error::{Error, Result};
use crate::numeric::Numeric;
use crate::session::structure;
use crate::sparse::SparseMatrix;
use crate::structural::Structure;

impl Numeric {
    /// Matrix product `A · B`.
    ///
    /// For `A` of shape `(m, n)` and `B` of shape `(n, k)`:
    /// `d vec C = (Bᵀ ⊗ I_m) dA + (I_k ⊗ A) dB`.
    pub fn matmul(&self, rhs: &Numeric) -> Result<Numeric> {
        let (m, n) = self.shape();
        let (n2, k) = rhs.shape();
        if n != n2 {
            return Err(Error::dimension("matmul", self.shape(), rhs.shape()));
        }
        common_width("matmul", &[self, rhs])?;
        let a = self.value();
        let b = rhs.value();

        let mut prop = Propagation::new("matmul", a * b);
        if let Some(da) = self.derivative() {
            let factor = SparseMatrix::from_dense(&b.transpose()).kron(&structure(Structure::Identity(m)));
            prop.push(da.left_mul(&factor))?;
        }
        if let Some(db) = rhs.derivative() {
            let factor = structure(Structure::Identity(k)).kron(&SparseMatrix::from_dense(a));
            prop.push(db.left_mul(&factor))?;
        }
        Ok(prop.finish())
    }

    /// `Aᵀ · B`.
    pub fn crossprod(&self, rhs: &Numeric) -> Result<Numeric> {
        if self.nrows() != rhs.nrows() {
            return Err(Error::dimension("crossprod", self.shape(), rhs.shape()));
        }
        self.transpose().matmul(rhs)
    }

    /// `A · Bᵀ`.
    pub fn tcrossprod(&self, rhs: &Numeric) -> Result<Numeric> {
        if self.ncols() != rhs.ncols() {
            return Err(Error::dimension("tcrossprod", self.shape(), rhs.shape()));
        }
        self.matmul(&rhs.transpose())
    }

    /// Kronecker product `A ⊗ B`.
    ///
    /// Both factors are assembled entry by entry: row `r` of `vec(A ⊗ B)`
    /// depends on exactly one entry of `A` and one of `B`.
    pub fn kronecker(&self, rhs: &Numeric) -> Result<Numeric> {
        common_width("kronecker", &[self, rhs])?;
        let a = self.value();
        let b = rhs.value();
        let (m, n) = a.shape();
        let (p, q) = b.shape();
        let out_rows = m * p;
        let len = out_rows * n * q;
        let value = a.kronecker(b);

        // (i, j) of A and (k, l) of B feeding vec index r.
        let source = |r: usize| {
            let (row, col) = (r % out_rows, r / out_rows);
            ((row / p, col / q), (row % p, col % q))
        };

        let mut prop = Propagation::new("kronecker", value);
        if let Some(da) = self.derivative() {
            let rows = (0..len)
                .map(|r| {
                    let ((i, j), (k, l)) = source(r);
                    let v = b[(k, l)];
                    if v != 0.0 {
                        vec![(i + j * m, v)]
                    } else {
                        Vec::new()
                    }
                })
                .collect();
            prop.push(da.left_mul(&SparseMatrix::from_rows(len, m * n, rows)))?;
        }
        if let Some(db) = rhs.derivative() {
            let rows = (0..len)
                .map(|r| {
                    let ((i, j), (k, l)) = source(r);
                    let v = a[(i, j)];
                    if v != 0.0 {
                        vec![(k + l * p, v)]
                    } else {
                        Vec::new()
                    }
                })
                .collect();
            prop.push(db.left_mul(&SparseMatrix::from_rows(len, p * q, rows)))?;
        }
        Ok(prop.finish())
    }
}
