//! Inverse, solve, determinants and the Cholesky factor.

use super::{common_width, Propagation};
use crate::error::{Error, Result};
use crate::numeric::{Matrix, Numeric};
use crate::session::structure;
use crate::sparse::SparseMatrix;
use crate::structural::Structure;

fn require_square(op: &'static str, a: &Numeric) -> Result<usize> {
    let (m, n) = a.shape();
    if m != n {
        return Err(Error::dimension(op, (m, n), (m, m)));
    }
    Ok(n)
}

fn invert(op: &'static str, a: &Matrix) -> Result<Matrix> {
    a.clone()
        .try_inverse()
        .ok_or_else(|| Error::numeric(op, "matrix is singular"))
}

/// `vec(A⁻ᵀ)ᵀ` as a `1 × n²` row.
fn inverse_transpose_row(inv: &Matrix) -> Matrix {
    let t = inv.transpose();
    Matrix::from_row_slice(1, t.len(), t.as_slice())
}

impl Numeric {
    /// `A⁻¹`, derivative `-(A⁻ᵀ ⊗ A⁻¹) dA`.
    pub fn inverse(&self) -> Result<Numeric> {
        require_square("inverse", self)?;
        let inv = invert("inverse", self.value())?;
        let mut prop = Propagation::new("inverse", inv.clone());
        if let Some(d) = self.derivative() {
            let factor = -inv.transpose().kronecker(&inv);
            prop.push(d.left_mul_dense(&factor))?;
        }
        Ok(prop.finish())
    }

    /// `X = A⁻¹ B` for square `A`.
    ///
    /// `d vec X = -(Xᵀ ⊗ A⁻¹) dA + (I_k ⊗ A⁻¹) dB`.
    pub fn solve(&self, rhs: &Numeric) -> Result<Numeric> {
        let n = require_square("solve", self)?;
        if rhs.nrows() != n {
            return Err(Error::dimension("solve", self.shape(), rhs.shape()));
        }
        common_width("solve", &[self, rhs])?;
        let lu = self.value().clone().lu();
        let x = lu
            .solve(rhs.value())
            .ok_or_else(|| Error::numeric("solve", "matrix is singular"))?;

        let mut prop = Propagation::new("solve", x.clone());
        if self.is_dual() || rhs.is_dual() {
            let inv = lu
                .try_inverse()
                .ok_or_else(|| Error::numeric("solve", "matrix is singular"))?;
            if let Some(da) = self.derivative() {
                let factor = -x.transpose().kronecker(&inv);
                prop.push(da.left_mul_dense(&factor))?;
            }
            if let Some(db) = rhs.derivative() {
                let k = rhs.ncols();
                let factor = structure(Structure::Identity(k)).kron(&SparseMatrix::from_dense(&inv));
                prop.push(db.left_mul(&factor))?;
            }
        }
        Ok(prop.finish())
    }

    /// `det A`, derivative `det(A) · vec(A⁻ᵀ)ᵀ dA`.
    ///
    /// A dual singular operand is an error: the rule needs `A⁻¹`.
    pub fn determinant(&self) -> Result<Numeric> {
        require_square("determinant", self)?;
        let det = self.value().determinant();
        let mut prop = Propagation::new("determinant", Matrix::from_element(1, 1, det));
        if let Some(d) = self.derivative() {
            let inv = invert("determinant", self.value())?;
            let factor = inverse_transpose_row(&inv) * det;
            prop.push(d.left_mul_dense(&factor))?;
        }
        Ok(prop.finish())
    }

    /// `ln |det A|`, derivative `vec(A⁻ᵀ)ᵀ dA`.
    pub fn ln_determinant(&self) -> Result<Numeric> {
        require_square("ln_determinant", self)?;
        let det = self.value().determinant();
        if det == 0.0 {
            return Err(Error::numeric("ln_determinant", "matrix is singular"));
        }
        let mut prop = Propagation::new("ln_determinant", Matrix::from_element(1, 1, det.abs().ln()));
        if let Some(d) = self.derivative() {
            let inv = invert("ln_determinant", self.value())?;
            prop.push(d.left_mul_dense(&inverse_transpose_row(&inv)))?;
        }
        Ok(prop.finish())
    }

    /// Lower Cholesky factor `L` with `A = L Lᵀ`.
    ///
    /// Only the lower triangle of `A` is read, so `dA` is symmetrized from
    /// its lower triangle before applying `dL = L Φ(L⁻¹ dA L⁻ᵀ)`, where `Φ`
    /// keeps the strict lower triangle and halves the diagonal.
    pub fn cholesky(&self) -> Result<Numeric> {
        let n = require_square("cholesky", self)?;
        let chol = self
            .value()
            .clone()
            .cholesky()
            .ok_or_else(|| Error::numeric("cholesky", "matrix is not positive definite"))?;
        let l = chol.l();
        let mut prop = Propagation::new("cholesky", l.clone());
        if let Some(d) = self.derivative() {
            let l_inv = invert("cholesky", &l)?;
            let l_inv_t = l_inv.transpose();
            let dl = d.map_columns(n * n, |column| {
                let da = Matrix::from_column_slice(n, n, column);
                let sym = Matrix::from_fn(n, n, |i, j| if i >= j { da[(i, j)] } else { da[(j, i)] });
                let mut phi = &l_inv * sym * &l_inv_t;
                for j in 0..n {
                    phi[(j, j)] *= 0.5;
                    for i in 0..j {
                        phi[(i, j)] = 0.0;
                    }
                }
                Ok((&l * phi).as_slice().to_vec())
            })?;
            prop.push(dl)?;
        }
        Ok(prop.finish())
    }
}
