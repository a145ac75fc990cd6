//! Reshaping, slicing and concatenation. Every Jacobian here is a selection
//! or permutation matrix, applied as a row gather or a cached structural
//! factor.

use std::ops::Range;

use nalgebra::DVector;

use super::{common_width, Propagation};
use crate::error::{Error, Result};
use crate::numeric::{DualMatrix, Matrix, Numeric};
use crate::session::structure;
use crate::sparse::Derivative;
use crate::structural::Structure;

impl Numeric {
    /// Value `value` whose `vec` entry `r` is `vec(self)[rows[r]]`.
    fn select(&self, op: &'static str, value: Matrix, rows: &[usize]) -> Numeric {
        debug_assert_eq!(value.len(), rows.len());
        match self.derivative() {
            None => Numeric::Constant(value),
            Some(d) => {
                Propagation::single(op, value, d.gather_rows(rows)).finish_structural()
            }
        }
    }

    /// `Aᵀ`, derivative `K_{m,n} dA`.
    pub fn transpose(&self) -> Numeric {
        let (m, n) = self.shape();
        let value = self.value().transpose();
        match self.derivative() {
            None => Numeric::Constant(value),
            Some(d) => {
                let factor = structure(Structure::Commutation(m, n));
                Propagation::single("transpose", value, d.left_mul(&factor)).finish_structural()
            }
        }
    }

    /// Rectangular block `A[rows, cols]`.
    pub fn slice(&self, rows: Range<usize>, cols: Range<usize>) -> Result<Numeric> {
        let (m, n) = self.shape();
        check_range("slice", &rows, m)?;
        check_range("slice", &cols, n)?;
        let value = self
            .value()
            .view((rows.start, cols.start), (rows.len(), cols.len()))
            .into_owned();
        let picked: Vec<usize> = cols
            .clone()
            .flat_map(|j| rows.clone().map(move |i| i + j * m))
            .collect();
        Ok(self.select("slice", value, &picked))
    }

    /// Entry `A[i, j]` as a 1×1 value.
    pub fn entry(&self, i: usize, j: usize) -> Result<Numeric> {
        self.slice(i..i + 1, j..j + 1)
    }

    /// Row `i` as a `1 × n` value.
    pub fn row(&self, i: usize) -> Result<Numeric> {
        self.slice(i..i + 1, 0..self.ncols())
    }

    /// Column `j` as an `m × 1` value.
    pub fn col(&self, j: usize) -> Result<Numeric> {
        self.slice(0..self.nrows(), j..j + 1)
    }

    /// Reinterpret the entries, in column-major order, as `nrows × ncols`.
    /// `vec` is unchanged, so is the derivative.
    pub fn reshape(&self, nrows: usize, ncols: usize) -> Result<Numeric> {
        if nrows * ncols != self.len() {
            return Err(Error::dimension("reshape", self.shape(), (nrows, ncols)));
        }
        let value = Matrix::from_column_slice(nrows, ncols, self.value().as_slice());
        Ok(match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => {
                Propagation::single("reshape", value, d.derivative().clone()).finish_structural()
            }
        })
    }

    /// `vec(A)`, the `m·n × 1` column of entries.
    pub fn vec(&self) -> Numeric {
        let value = Matrix::from_column_slice(self.len(), 1, self.value().as_slice());
        match self {
            Numeric::Constant(_) => Numeric::Constant(value),
            Numeric::Dual(d) => Numeric::Dual(DualMatrix::from_parts(value, d.derivative().clone())),
        }
    }

    /// Side-by-side concatenation `[A B ...]`.
    pub fn hstack(parts: &[&Numeric]) -> Result<Numeric> {
        let Some(first) = parts.first() else {
            return Ok(Numeric::Constant(Matrix::zeros(0, 0)));
        };
        let m = first.nrows();
        for part in parts {
            if part.nrows() != m {
                return Err(Error::dimension("hstack", first.shape(), part.shape()));
            }
        }
        let n: usize = parts.iter().map(|p| p.ncols()).sum();
        let mut value = Matrix::zeros(m, n);
        let mut at = 0;
        for part in parts {
            value.columns_mut(at, part.ncols()).copy_from(part.value());
            at += part.ncols();
        }
        // vec([A B]) = [vec A; vec B]
        Ok(match stacked_derivatives("hstack", parts)? {
            None => Numeric::Constant(value),
            Some(d) => {
                let mut prop = Propagation::new("hstack", value);
                prop.push(d)?;
                prop.finish()
            }
        })
    }

    /// Stacked concatenation `[A; B; ...]`.
    pub fn vstack(parts: &[&Numeric]) -> Result<Numeric> {
        let Some(first) = parts.first() else {
            return Ok(Numeric::Constant(Matrix::zeros(0, 0)));
        };
        let n = first.ncols();
        for part in parts {
            if part.ncols() != n {
                return Err(Error::dimension("vstack", first.shape(), part.shape()));
            }
        }
        let m: usize = parts.iter().map(|p| p.nrows()).sum();
        let mut value = Matrix::zeros(m, n);
        let mut at = 0;
        for part in parts {
            value.rows_mut(at, part.nrows()).copy_from(part.value());
            at += part.nrows();
        }
        Ok(match stacked_derivatives("vstack", parts)? {
            None => Numeric::Constant(value),
            Some(stacked) => {
                // Row r of block b sits at stacked index base_b + (r - top_b) + j·m_b.
                let mut picked = Vec::with_capacity(m * n);
                for j in 0..n {
                    let mut base = 0;
                    for part in parts {
                        let mb = part.nrows();
                        picked.extend((0..mb).map(|i| base + i + j * mb));
                        base += part.len();
                    }
                }
                let mut prop = Propagation::new("vstack", value);
                prop.push(stacked.gather_rows(&picked))?;
                prop.finish()
            }
        })
    }

    /// Assemble an `nrows × ncols` matrix from 1×1 entries listed in
    /// column-major order.
    pub fn from_entries(nrows: usize, ncols: usize, entries: &[Numeric]) -> Result<Numeric> {
        if entries.len() != nrows * ncols {
            return Err(Error::dimension("from_entries", (entries.len(), 1), (nrows, ncols)));
        }
        let mut values = Vec::with_capacity(entries.len());
        for e in entries {
            values.push(e.to_scalar()?);
        }
        let value = Matrix::from_column_slice(nrows, ncols, &values);
        let parts: Vec<&Numeric> = entries.iter().collect();
        Ok(match stacked_derivatives("from_entries", &parts)? {
            None => Numeric::Constant(value),
            Some(d) => {
                let mut prop = Propagation::new("from_entries", value);
                prop.push(d)?;
                prop.finish()
            }
        })
    }

    /// Diagonal of a square matrix as a column, or the diagonal matrix of a
    /// row or column vector.
    pub fn diag(&self) -> Result<Numeric> {
        let (m, n) = self.shape();
        if m == 1 && n == 1 {
            return Ok(self.clone());
        }
        let (value, factor) = if m == 1 || n == 1 {
            let len = m * n;
            let v = Matrix::from_diagonal(&DVector::from_column_slice(self.value().as_slice()));
            (v, Structure::DiagonalEmbedding(len))
        } else if m == n {
            let v = Matrix::from_column_slice(n, 1, self.value().diagonal().as_slice());
            (v, Structure::DiagonalSelection(n))
        } else {
            return Err(Error::dimension("diag", (m, n), (n, n)));
        };
        Ok(match self.derivative() {
            None => Numeric::Constant(value),
            Some(d) => {
                let mut prop = Propagation::new("diag", value);
                prop.push(d.left_mul(&structure(factor)))?;
                prop.finish_structural()
            }
        })
    }
}

fn check_range(op: &'static str, range: &Range<usize>, bound: usize) -> Result<()> {
    if range.end > bound {
        return Err(Error::Index {
            op,
            index: range.end - 1,
            bound,
        });
    }
    if range.start > range.end {
        return Err(Error::Index {
            op,
            index: range.start,
            bound: range.end,
        });
    }
    Ok(())
}

/// `[vec P₁; vec P₂; ...]` derivatives, zeros for constant parts; `None` if
/// every part is constant.
fn stacked_derivatives(op: &'static str, parts: &[&Numeric]) -> Result<Option<Derivative>> {
    let Some(width) = common_width(op, parts)? else {
        return Ok(None);
    };
    let blocks: Vec<Derivative> = parts
        .iter()
        .map(|p| match p.derivative() {
            Some(d) => d.clone(),
            None => Derivative::zeros(p.len(), width),
        })
        .collect();
    Ok(Some(Derivative::vstack(&blocks, width)))
}
