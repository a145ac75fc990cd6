//! Sparse storage and the derivative blocks carried by dual matrices.
//!
//! Jacobian factors of elementwise, slicing and permutation rules are
//! diagonal or selection matrices, and seeded derivatives are identity
//! blocks. Both are stored as [`SparseMatrix`] (compressed sparse rows).
//! A [`Derivative`] holds either representation; every operation on it
//! gives the same numbers whichever form the operands are in.

use crate::error::{Error, Result};
use crate::numeric::Matrix;

/// Real matrix in compressed sparse row (CSR) form.
///
/// Column indices within a row are strictly increasing and no explicit
/// zeros are stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    /// `row_ptr[i]..row_ptr[i + 1]` indexes the entries of row `i`.
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
}

impl SparseMatrix {
    /// All-zero matrix (no stored entries).
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        SparseMatrix {
            nrows,
            ncols,
            row_ptr: vec![0; nrows + 1],
            col_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    /// The `n × n` identity.
    pub fn identity(n: usize) -> Self {
        Self::from_diagonal(&vec![1.0; n])
    }

    /// Square diagonal matrix with `diag` on the diagonal.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let n = diag.len();
        let rows = diag
            .iter()
            .enumerate()
            .map(|(i, &v)| if v != 0.0 { vec![(i, v)] } else { Vec::new() })
            .collect();
        Self::from_rows(n, n, rows)
    }

    /// Build from `(row, col, value)` triplets in any order.
    ///
    /// Duplicate positions are summed; entries summing to zero are dropped.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self> {
        let mut entries: Vec<(usize, usize, f64)> = Vec::new();
        for (r, c, v) in triplets {
            if r >= nrows {
                return Err(Error::Index {
                    op: "from_triplets",
                    index: r,
                    bound: nrows,
                });
            }
            if c >= ncols {
                return Err(Error::Index {
                    op: "from_triplets",
                    index: c,
                    bound: ncols,
                });
            }
            entries.push((r, c, v));
        }
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); nrows];
        for (r, c, v) in entries {
            let row = &mut rows[r];
            match row.last_mut() {
                Some(last) if last.0 == c => last.1 += v,
                _ => row.push((c, v)),
            }
        }
        for row in &mut rows {
            row.retain(|&(_, v)| v != 0.0);
        }
        Ok(Self::from_rows(nrows, ncols, rows))
    }

    /// Build from per-row entry lists already sorted by column, without
    /// duplicates or zeros.
    pub(crate) fn from_rows(nrows: usize, ncols: usize, rows: Vec<Vec<(usize, f64)>>) -> Self {
        debug_assert_eq!(rows.len(), nrows);
        let nnz = rows.iter().map(Vec::len).sum();
        let mut row_ptr = Vec::with_capacity(nrows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptr.push(0);
        for row in rows {
            for (c, v) in row {
                debug_assert!(c < ncols);
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        SparseMatrix {
            nrows,
            ncols,
            row_ptr,
            col_idx,
            values,
        }
    }

    /// Compress a dense matrix, keeping its non-zero entries.
    pub fn from_dense(m: &Matrix) -> Self {
        let rows = (0..m.nrows())
            .map(|i| {
                (0..m.ncols())
                    .filter_map(|j| {
                        let v = m[(i, j)];
                        (v != 0.0).then_some((j, v))
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(m.nrows(), m.ncols(), rows)
    }

    pub fn to_dense(&self) -> Matrix {
        let mut out = Matrix::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.triplets() {
            out[(r, c)] = v;
        }
        out
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Number of stored (non-zero) entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Stored entries over total entries; zero for an empty shape.
    pub fn fill_ratio(&self) -> f64 {
        let total = self.nrows * self.ncols;
        if total == 0 {
            0.0
        } else {
            self.nnz() as f64 / total as f64
        }
    }

    /// Entry at `(i, j)`, zero when not stored.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i >= self.nrows {
            return 0.0;
        }
        let (cols, vals) = self.row_slices(i);
        match cols.binary_search(&j) {
            Ok(k) => vals[k],
            Err(_) => 0.0,
        }
    }

    #[inline]
    fn row_slices(&self, i: usize) -> (&[usize], &[f64]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Stored entries of row `i` as `(col, value)`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let (cols, vals) = self.row_slices(i);
        cols.iter().copied().zip(vals.iter().copied())
    }

    /// All stored entries as `(row, col, value)`, row-major.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows).flat_map(move |i| self.row(i).map(move |(c, v)| (i, c, v)))
    }

    pub fn transpose(&self) -> SparseMatrix {
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.ncols];
        // Row-major traversal pushes each transposed row in increasing column order.
        for (r, c, v) in self.triplets() {
            rows[c].push((r, v));
        }
        Self::from_rows(self.ncols, self.nrows, rows)
    }

    pub fn scale(&self, s: f64) -> SparseMatrix {
        if s == 0.0 {
            return Self::zeros(self.nrows, self.ncols);
        }
        let mut out = self.clone();
        for v in &mut out.values {
            *v *= s;
        }
        out
    }

    /// Multiply row `i` by `weights[i]`, i.e. `diag(weights) · self`.
    ///
    /// # Panics
    ///
    /// Panics if `weights.len() != self.nrows()`.
    pub fn scale_rows(&self, weights: &[f64]) -> SparseMatrix {
        assert_eq!(weights.len(), self.nrows, "row weight count must match rows");
        let rows = (0..self.nrows)
            .map(|i| {
                let w = weights[i];
                if w == 0.0 {
                    return Vec::new();
                }
                self.row(i)
                    .filter_map(|(c, v)| {
                        let s = v * w;
                        (s != 0.0).then_some((c, s))
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(self.nrows, self.ncols, rows)
    }

    /// Select rows by index (repetition allowed): a selection matrix times `self`.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    pub fn gather_rows(&self, rows: &[usize]) -> SparseMatrix {
        let picked = rows
            .iter()
            .map(|&r| {
                assert!(r < self.nrows, "row {} out of range for {} rows", r, self.nrows);
                self.row(r).collect()
            })
            .collect();
        Self::from_rows(rows.len(), self.ncols, picked)
    }

    /// Stack matrices with equal column counts on top of each other.
    ///
    /// # Panics
    ///
    /// Panics if the column counts differ.
    pub fn vstack(blocks: &[&SparseMatrix], ncols: usize) -> SparseMatrix {
        let mut rows = Vec::with_capacity(blocks.iter().map(|b| b.nrows).sum());
        for block in blocks {
            assert_eq!(block.ncols, ncols, "stacked blocks must share a column count");
            for i in 0..block.nrows {
                rows.push(block.row(i).collect());
            }
        }
        Self::from_rows(rows.len(), ncols, rows)
    }

    /// Sum of two matrices of equal shape.
    ///
    /// # Panics
    ///
    /// Panics on shape mismatch.
    pub fn add(&self, other: &SparseMatrix) -> SparseMatrix {
        assert_eq!(self.shape(), other.shape(), "sparse add shape mismatch");
        let rows = (0..self.nrows)
            .map(|i| {
                let (ca, va) = self.row_slices(i);
                let (cb, vb) = other.row_slices(i);
                let mut merged = Vec::with_capacity(ca.len() + cb.len());
                let (mut p, mut q) = (0, 0);
                while p < ca.len() || q < cb.len() {
                    let (c, v) = if q >= cb.len() || (p < ca.len() && ca[p] < cb[q]) {
                        p += 1;
                        (ca[p - 1], va[p - 1])
                    } else if p >= ca.len() || cb[q] < ca[p] {
                        q += 1;
                        (cb[q - 1], vb[q - 1])
                    } else {
                        p += 1;
                        q += 1;
                        (ca[p - 1], va[p - 1] + vb[q - 1])
                    };
                    if v != 0.0 {
                        merged.push((c, v));
                    }
                }
                merged
            })
            .collect();
        Self::from_rows(self.nrows, self.ncols, rows)
    }

    /// Sparse product `self · rhs`.
    ///
    /// # Panics
    ///
    /// Panics if `self.ncols() != rhs.nrows()`.
    pub fn matmul(&self, rhs: &SparseMatrix) -> SparseMatrix {
        assert_eq!(self.ncols, rhs.nrows, "sparse matmul inner dimension mismatch");
        let mut acc = vec![0.0; rhs.ncols];
        let mut occupied = vec![false; rhs.ncols];
        let mut touched: Vec<usize> = Vec::new();
        let rows = (0..self.nrows)
            .map(|i| {
                for (k, a) in self.row(i) {
                    for (c, b) in rhs.row(k) {
                        if !occupied[c] {
                            occupied[c] = true;
                            touched.push(c);
                        }
                        acc[c] += a * b;
                    }
                }
                touched.sort_unstable();
                let row = touched
                    .iter()
                    .filter_map(|&c| {
                        let v = acc[c];
                        acc[c] = 0.0;
                        occupied[c] = false;
                        (v != 0.0).then_some((c, v))
                    })
                    .collect();
                touched.clear();
                row
            })
            .collect();
        Self::from_rows(self.nrows, rhs.ncols, rows)
    }

    /// Dense result of `self · rhs`.
    ///
    /// # Panics
    ///
    /// Panics if `self.ncols() != rhs.nrows()`.
    pub fn matmul_dense(&self, rhs: &Matrix) -> Matrix {
        assert_eq!(self.ncols, rhs.nrows(), "sparse-dense matmul inner dimension mismatch");
        let mut out = Matrix::zeros(self.nrows, rhs.ncols());
        for j in 0..rhs.ncols() {
            for i in 0..self.nrows {
                let mut s = 0.0;
                for (k, a) in self.row(i) {
                    s += a * rhs[(k, j)];
                }
                out[(i, j)] = s;
            }
        }
        out
    }

    /// Dense result of `lhs · self`.
    ///
    /// # Panics
    ///
    /// Panics if `lhs.ncols() != self.nrows()`.
    pub fn dense_matmul(lhs: &Matrix, rhs: &SparseMatrix) -> Matrix {
        assert_eq!(lhs.ncols(), rhs.nrows, "dense-sparse matmul inner dimension mismatch");
        let mut out = Matrix::zeros(lhs.nrows(), rhs.ncols);
        for (k, c, b) in rhs.triplets() {
            for i in 0..lhs.nrows() {
                out[(i, c)] += lhs[(i, k)] * b;
            }
        }
        out
    }

    /// Kronecker product `self ⊗ other`.
    pub fn kron(&self, other: &SparseMatrix) -> SparseMatrix {
        let (p, q) = other.shape();
        let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); self.nrows * p];
        for i in 0..self.nrows {
            for k in 0..p {
                let row = &mut rows[i * p + k];
                for (j, a) in self.row(i) {
                    for (l, b) in other.row(k) {
                        row.push((j * q + l, a * b));
                    }
                }
            }
        }
        Self::from_rows(self.nrows * p, self.ncols * q, rows)
    }
}

/// Derivative block of a dual matrix: `(m·n) × d`, dense or sparse.
#[derive(Clone, Debug)]
pub enum Derivative {
    Dense(Matrix),
    Sparse(SparseMatrix),
}

impl Derivative {
    /// Zero derivative, stored sparse.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Derivative::Sparse(SparseMatrix::zeros(nrows, ncols))
    }

    /// Seed block: row `i` holds a one in column `offset + i`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + len > width`.
    pub fn seed(len: usize, offset: usize, width: usize) -> Self {
        assert!(offset + len <= width, "seed block exceeds the differentiation width");
        let rows = (0..len).map(|i| vec![(offset + i, 1.0)]).collect();
        Derivative::Sparse(SparseMatrix::from_rows(len, width, rows))
    }

    pub fn nrows(&self) -> usize {
        match self {
            Derivative::Dense(m) => m.nrows(),
            Derivative::Sparse(s) => s.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Derivative::Dense(m) => m.ncols(),
            Derivative::Sparse(s) => s.ncols(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, Derivative::Sparse(_))
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        match self {
            Derivative::Dense(m) => m.iter().filter(|&&v| v != 0.0).count(),
            Derivative::Sparse(s) => s.nnz(),
        }
    }

    pub fn fill_ratio(&self) -> f64 {
        match self {
            Derivative::Dense(m) if m.is_empty() => 0.0,
            Derivative::Dense(m) => self.nnz() as f64 / m.len() as f64,
            Derivative::Sparse(s) => s.fill_ratio(),
        }
    }

    pub fn to_dense(&self) -> Matrix {
        match self {
            Derivative::Dense(m) => m.clone(),
            Derivative::Sparse(s) => s.to_dense(),
        }
    }

    pub fn into_dense(self) -> Matrix {
        match self {
            Derivative::Dense(m) => m,
            Derivative::Sparse(s) => s.to_dense(),
        }
    }

    /// Convert to sparse storage (exact).
    pub fn into_sparse(self) -> SparseMatrix {
        match self {
            Derivative::Dense(m) => SparseMatrix::from_dense(&m),
            Derivative::Sparse(s) => s,
        }
    }

    /// # Panics
    ///
    /// Panics on shape mismatch.
    pub fn add(&self, other: &Derivative) -> Derivative {
        assert_eq!(self.shape(), other.shape(), "derivative add shape mismatch");
        match (self, other) {
            (Derivative::Sparse(a), Derivative::Sparse(b)) => Derivative::Sparse(a.add(b)),
            (Derivative::Dense(a), Derivative::Dense(b)) => Derivative::Dense(a + b),
            (Derivative::Dense(d), Derivative::Sparse(s))
            | (Derivative::Sparse(s), Derivative::Dense(d)) => {
                let mut out = d.clone();
                for (r, c, v) in s.triplets() {
                    out[(r, c)] += v;
                }
                Derivative::Dense(out)
            }
        }
    }

    pub fn scale(&self, s: f64) -> Derivative {
        match self {
            Derivative::Dense(m) if s == 0.0 => Derivative::Dense(Matrix::zeros(m.nrows(), m.ncols())),
            Derivative::Dense(m) => Derivative::Dense(m.map(|v| if v == 0.0 { v } else { v * s })),
            Derivative::Sparse(sp) => Derivative::Sparse(sp.scale(s)),
        }
    }

    pub fn neg(&self) -> Derivative {
        self.scale(-1.0)
    }

    /// `diag(weights) · self`: the derivative of an elementwise map.
    ///
    /// Zero entries stay zero whatever the weight, as in the sparse form,
    /// so an infinite weight on a structural zero gives `0`, not `NaN`.
    ///
    /// # Panics
    ///
    /// Panics if `weights.len() != self.nrows()`.
    pub fn scale_rows(&self, weights: &[f64]) -> Derivative {
        match self {
            Derivative::Dense(m) => {
                assert_eq!(weights.len(), m.nrows(), "row weight count must match rows");
                let mut out = m.clone();
                for (i, &w) in weights.iter().enumerate() {
                    for v in out.row_mut(i).iter_mut() {
                        *v = if w == 0.0 || *v == 0.0 { 0.0 } else { *v * w };
                    }
                }
                Derivative::Dense(out)
            }
            Derivative::Sparse(s) => Derivative::Sparse(s.scale_rows(weights)),
        }
    }

    /// Select rows by index: a selection or permutation factor applied on
    /// the left.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of range.
    pub fn gather_rows(&self, rows: &[usize]) -> Derivative {
        match self {
            Derivative::Dense(m) => {
                let out = Matrix::from_fn(rows.len(), m.ncols(), |i, j| m[(rows[i], j)]);
                Derivative::Dense(out)
            }
            Derivative::Sparse(s) => Derivative::Sparse(s.gather_rows(rows)),
        }
    }

    /// Stack blocks vertically. The result is sparse when every block is.
    ///
    /// # Panics
    ///
    /// Panics if a block's column count differs from `ncols`.
    pub fn vstack(blocks: &[Derivative], ncols: usize) -> Derivative {
        if blocks.iter().all(Derivative::is_sparse) {
            let sparse: Vec<&SparseMatrix> = blocks
                .iter()
                .filter_map(|b| match b {
                    Derivative::Sparse(s) => Some(s),
                    Derivative::Dense(_) => None,
                })
                .collect();
            return Derivative::Sparse(SparseMatrix::vstack(&sparse, ncols));
        }
        let nrows = blocks.iter().map(Derivative::nrows).sum();
        let mut out = Matrix::zeros(nrows, ncols);
        let mut start = 0;
        for block in blocks {
            assert_eq!(block.ncols(), ncols, "stacked blocks must share a column count");
            match block {
                Derivative::Dense(m) => out.rows_mut(start, m.nrows()).copy_from(m),
                Derivative::Sparse(s) => {
                    for (r, c, v) in s.triplets() {
                        out[(start + r, c)] = v;
                    }
                }
            }
            start += block.nrows();
        }
        Derivative::Dense(out)
    }

    /// `factor · self` for a sparse factor. Stays sparse when `self` is.
    ///
    /// # Panics
    ///
    /// Panics if `factor.ncols() != self.nrows()`.
    pub fn left_mul(&self, factor: &SparseMatrix) -> Derivative {
        match self {
            Derivative::Dense(m) => Derivative::Dense(factor.matmul_dense(m)),
            Derivative::Sparse(s) => Derivative::Sparse(factor.matmul(s)),
        }
    }

    /// `factor · self` for a dense factor; the result is dense.
    ///
    /// # Panics
    ///
    /// Panics if `factor.ncols() != self.nrows()`.
    pub fn left_mul_dense(&self, factor: &Matrix) -> Derivative {
        match self {
            Derivative::Dense(m) => {
                assert_eq!(factor.ncols(), m.nrows(), "dense matmul inner dimension mismatch");
                Derivative::Dense(factor * m)
            }
            Derivative::Sparse(s) => Derivative::Dense(SparseMatrix::dense_matmul(factor, s)),
        }
    }

    /// Apply a linear map to every column, producing `out_rows` rows.
    ///
    /// All-zero columns are mapped to zero without calling `map`.
    pub fn map_columns(
        &self,
        out_rows: usize,
        mut map: impl FnMut(&[f64]) -> Result<Vec<f64>>,
    ) -> Result<Derivative> {
        let width = self.ncols();
        let mut out = Matrix::zeros(out_rows, width);
        let mut column = vec![0.0; self.nrows()];
        let columns_t = match self {
            Derivative::Sparse(s) => Some(s.transpose()),
            Derivative::Dense(_) => None,
        };
        for j in 0..width {
            column.iter_mut().for_each(|v| *v = 0.0);
            match (self, &columns_t) {
                (_, Some(t)) => {
                    for (r, v) in t.row(j) {
                        column[r] = v;
                    }
                }
                (Derivative::Dense(m), None) => {
                    for (dst, &v) in column.iter_mut().zip(m.column(j).iter()) {
                        *dst = v;
                    }
                }
                (Derivative::Sparse(_), None) => {}
            }
            if column.iter().all(|&v| v == 0.0) {
                continue;
            }
            let mapped = map(&column)?;
            if mapped.len() != out_rows {
                return Err(Error::dimension("map_columns", (mapped.len(), 1), (out_rows, 1)));
            }
            out.column_mut(j).copy_from_slice(&mapped);
        }
        Ok(Derivative::Dense(out))
    }
}

impl From<Matrix> for Derivative {
    fn from(m: Matrix) -> Self {
        Derivative::Dense(m)
    }
}

impl From<SparseMatrix> for Derivative {
    fn from(s: SparseMatrix) -> Self {
        Derivative::Sparse(s)
    }
}
