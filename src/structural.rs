//! Memoized structural matrices.
//!
//! Propagation rules reshape and reorder derivative blocks with constant
//! matrices: identities inside Kronecker factors, the commutation matrix
//! for transposition, ones columns for broadcasting and summation, and
//! diagonal selectors. They depend only on their dimensions, so each is
//! built once and shared.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use log::trace;

use crate::sparse::SparseMatrix;

/// Key of a cached structural matrix: its kind and dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Structure {
    /// `I_n`.
    Identity(usize),
    /// `K_{m,n}`: the `mn × mn` permutation with `K vec(A) = vec(Aᵀ)` for
    /// `A` of shape `(m, n)`.
    Commutation(usize, usize),
    /// `n × 1` column of ones (broadcasting a 1×1 operand).
    Ones(usize),
    /// `1 × n` row of ones (summation).
    Summation(usize),
    /// `n × n²` selector with `S vec(A) = diag(A)` for square `A`.
    DiagonalSelection(usize),
    /// `n² × n` embedding with `E v = vec(diag(v))`.
    DiagonalEmbedding(usize),
}

impl Structure {
    fn build(self) -> SparseMatrix {
        match self {
            Structure::Identity(n) => SparseMatrix::identity(n),
            Structure::Commutation(m, n) => {
                // vec(Aᵀ)[j + i·n] = A[i, j] = vec(A)[i + j·m]
                let rows = (0..m * n)
                    .map(|r| {
                        let (i, j) = (r / n, r % n);
                        vec![(i + j * m, 1.0)]
                    })
                    .collect();
                SparseMatrix::from_rows(m * n, m * n, rows)
            }
            Structure::Ones(n) => SparseMatrix::from_rows(n, 1, vec![vec![(0, 1.0)]; n]),
            Structure::Summation(n) => {
                SparseMatrix::from_rows(1, n, vec![(0..n).map(|j| (j, 1.0)).collect()])
            }
            Structure::DiagonalSelection(n) => {
                let rows = (0..n).map(|i| vec![(i + i * n, 1.0)]).collect();
                SparseMatrix::from_rows(n, n * n, rows)
            }
            Structure::DiagonalEmbedding(n) => {
                let rows = (0..n * n)
                    .map(|r| {
                        let (i, j) = (r % n, r / n);
                        if i == j {
                            vec![(i, 1.0)]
                        } else {
                            Vec::new()
                        }
                    })
                    .collect();
                SparseMatrix::from_rows(n * n, n, rows)
            }
        }
    }
}

/// Lazily populated map from [`Structure`] keys to shared matrices.
///
/// Entries are immutable once inserted and never evicted. Insertion takes
/// the write lock and re-checks the key, so concurrent first requests for
/// the same key build it once.
#[derive(Debug, Default)]
pub struct StructuralCache {
    entries: RwLock<HashMap<Structure, Arc<SparseMatrix>>>,
}

impl StructuralCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by sessions that do not inject their own.
    pub fn global() -> Arc<StructuralCache> {
        static GLOBAL: OnceLock<Arc<StructuralCache>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(StructuralCache::new())).clone()
    }

    /// The matrix for `key`, built and stored on first request.
    pub fn get(&self, key: Structure) -> Arc<SparseMatrix> {
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(hit);
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert_with(|| {
            trace!("building structural matrix {:?}", key);
            Arc::new(key.build())
        }))
    }

    pub fn contains(&self, key: Structure) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&key)
    }

    /// Number of cached matrices.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
