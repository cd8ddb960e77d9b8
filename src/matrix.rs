//! # Item × affiliation adjacency matrices
//!
//! An [`AdjacencyMatrix`] holds n items (rows) by m affiliations (columns),
//! either dense (smartcore `DenseMatrix`) or sparse (sprs CSR). All the
//! representation-specific arithmetic lives behind [`MatrixOps`], which is
//! implemented once per storage type; callers pick the implementation with
//! [`AdjacencyMatrix::ops`] and never branch on the representation again.
//!
//! Public constructors validate the adjacency invariants (non-empty shape,
//! finite nonnegative entries). Transformed matrices may contain negative
//! entries and go through the crate-private constructors instead.

use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;
use sprs::{CsMat, TriMat};

use log::{debug, trace};

use crate::error::{AffinityError, Result};

/// Adjacency matrix in one of the two supported representations.
#[derive(Debug, Clone)]
pub enum AdjacencyMatrix {
    Dense(DenseMatrix<f64>),
    Sparse(CsMat<f64>),
}

/// Representation-specific primitives used by the transform library and the
/// term-based scorer.
pub trait MatrixOps: Sync {
    /// (rows, columns)
    fn dims(&self) -> (usize, usize);

    /// Value at (i, j); zero for entries absent from sparse storage.
    fn value(&self, i: usize, j: usize) -> f64;

    /// Number of stored nonzero entries.
    fn count_nonzeros(&self) -> usize;

    /// True when every entry is 0 or 1.
    fn is_binary(&self) -> bool;

    /// Nonzero count per row.
    fn row_nonzero_counts(&self) -> Vec<usize>;

    /// Nonzero count per column.
    fn col_nonzero_counts(&self) -> Vec<usize>;

    fn row_sums(&self) -> Vec<f64>;

    fn row_sq_sums(&self) -> Vec<f64>;

    /// Multiply column j by `weights[j]`. Keeps the representation.
    fn scale_columns(&self, weights: &[f64]) -> Result<AdjacencyMatrix>;

    /// Multiply row i by `weights[i]`. Keeps the representation.
    fn scale_rows(&self, weights: &[f64]) -> Result<AdjacencyMatrix>;

    /// Replace every nonzero entry by 1. Keeps the representation.
    fn binarize(&self) -> Result<AdjacencyMatrix>;

    /// Keep only the listed columns, in the given order.
    fn select_columns(&self, keep: &[usize]) -> Result<AdjacencyMatrix>;

    /// Materialise all entries row by row. Densifies sparse storage.
    fn dense_rows(&self) -> Vec<Vec<f64>>;

    /// Nonzero entries of row `i` as (column, value), ascending by column.
    fn row_entries(&self, i: usize) -> Vec<(usize, f64)>;

    /// Visit every column where row `a` or row `b` is nonzero, ascending,
    /// passing (column, a's value, b's value).
    fn for_each_union(&self, a: usize, b: usize, f: &mut dyn FnMut(usize, f64, f64));
}

impl AdjacencyMatrix {
    /// Build a dense adjacency matrix from row vectors.
    pub fn from_dense_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let ncols = rows.first().map(|r| r.len()).unwrap_or(0);
        check_nonempty(rows.len(), ncols)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != ncols {
                return Err(AffinityError::RaggedRows {
                    row: i,
                    expected: ncols,
                    actual: row.len(),
                });
            }
            for (j, &v) in row.iter().enumerate() {
                check_entry(i, j, v)?;
            }
        }
        Self::from_transformed_rows(rows)
    }

    /// Build a sparse (CSR) adjacency matrix from (row, column, value)
    /// triplets. Duplicate coordinates are summed; explicit zeros are dropped.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: &[(usize, usize, f64)],
    ) -> Result<Self> {
        check_nonempty(nrows, ncols)?;
        let mut tri = TriMat::new((nrows, ncols));
        for &(i, j, v) in triplets {
            if i >= nrows {
                return Err(AffinityError::dimension_mismatch("triplet row", nrows, i));
            }
            if j >= ncols {
                return Err(AffinityError::dimension_mismatch("triplet column", ncols, j));
            }
            check_entry(i, j, v)?;
            if v != 0.0 {
                tri.add_triplet(i, j, v);
            }
        }
        let csr: CsMat<f64> = tri.to_csr();
        debug!(
            "Built sparse adjacency {}x{} with {} non-zeros",
            nrows,
            ncols,
            csr.nnz()
        );
        Ok(AdjacencyMatrix::Sparse(csr))
    }

    /// Wrap an existing smartcore matrix after validating its entries.
    pub fn from_dense(matrix: DenseMatrix<f64>) -> Result<Self> {
        let (nrows, ncols) = matrix.shape();
        check_nonempty(nrows, ncols)?;
        for i in 0..nrows {
            for j in 0..ncols {
                check_entry(i, j, *matrix.get((i, j)))?;
            }
        }
        Ok(AdjacencyMatrix::Dense(matrix))
    }

    /// Wrap an existing sprs matrix after validating its entries. CSC input is
    /// converted to CSR.
    pub fn from_csr(matrix: CsMat<f64>) -> Result<Self> {
        check_nonempty(matrix.rows(), matrix.cols())?;
        let matrix = if matrix.is_csr() {
            matrix
        } else {
            matrix.to_csr()
        };
        for (i, row) in matrix.outer_iterator().enumerate() {
            for (j, &v) in row.iter() {
                check_entry(i, j, v)?;
            }
        }
        Ok(AdjacencyMatrix::Sparse(matrix))
    }

    /// Dense matrix from arbitrary real rows (transform output).
    pub(crate) fn from_transformed_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let dense =
            DenseMatrix::from_2d_vec(&rows).map_err(|e| AffinityError::Matrix(e.to_string()))?;
        Ok(AdjacencyMatrix::Dense(dense))
    }

    /// Sparse matrix from arbitrary real per-row entries (transform output).
    pub(crate) fn from_transformed_entries(
        shape: (usize, usize),
        rows: Vec<Vec<(usize, f64)>>,
    ) -> Self {
        let mut tri = TriMat::new(shape);
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row {
                tri.add_triplet(i, j, v);
            }
        }
        let csr: CsMat<f64> = tri.to_csr();
        AdjacencyMatrix::Sparse(csr)
    }

    /// The representation-specific implementation of the matrix primitives.
    pub fn ops(&self) -> &dyn MatrixOps {
        match self {
            AdjacencyMatrix::Dense(m) => m,
            AdjacencyMatrix::Sparse(m) => m,
        }
    }

    pub fn nrows(&self) -> usize {
        self.ops().dims().0
    }

    pub fn ncols(&self) -> usize {
        self.ops().dims().1
    }

    pub fn shape(&self) -> (usize, usize) {
        self.ops().dims()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, AdjacencyMatrix::Sparse(_))
    }

    pub fn is_binary(&self) -> bool {
        self.ops().is_binary()
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.ops().value(i, j)
    }

    /// Dense copy of the same logical matrix.
    pub fn to_dense(&self) -> Result<Self> {
        match self {
            AdjacencyMatrix::Dense(_) => Ok(self.clone()),
            AdjacencyMatrix::Sparse(m) => {
                trace!("Densifying {}x{} sparse matrix", m.rows(), m.cols());
                Self::from_transformed_rows(m.dense_rows())
            }
        }
    }

    /// CSR copy of the same logical matrix; zero entries are not stored.
    pub fn to_sparse(&self) -> Self {
        match self {
            AdjacencyMatrix::Sparse(_) => self.clone(),
            AdjacencyMatrix::Dense(m) => {
                let (n, _) = m.dims();
                let rows = (0..n).map(|i| m.row_entries(i)).collect();
                Self::from_transformed_entries(m.dims(), rows)
            }
        }
    }
}

fn check_nonempty(nrows: usize, ncols: usize) -> Result<()> {
    if nrows == 0 || ncols == 0 {
        return Err(AffinityError::EmptyMatrix { nrows, ncols });
    }
    Ok(())
}

fn check_entry(row: usize, col: usize, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AffinityError::InvalidEntry { row, col, value });
    }
    Ok(())
}

#[inline]
fn is_binary_value(v: f64) -> bool {
    v == 0.0 || v == 1.0
}

impl MatrixOps for DenseMatrix<f64> {
    fn dims(&self) -> (usize, usize) {
        self.shape()
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        *self.get((i, j))
    }

    fn count_nonzeros(&self) -> usize {
        let (n, m) = self.dims();
        (0..n)
            .map(|i| (0..m).filter(|&j| self.value(i, j) != 0.0).count())
            .sum()
    }

    fn is_binary(&self) -> bool {
        let (n, m) = self.dims();
        (0..n).all(|i| (0..m).all(|j| is_binary_value(self.value(i, j))))
    }

    fn row_nonzero_counts(&self) -> Vec<usize> {
        let (n, m) = self.dims();
        (0..n)
            .map(|i| (0..m).filter(|&j| self.value(i, j) != 0.0).count())
            .collect()
    }

    fn col_nonzero_counts(&self) -> Vec<usize> {
        let (n, m) = self.dims();
        (0..m)
            .map(|j| (0..n).filter(|&i| self.value(i, j) != 0.0).count())
            .collect()
    }

    fn row_sums(&self) -> Vec<f64> {
        let (n, m) = self.dims();
        (0..n)
            .map(|i| (0..m).map(|j| self.value(i, j)).sum())
            .collect()
    }

    fn row_sq_sums(&self) -> Vec<f64> {
        self.dense_rows()
            .iter()
            .map(|r| r.iter().map(|&x| x * x).sum())
            .collect()
    }

    fn scale_columns(&self, weights: &[f64]) -> Result<AdjacencyMatrix> {
        let (_, m) = self.dims();
        check_len("column weights", m, weights.len())?;
        let rows = self
            .dense_rows()
            .into_iter()
            .map(|r| r.iter().zip(weights).map(|(x, w)| x * w).collect())
            .collect();
        AdjacencyMatrix::from_transformed_rows(rows)
    }

    fn scale_rows(&self, weights: &[f64]) -> Result<AdjacencyMatrix> {
        let (n, _) = self.dims();
        check_len("row weights", n, weights.len())?;
        let rows = self
            .dense_rows()
            .into_iter()
            .zip(weights)
            .map(|(r, &w)| r.iter().map(|x| x * w).collect())
            .collect();
        AdjacencyMatrix::from_transformed_rows(rows)
    }

    fn binarize(&self) -> Result<AdjacencyMatrix> {
        let rows = self
            .dense_rows()
            .into_iter()
            .map(|r| r.iter().map(|&x| if x != 0.0 { 1.0 } else { 0.0 }).collect())
            .collect();
        AdjacencyMatrix::from_transformed_rows(rows)
    }

    fn select_columns(&self, keep: &[usize]) -> Result<AdjacencyMatrix> {
        let rows = self
            .dense_rows()
            .into_iter()
            .map(|r| keep.iter().map(|&j| r[j]).collect())
            .collect();
        AdjacencyMatrix::from_transformed_rows(rows)
    }

    fn dense_rows(&self) -> Vec<Vec<f64>> {
        let (n, m) = self.dims();
        (0..n)
            .map(|i| (0..m).map(|j| self.value(i, j)).collect())
            .collect()
    }

    fn row_entries(&self, i: usize) -> Vec<(usize, f64)> {
        let (_, m) = self.dims();
        (0..m)
            .map(|j| (j, self.value(i, j)))
            .filter(|&(_, v)| v != 0.0)
            .collect()
    }

    fn for_each_union(&self, a: usize, b: usize, f: &mut dyn FnMut(usize, f64, f64)) {
        let (_, m) = self.dims();
        for j in 0..m {
            let x = self.value(a, j);
            let y = self.value(b, j);
            if x != 0.0 || y != 0.0 {
                f(j, x, y);
            }
        }
    }
}

impl MatrixOps for CsMat<f64> {
    fn dims(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    fn value(&self, i: usize, j: usize) -> f64 {
        self.get(i, j).copied().unwrap_or(0.0)
    }

    fn count_nonzeros(&self) -> usize {
        self.data().iter().filter(|&&v| v != 0.0).count()
    }

    fn is_binary(&self) -> bool {
        self.data().iter().all(|&v| is_binary_value(v))
    }

    fn row_nonzero_counts(&self) -> Vec<usize> {
        self.outer_iterator()
            .map(|row| row.data().iter().filter(|&&v| v != 0.0).count())
            .collect()
    }

    fn col_nonzero_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.cols()];
        for row in self.outer_iterator() {
            for (j, &v) in row.iter() {
                if v != 0.0 {
                    counts[j] += 1;
                }
            }
        }
        counts
    }

    fn row_sums(&self) -> Vec<f64> {
        self.outer_iterator()
            .map(|row| row.data().iter().sum())
            .collect()
    }

    fn row_sq_sums(&self) -> Vec<f64> {
        self.outer_iterator()
            .map(|row| row.data().iter().map(|&x| x * x).sum())
            .collect()
    }

    fn scale_columns(&self, weights: &[f64]) -> Result<AdjacencyMatrix> {
        check_len("column weights", self.cols(), weights.len())?;
        let rows = self
            .outer_iterator()
            .map(|row| row.iter().map(|(j, &v)| (j, v * weights[j])).collect())
            .collect();
        Ok(AdjacencyMatrix::from_transformed_entries(self.dims(), rows))
    }

    fn scale_rows(&self, weights: &[f64]) -> Result<AdjacencyMatrix> {
        check_len("row weights", self.rows(), weights.len())?;
        let rows = self
            .outer_iterator()
            .zip(weights)
            .map(|(row, &w)| row.iter().map(|(j, &v)| (j, v * w)).collect())
            .collect();
        Ok(AdjacencyMatrix::from_transformed_entries(self.dims(), rows))
    }

    fn binarize(&self) -> Result<AdjacencyMatrix> {
        let rows = self
            .outer_iterator()
            .map(|row| {
                row.iter()
                    .filter(|&(_, &v)| v != 0.0)
                    .map(|(j, _)| (j, 1.0))
                    .collect()
            })
            .collect();
        Ok(AdjacencyMatrix::from_transformed_entries(self.dims(), rows))
    }

    fn select_columns(&self, keep: &[usize]) -> Result<AdjacencyMatrix> {
        let mut remap = vec![None; self.cols()];
        for (new_j, &old_j) in keep.iter().enumerate() {
            remap[old_j] = Some(new_j);
        }
        let rows = self
            .outer_iterator()
            .map(|row| {
                row.iter()
                    .filter_map(|(j, &v)| remap[j].map(|nj| (nj, v)))
                    .collect()
            })
            .collect();
        Ok(AdjacencyMatrix::from_transformed_entries(
            (self.rows(), keep.len()),
            rows,
        ))
    }

    fn dense_rows(&self) -> Vec<Vec<f64>> {
        self.outer_iterator()
            .map(|row| {
                let mut dense = vec![0.0; self.cols()];
                for (j, &v) in row.iter() {
                    dense[j] = v;
                }
                dense
            })
            .collect()
    }

    fn row_entries(&self, i: usize) -> Vec<(usize, f64)> {
        match self.outer_view(i) {
            Some(row) => row.iter().map(|(j, &v)| (j, v)).collect(),
            None => Vec::new(),
        }
    }

    fn for_each_union(&self, a: usize, b: usize, f: &mut dyn FnMut(usize, f64, f64)) {
        let (Some(ra), Some(rb)) = (self.outer_view(a), self.outer_view(b)) else {
            return;
        };
        let (ia, va) = (ra.indices(), ra.data());
        let (ib, vb) = (rb.indices(), rb.data());
        let (mut p, mut q) = (0, 0);
        while p < ia.len() || q < ib.len() {
            if q == ib.len() || (p < ia.len() && ia[p] < ib[q]) {
                f(ia[p], va[p], 0.0);
                p += 1;
            } else if p == ia.len() || ib[q] < ia[p] {
                f(ib[q], 0.0, vb[q]);
                q += 1;
            } else {
                f(ia[p], va[p], vb[q]);
                p += 1;
                q += 1;
            }
        }
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(AffinityError::dimension_mismatch(what, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 1.0, 0.0, 0.0],
            vec![1.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn test_dense_and_sparse_agree_on_primitives() {
        let dense = AdjacencyMatrix::from_dense_rows(rows()).unwrap();
        let sparse = dense.to_sparse();

        assert!(sparse.is_sparse());
        assert_eq!(dense.shape(), sparse.shape());
        assert_eq!(dense.ops().count_nonzeros(), 5);
        assert_eq!(sparse.ops().count_nonzeros(), 5);
        assert_eq!(
            dense.ops().col_nonzero_counts(),
            sparse.ops().col_nonzero_counts()
        );
        assert_eq!(dense.ops().row_sums(), sparse.ops().row_sums());
        assert_eq!(dense.ops().dense_rows(), sparse.ops().dense_rows());
    }

    #[test]
    fn test_union_visits_each_column_once() {
        let sparse = AdjacencyMatrix::from_dense_rows(rows()).unwrap().to_sparse();
        let mut seen = Vec::new();
        sparse
            .ops()
            .for_each_union(0, 1, &mut |j, x, y| seen.push((j, x, y)));
        assert_eq!(seen, vec![(0, 1.0, 1.0), (1, 1.0, 0.0), (2, 0.0, 1.0)]);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(matches!(
            AdjacencyMatrix::from_dense_rows(vec![]),
            Err(AffinityError::EmptyMatrix { .. })
        ));
        assert!(matches!(
            AdjacencyMatrix::from_dense_rows(vec![vec![1.0, 0.0], vec![1.0]]),
            Err(AffinityError::RaggedRows { row: 1, .. })
        ));
        assert!(matches!(
            AdjacencyMatrix::from_triplets(2, 2, &[(0, 0, -1.0)]),
            Err(AffinityError::InvalidEntry { .. })
        ));
        assert!(matches!(
            AdjacencyMatrix::from_triplets(2, 2, &[(0, 5, 1.0)]),
            Err(AffinityError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_select_columns_keeps_order() {
        let sparse = AdjacencyMatrix::from_dense_rows(rows()).unwrap().to_sparse();
        let picked = sparse.ops().select_columns(&[3, 0]).unwrap();
        assert_eq!(
            picked.ops().dense_rows(),
            vec![vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0, 0.0]]
        );
    }

    #[test]
    fn test_csc_input_converted_to_csr() {
        let mut tri = TriMat::new((2, 3));
        tri.add_triplet(0, 2, 1.0);
        tri.add_triplet(1, 0, 2.0);
        let csc: CsMat<f64> = tri.to_csc();
        let m = AdjacencyMatrix::from_csr(csc).unwrap();
        assert_eq!(m.get(0, 2), 1.0);
        assert_eq!(m.get(1, 0), 2.0);
        assert!(!m.is_binary());

        let dense = m.to_dense().unwrap();
        assert!(!dense.is_sparse());
        assert_eq!(dense.ops().dense_rows(), vec![vec![0.0, 0.0, 1.0], vec![2.0, 0.0, 0.0]]);
    }
}
