// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use ndarray::Array2;

use crate::dtype::Real;
use crate::errors::{Error, Result};

/// A compressed sparse row matrix of interaction counts.
///
/// Column indices are stored as `i32` (item and user id space), row
/// pointers as `usize`.  Values are non-negative counts; zero rows and
/// columns are allowed.
#[derive(Debug, Clone)]
pub struct CsrMatrix<T> {
    pub n_rows: usize,
    pub n_cols: usize,
    row_ptrs: Vec<usize>,
    col_inds: Vec<i32>,
    values: Vec<T>,
}

/// A borrowed view of one sparse row.
#[derive(Debug, Clone, Copy)]
pub struct SparseRowRef<'a, T> {
    pub cols: &'a [i32],
    pub vals: &'a [T],
}

impl<'a, T: Copy> SparseRowRef<'a, T> {
    /// Iterate over the `(column, value)` pairs of this row.
    pub fn iter(&self) -> impl Iterator<Item = (i32, T)> + 'a {
        self.cols.iter().copied().zip(self.vals.iter().copied())
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cols.is_empty()
    }
}

impl<T: Real> CsrMatrix<T> {
    /// Build a matrix from raw CSR arrays, checking structural invariants.
    pub fn from_parts(
        n_rows: usize,
        n_cols: usize,
        row_ptrs: Vec<usize>,
        col_inds: Vec<i32>,
        values: Vec<T>,
    ) -> Result<Self> {
        if row_ptrs.len() != n_rows + 1 {
            return Err(Error::shape("row pointers", n_rows + 1, row_ptrs.len()));
        }
        if row_ptrs[0] != 0 || row_ptrs.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::shape("row pointers", 0, row_ptrs[0]));
        }
        let nnz = row_ptrs[n_rows];
        if col_inds.len() != nnz {
            return Err(Error::shape("column indices", nnz, col_inds.len()));
        }
        if values.len() != nnz {
            return Err(Error::shape("values", nnz, values.len()));
        }
        if col_inds.iter().any(|&c| c < 0 || c as usize >= n_cols) {
            return Err(Error::shape("column index bound", n_cols, 0));
        }
        Ok(CsrMatrix {
            n_rows,
            n_cols,
            row_ptrs,
            col_inds,
            values,
        })
    }

    /// Build a matrix from a dense array, keeping nonzero entries.
    pub fn from_dense(dense: &Array2<T>) -> Self {
        let (n_rows, n_cols) = dense.dim();
        let mut row_ptrs = Vec::with_capacity(n_rows + 1);
        let mut col_inds = Vec::new();
        let mut values = Vec::new();
        row_ptrs.push(0);
        for row in dense.outer_iter() {
            for (c, &v) in row.iter().enumerate() {
                if v != T::zero() {
                    col_inds.push(c as i32);
                    values.push(v);
                }
            }
            row_ptrs.push(col_inds.len());
        }
        CsrMatrix {
            n_rows,
            n_cols,
            row_ptrs,
            col_inds,
            values,
        }
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.row_ptrs[self.n_rows]
    }

    pub fn row_ptrs(&self) -> &[usize] {
        &self.row_ptrs
    }

    /// Extent in the underlying arrays of one row.
    pub fn extent(&self, row: usize) -> (usize, usize) {
        (self.row_ptrs[row], self.row_ptrs[row + 1])
    }

    /// Column indices of one row.
    pub fn row_cols(&self, row: usize) -> &[i32] {
        let (start, end) = self.extent(row);
        &self.col_inds[start..end]
    }

    /// Values of one row.
    pub fn row_vals(&self, row: usize) -> &[T] {
        let (start, end) = self.extent(row);
        &self.values[start..end]
    }

    /// Borrow one row as a [`SparseRowRef`].
    pub fn row(&self, row: usize) -> SparseRowRef<'_, T> {
        SparseRowRef {
            cols: self.row_cols(row),
            vals: self.row_vals(row),
        }
    }

    /// Transpose into a column-major view of the same data.
    ///
    /// Counting transpose: count entries per column, turn the counts into
    /// offsets, then scatter entries into place.  Output rows are sorted
    /// by column index as a consequence.
    pub fn transpose(&self) -> CsrMatrix<T> {
        let nnz = self.nnz();
        let mut row_ptrs = vec![0usize; self.n_cols + 1];
        for &c in &self.col_inds {
            row_ptrs[c as usize + 1] += 1;
        }
        for i in 1..=self.n_cols {
            row_ptrs[i] += row_ptrs[i - 1];
        }

        let mut col_inds = vec![0i32; nnz];
        let mut values = vec![T::zero(); nnz];
        let mut insert = row_ptrs.clone();
        for row in 0..self.n_rows {
            let (start, end) = self.extent(row);
            for i in start..end {
                let c = self.col_inds[i] as usize;
                let pos = insert[c];
                col_inds[pos] = row as i32;
                values[pos] = self.values[i];
                insert[c] += 1;
            }
        }

        CsrMatrix {
            n_rows: self.n_cols,
            n_cols: self.n_rows,
            row_ptrs,
            col_inds,
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn from_dense_structure() {
        let dense = array![[1.0f32, 0.0, 2.0], [0.0, 0.0, 0.0], [0.0, 3.0, 0.0]];
        let csr = CsrMatrix::from_dense(&dense);
        assert_eq!(csr.n_rows, 3);
        assert_eq!(csr.n_cols, 3);
        assert_eq!(csr.nnz(), 3);
        assert_eq!(csr.row_cols(0), &[0, 2]);
        assert_eq!(csr.row_vals(0), &[1.0, 2.0]);
        assert!(csr.row(1).is_empty());
        assert_eq!(csr.row_cols(2), &[1]);
    }

    #[test]
    fn transpose_round_trip() {
        let dense = array![[1.0f64, 0.0, 2.0, 0.0], [0.0, 5.0, 0.0, 0.0]];
        let csr = CsrMatrix::from_dense(&dense);
        let t = csr.transpose();
        assert_eq!(t.n_rows, 4);
        assert_eq!(t.n_cols, 2);
        assert_eq!(t.row_cols(2), &[0]);
        assert_eq!(t.row_vals(2), &[2.0]);
        assert!(t.row(3).is_empty());

        let back = t.transpose();
        assert_eq!(back.row_ptrs(), csr.row_ptrs());
        assert_eq!(back.row_cols(0), csr.row_cols(0));
        assert_eq!(back.row_vals(0), csr.row_vals(0));
    }

    #[test]
    fn from_parts_rejects_bad_structure() {
        let r = CsrMatrix::<f32>::from_parts(2, 2, vec![0, 1], vec![0], vec![1.0]);
        assert!(r.is_err());
        let r = CsrMatrix::<f32>::from_parts(1, 2, vec![0, 1], vec![5], vec![1.0]);
        assert!(r.is_err());
    }
}
