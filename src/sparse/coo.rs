// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse coordinate arrays.

use crate::dtype::Real;
use crate::errors::{Error, Result};

use super::CsrMatrix;

/// A matrix as parallel coordinate arrays.
pub struct CooMatrix<T> {
    pub row: Vec<i32>,
    pub col: Vec<i32>,
    pub val: Vec<T>,
}

/// Incrementally collect coordinate entries.
pub struct CooMatrixBuilder<T> {
    row: Vec<i32>,
    col: Vec<i32>,
    val: Vec<T>,
}

impl<T: Real> CooMatrixBuilder<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Initialize a builder with a specified capacity.
    pub fn with_capacity(cap: usize) -> Self {
        CooMatrixBuilder {
            row: Vec::with_capacity(cap),
            col: Vec::with_capacity(cap),
            val: Vec::with_capacity(cap),
        }
    }

    pub fn add_entry(&mut self, row: usize, col: usize, val: T) {
        self.row.push(row as i32);
        self.col.push(col as i32);
        self.val.push(val);
    }

    /// Build the final COO matrix from this builder.
    pub fn finish(self) -> CooMatrix<T> {
        CooMatrix {
            row: self.row,
            col: self.col,
            val: self.val,
        }
    }

    /// Compress directly to CSR; duplicate coordinates are summed.
    pub fn to_csr(self, n_rows: usize, n_cols: usize) -> Result<CsrMatrix<T>> {
        self.finish().to_csr(n_rows, n_cols)
    }
}

impl<T: Real> Default for CooMatrixBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> CooMatrix<T> {
    /// Compress to CSR with the given shape; duplicate coordinates are
    /// summed.
    pub fn to_csr(&self, n_rows: usize, n_cols: usize) -> Result<CsrMatrix<T>> {
        let nnz = self.row.len();
        if self.col.len() != nnz || self.val.len() != nnz {
            return Err(Error::shape("coordinate arrays", nnz, self.col.len()));
        }
        for (&r, &c) in self.row.iter().zip(&self.col) {
            if r < 0 || r as usize >= n_rows {
                return Err(Error::shape("row index bound", n_rows, r.max(0) as usize));
            }
            if c < 0 || c as usize >= n_cols {
                return Err(Error::shape("column index bound", n_cols, c.max(0) as usize));
            }
        }

        // counting sort by row
        let mut counts = vec![0usize; n_rows + 1];
        for &r in &self.row {
            counts[r as usize + 1] += 1;
        }
        for i in 1..=n_rows {
            counts[i] += counts[i - 1];
        }
        let mut entries: Vec<(i32, T)> = vec![(0, T::zero()); nnz];
        let mut insert = counts.clone();
        for i in 0..nnz {
            let r = self.row[i] as usize;
            entries[insert[r]] = (self.col[i], self.val[i]);
            insert[r] += 1;
        }

        // order each row by column and merge duplicates
        let mut row_ptrs = Vec::with_capacity(n_rows + 1);
        let mut col_inds = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        row_ptrs.push(0);
        for r in 0..n_rows {
            let seg = &mut entries[counts[r]..counts[r + 1]];
            seg.sort_unstable_by_key(|&(c, _)| c);
            for &(c, v) in seg.iter() {
                if col_inds.len() > row_ptrs[r] && *col_inds.last().unwrap() == c {
                    let last = values.len() - 1;
                    values[last] = values[last] + v;
                } else {
                    col_inds.push(c);
                    values.push(v);
                }
            }
            row_ptrs.push(col_inds.len());
        }

        CsrMatrix::from_parts(n_rows, n_cols, row_ptrs, col_inds, values)
    }
}
