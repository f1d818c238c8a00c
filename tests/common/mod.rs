// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use implicit_als::{CsrMatrix, Real};
use ndarray::Array2;

/// Build a dense array from row slices of `f64` literals.
pub fn dense<T: Real>(rows: &[&[f64]]) -> Array2<T> {
    let n_cols = rows[0].len();
    Array2::from_shape_fn((rows.len(), n_cols), |(r, c)| T::from_float(rows[r][c]))
}

/// Build a CSR matrix from row slices, dropping zeros.
pub fn csr<T: Real>(rows: &[&[f64]]) -> CsrMatrix<T> {
    CsrMatrix::from_dense(&dense(rows))
}

/// An `n`×`n` checkerboard of likes with an empty diagonal: user `i`
/// likes item `j` iff `i + j` is even and `i != j`.
pub fn checkerboard<T: Real>(n: usize) -> CsrMatrix<T> {
    let dense = Array2::from_shape_fn((n, n), |(i, j)| {
        if (i + j) % 2 == 0 && i != j {
            T::one()
        } else {
            T::zero()
        }
    });
    CsrMatrix::from_dense(&dense)
}

/// Extract row `r` as a standalone 1×n matrix.
pub fn single_row<T: Real>(m: &CsrMatrix<T>, r: usize) -> CsrMatrix<T> {
    let row = m.row(r);
    CsrMatrix::from_parts(
        1,
        m.n_cols,
        vec![0, row.len()],
        row.cols.to_vec(),
        row.vals.to_vec(),
    )
    .unwrap()
}

/// Small binary interaction matrix, 7 users by 6 items.
pub fn counts_7x6<T: Real>() -> CsrMatrix<T> {
    csr(&[
        &[1., 1., 0., 1., 0., 0.],
        &[0., 1., 1., 1., 0., 0.],
        &[1., 0., 1., 0., 0., 0.],
        &[1., 1., 0., 0., 0., 0.],
        &[0., 0., 1., 1., 0., 1.],
        &[0., 1., 0., 0., 0., 1.],
        &[0., 0., 0., 0., 1., 1.],
    ])
}

/// Weighted 7×6 count matrix used by the explanation tests; its
/// transpose gives 6 users over 7 items.
pub fn explain_counts<T: Real>() -> CsrMatrix<T> {
    csr(&[
        &[1., 1., 0., 1., 0., 0.],
        &[0., 1., 1., 1., 0., 0.],
        &[1., 4., 1., 0., 7., 0.],
        &[1., 1., 0., 0., 0., 0.],
        &[9., 0., 4., 1., 0., 1.],
        &[0., 1., 0., 0., 0., 1.],
        &[0., 0., 2., 0., 1., 1.],
    ])
}

pub fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tolerance {tol})"
    );
}
