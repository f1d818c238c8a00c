// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Confidence-weighted training loss.
//!
//! The objective treats every user/item pair as observed: nonzero counts
//! contribute `c·(1 − xᵤ·yᵢ)²` with confidence `c = 1 + α·r`, and all
//! other pairs contribute `(xᵤ·yᵢ)²` with unit weight.  Summing the dense
//! term over `n_users × n_items` pairs is avoided by the Gram identity
//! `Σᵤᵢ (xᵤ·yᵢ)² = Σᵤ xᵤᵀ(YᵀY)xᵤ`, with a per-nonzero correction folded
//! into the sparse pass.  The total is normalized by the summed weights.
//!
//! Counts and index products use 64-bit arithmetic throughout; the pair
//! count alone overflows 32 bits for moderately large catalogs.
//! Accumulation is in `f64` regardless of the factor dtype so that both
//! backends report comparable values.

use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;

use crate::dtype::Real;
use crate::sparse::CsrMatrix;

/// Compute the normalized training loss on the CPU.
pub(crate) fn calculate_loss<T: Real>(
    interactions: &CsrMatrix<T>,
    user_factors: &ArrayView2<'_, T>,
    item_factors: &ArrayView2<'_, T>,
    regularization: f64,
    alpha: f64,
) -> f64 {
    let n_users = interactions.n_rows;
    let n_items = interactions.n_cols;
    let k = user_factors.ncols();

    let items64 = item_factors.mapv(|v| v.into_f64());
    let yty: Array2<f64> = items64.t().dot(&items64);

    let (sparse_loss, total_confidence) = (0..n_users)
        .into_par_iter()
        .map(|u| {
            let xu: Vec<f64> = user_factors.row(u).iter().map(|v| v.into_f64()).collect();
            let mut acc = 0.0;
            let mut conf = 0.0;
            for (c, v) in interactions.row(u).iter() {
                let ci = 1.0 + alpha * v.into_f64();
                let yi = items64.row(c as usize);
                let d: f64 = xu.iter().zip(yi.iter()).map(|(a, b)| a * b).sum();
                let e = 1.0 - d;
                acc += ci * e * e - d * d;
                conf += ci;
            }
            // + Σᵢ (xᵤ·yᵢ)² over the full item catalog
            for a in 0..k {
                let mut s = 0.0;
                for b in 0..k {
                    s += yty[[a, b]] * xu[b];
                }
                acc += xu[a] * s;
            }
            (acc, conf)
        })
        .reduce(|| (0.0, 0.0), |(l1, c1), (l2, c2)| (l1 + l2, c1 + c2));

    let user_norm: f64 = user_factors.iter().map(|v| v.into_f64() * v.into_f64()).sum();
    let item_norm: f64 = item_factors.iter().map(|v| v.into_f64() * v.into_f64()).sum();
    let total = sparse_loss + regularization * (user_norm + item_norm);

    let pairs = n_users as u64 * n_items as u64;
    let denom = total_confidence + pairs as f64 - interactions.nnz() as f64;
    if denom == 0.0 {
        0.0
    } else {
        total / denom
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::sparse::CooMatrixBuilder;

    // One user who liked item 0 and never saw item 1, with factors that
    // predict exactly the opposite.
    fn wrong_prediction() -> (CsrMatrix<f64>, Array2<f64>, Array2<f64>) {
        let mut coo = CooMatrixBuilder::new();
        coo.add_entry(0, 0, 1.0);
        let users = array![[1.0]];
        let items = array![[0.0], [1.0]];
        (coo.to_csr(1, 2).unwrap(), users, items)
    }

    #[test]
    fn test_loss_unregularized() {
        let (ratings, users, items) = wrong_prediction();
        // c·(1−0)² + 0² for the liked pair, 1² for the unseen pair,
        // over weight c + 1
        let loss = calculate_loss(&ratings, &users.view(), &items.view(), 0.0, 1.0);
        assert!((loss - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_regularized() {
        let (ratings, users, items) = wrong_prediction();
        // adds λ·(‖X‖² + ‖Y‖²) = 2 to the numerator: (2 + 1 + 2) / 3
        let loss = calculate_loss(&ratings, &users.view(), &items.view(), 1.0, 1.0);
        assert!((loss - 5.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_empty_matrix() {
        let coo = CooMatrixBuilder::<f64>::new();
        let users = Array2::zeros((0, 2));
        let items = Array2::zeros((0, 2));
        let empty = coo.to_csr(0, 0).unwrap();
        let loss = calculate_loss(&empty, &users.view(), &items.view(), 0.1, 1.0);
        assert_eq!(loss, 0.0);
    }
}
