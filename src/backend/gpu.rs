// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Batched `f32` backend mirroring device execution.
//!
//! This backend implements the [`Backend`] contract the way a GPU build
//! executes it: factors are flat `f32` buffers, a half-iteration is a
//! sequence of fixed-size kernel launches over contiguous row blocks, row
//! solves use the fixed-step conjugate-gradient kernel, and every count or
//! index product in the loss reduction is 64-bit (`n_users × n_items`
//! overflows 32 bits well before memory runs out).  A device build
//! implements [`Backend`] against the same kernels; this host
//! implementation is the reference for that contract and keeps the
//! cross-backend properties testable everywhere.

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use crate::als::solve::{solve_row_direct, SolveParams};
use crate::sparse::{CsrMatrix, SparseRowRef};

use super::{Backend, BackendKind};

/// Rows per kernel launch.
const BLOCK_ROWS: usize = 4096;

/// Batched `f32` backend.
#[derive(Debug, Clone, Copy)]
pub struct GpuBackend {
    block_rows: usize,
}

impl GpuBackend {
    pub fn new() -> Self {
        GpuBackend {
            block_rows: BLOCK_ROWS,
        }
    }
}

impl Default for GpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// CG kernel for one row over flat buffers.
///
/// Same recurrence and divergence guards as the generic solver in
/// [`crate::als::solve`]: warm start from the current row value, abandon
/// the update (keeping the previous finite row) if the residual goes
/// non-finite, stop early if the step denominator collapses.
#[allow(clippy::too_many_arguments)]
fn cg_kernel(
    cols: &[i32],
    vals: &[f32],
    other: &[f32],
    gram: &[f32],
    k: usize,
    lambda: f32,
    alpha: f32,
    steps: usize,
    row: &mut [f32],
) {
    if cols.is_empty() {
        row.fill(0.0);
        return;
    }

    let tiny = 1e-20f32;
    let mut x = row.to_vec();
    let mut r = vec![0.0f32; k];
    let mut p = vec![0.0f32; k];
    let mut ap = vec![0.0f32; k];

    // r = b − A·x without forming A
    for a in 0..k {
        r[a] = -(dot(&gram[a * k..(a + 1) * k], &x) + lambda * x[a]);
    }
    for (&c, &v) in cols.iter().zip(vals) {
        let y = &other[c as usize * k..(c as usize + 1) * k];
        let conf = 1.0 + alpha * v;
        axpy(conf - (conf - 1.0) * dot(y, &x), y, &mut r);
    }

    let mut rsold = dot(&r, &r);
    if !rsold.is_finite() {
        return;
    }
    if rsold < tiny {
        return;
    }

    p.copy_from_slice(&r);
    for _ in 0..steps {
        for a in 0..k {
            ap[a] = dot(&gram[a * k..(a + 1) * k], &p) + lambda * p[a];
        }
        for (&c, &v) in cols.iter().zip(vals) {
            let y = &other[c as usize * k..(c as usize + 1) * k];
            let w = alpha * v * dot(y, &p);
            axpy(w, y, &mut ap);
        }

        let pap = dot(&p, &ap);
        if !pap.is_finite() || pap <= tiny {
            break;
        }
        let step = rsold / pap;
        axpy(step, &p, &mut x);
        axpy(-step, &ap, &mut r);

        let rsnew = dot(&r, &r);
        if !rsnew.is_finite() {
            return;
        }
        if rsnew < tiny {
            break;
        }
        let beta = rsnew / rsold;
        for (pi, &ri) in p.iter_mut().zip(&r) {
            *pi = ri + beta * *pi;
        }
        rsold = rsnew;
    }

    if x.iter().all(|v| v.is_finite()) {
        row.copy_from_slice(&x);
    }
}

/// Loss reduction kernel for one block of user rows.
///
/// All accumulation in `f64`, all counts in 64-bit.
fn loss_block(
    interactions: &CsrMatrix<f32>,
    users: std::ops::Range<usize>,
    uf: &[f32],
    items64: &[f64],
    yty: &[f64],
    k: usize,
    alpha: f64,
) -> (f64, f64) {
    users
        .into_par_iter()
        .map(|u| {
            let xu: Vec<f64> = uf[u * k..(u + 1) * k].iter().map(|&v| v as f64).collect();
            let mut acc = 0.0;
            let mut conf = 0.0;
            for (c, v) in interactions.row(u).iter() {
                let ci = 1.0 + alpha * v as f64;
                let yi = &items64[c as usize * k..(c as usize + 1) * k];
                let d: f64 = xu.iter().zip(yi).map(|(a, b)| a * b).sum();
                let e = 1.0 - d;
                acc += ci * e * e - d * d;
                conf += ci;
            }
            for a in 0..k {
                let s: f64 = yty[a * k..(a + 1) * k]
                    .iter()
                    .zip(&xu)
                    .map(|(g, x)| g * x)
                    .sum();
                acc += xu[a] * s;
            }
            (acc, conf)
        })
        .reduce(|| (0.0, 0.0), |(l1, c1), (l2, c2)| (l1 + l2, c1 + c2))
}

impl Backend for GpuBackend {
    type Elem = f32;

    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn gram(&self, factors: &ArrayView2<'_, f32>) -> Array2<f32> {
        factors.t().dot(factors)
    }

    fn solve_half(
        &self,
        interactions: &CsrMatrix<f32>,
        this: &mut Array2<f32>,
        other: &ArrayView2<'_, f32>,
        gram: &ArrayView2<'_, f32>,
        params: &SolveParams<f32>,
    ) {
        let k = this.ncols();
        let n_rows = this.nrows();
        // the device solver is CG-only; direct solves run the configured
        // number of CG steps instead
        let steps = params.cg_steps;
        let lambda = params.regularization;
        let alpha = params.alpha;

        let this_flat = this
            .as_slice_mut()
            .expect("factor matrix is not contiguous");
        let other_flat = other.as_slice().expect("factor matrix is not contiguous");
        let gram_flat = gram.as_slice().expect("gram matrix is not contiguous");

        let mut start = 0;
        while start < n_rows {
            let end = (start + self.block_rows).min(n_rows);
            this_flat[start * k..end * k]
                .par_chunks_mut(k)
                .enumerate()
                .for_each(|(j, row)| {
                    let u = start + j;
                    cg_kernel(
                        interactions.row_cols(u),
                        interactions.row_vals(u),
                        other_flat,
                        gram_flat,
                        k,
                        lambda,
                        alpha,
                        steps,
                        row,
                    );
                });
            start = end;
        }
    }

    fn solve_row(
        &self,
        row: SparseRowRef<'_, f32>,
        other: &ArrayView2<'_, f32>,
        gram: &ArrayView2<'_, f32>,
        params: &SolveParams<f32>,
    ) -> Array1<f32> {
        let mut x = Array1::zeros(gram.nrows());
        solve_row_direct(&mut x.view_mut(), row.cols, row.vals, other, gram, params);
        x
    }

    fn loss(
        &self,
        interactions: &CsrMatrix<f32>,
        user_factors: &ArrayView2<'_, f32>,
        item_factors: &ArrayView2<'_, f32>,
        regularization: f64,
        alpha: f64,
    ) -> f64 {
        let n_users = interactions.n_rows as i64;
        let n_items = interactions.n_cols as i64;
        let k = user_factors.ncols();

        let uf = user_factors
            .as_slice()
            .expect("factor matrix is not contiguous");
        let items64: Vec<f64> = item_factors.iter().map(|&v| v as f64).collect();

        // yty[a][b] = Σᵢ yᵢ[a]·yᵢ[b]
        let mut yty = vec![0.0f64; k * k];
        for i in 0..n_items as usize {
            let yi = &items64[i * k..(i + 1) * k];
            for a in 0..k {
                let ya = yi[a];
                for b in 0..k {
                    yty[a * k + b] += ya * yi[b];
                }
            }
        }

        let mut sparse_loss = 0.0;
        let mut total_confidence = 0.0;
        let mut start = 0usize;
        while start < n_users as usize {
            let end = (start + self.block_rows).min(n_users as usize);
            let (l, c) = loss_block(interactions, start..end, uf, &items64, &yty, k, alpha);
            sparse_loss += l;
            total_confidence += c;
            start = end;
        }

        let user_norm: f64 = uf.iter().map(|&v| v as f64 * v as f64).sum();
        let item_norm: f64 = items64.iter().map(|&v| v * v).sum();
        let total = sparse_loss + regularization * (user_norm + item_norm);

        let pairs = n_users * n_items;
        let denom = total_confidence + pairs as f64 - interactions.nnz() as f64;
        if denom == 0.0 {
            0.0
        } else {
            total / denom
        }
    }
}
