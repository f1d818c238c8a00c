// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Per-row regularized least-squares solvers.
//!
//! Each row solve minimizes the confidence-weighted objective for one
//! user (or item) with the opposite factor matrix held fixed:
//!
//! ```text
//! (YᵀY + Yᵀ(Cu − I)Y + λI) xᵤ = Yᵀ Cu pᵤ
//! ```
//!
//! where `Cu` is the diagonal confidence matrix of the row's nonzero
//! entries and `pᵤ` the binarized preference vector.  The direct solver
//! materializes the k×k normal matrix and runs a Cholesky decomposition;
//! the conjugate-gradient solver iterates a fixed number of steps from a
//! warm start without forming the low-rank correction.

use nalgebra::Cholesky;
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut1};
use nshare::IntoNalgebra;
use num_traits::Float;

use crate::dtype::Real;

/// Residual cutoff below which CG considers a row converged.
const CG_TOLERANCE: f64 = 1e-20;

/// How a half-iteration solves its rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMethod {
    /// Explicit normal matrix, Cholesky decomposition.
    Direct,
    /// Fixed-step conjugate gradient with warm start.
    ConjugateGradient,
}

/// Scalar inputs shared by every row solve of a half-iteration.
#[derive(Debug, Clone, Copy)]
pub struct SolveParams<T> {
    pub regularization: T,
    pub alpha: T,
    pub method: SolveMethod,
    /// Steps per CG solve; also the fallback for backends without a
    /// direct solver.
    pub cg_steps: usize,
}

impl<T: Real> SolveParams<T> {
    #[inline]
    pub fn confidence(&self, count: T) -> T {
        T::one() + self.alpha * count
    }
}

/// Build the per-row normal equation `(A, b)`.
///
/// `A = G + λI + Σ (c−1)·y yᵀ` and `b = Σ c·y` over the row's nonzero
/// columns, where `G` is the Gram matrix of `other`.
pub(crate) fn normal_equation<T: Real>(
    cols: &[i32],
    vals: &[T],
    other: &ArrayView2<'_, T>,
    gram: &ArrayView2<'_, T>,
    params: &SolveParams<T>,
) -> (Array2<T>, Array1<T>) {
    let k = gram.nrows();
    let mut a = gram.to_owned();
    for d in 0..k {
        a[[d, d]] += params.regularization;
    }
    let mut b = Array1::zeros(k);
    for (&c, &v) in cols.iter().zip(vals) {
        let y = other.row(c as usize);
        let conf = params.confidence(v);
        b.scaled_add(conf, &y);
        let w = conf - T::one();
        for r in 0..k {
            let yr = y[r];
            a.row_mut(r).scaled_add(w * yr, &y);
        }
    }
    (a, b)
}

/// Solve one row directly via Cholesky decomposition.
///
/// Rows with no interactions are zeroed (the λ=0 system is singular and
/// the zero vector is its minimum-norm solution).  If the decomposition
/// fails or produces a non-finite vector, the row keeps its previous
/// finite value.  Returns whether the row was updated.
pub(crate) fn solve_row_direct<T: Real>(
    row_data: &mut ArrayViewMut1<'_, T>,
    cols: &[i32],
    vals: &[T],
    other: &ArrayView2<'_, T>,
    gram: &ArrayView2<'_, T>,
    params: &SolveParams<T>,
) -> bool {
    if cols.is_empty() {
        row_data.fill(T::zero());
        return true;
    }

    let (a, b) = normal_equation(cols, vals, other, gram, params);
    let a = a.into_nalgebra();
    let b = b.into_nalgebra();
    if let Some(chol) = Cholesky::new(a) {
        let x = chol.solve(&b);
        if x.iter().all(|v| Float::is_finite(*v)) {
            for (dst, &src) in row_data.iter_mut().zip(x.iter()) {
                *dst = src;
            }
            return true;
        }
    }
    false
}

/// Solve one row with a fixed number of conjugate-gradient steps.
///
/// The iteration is warm-started from the row's current value, so unseen
/// rows (all-zero warm start, empty right-hand side) converge trivially
/// to zero.  If the residual norm goes non-finite or a step-size
/// denominator collapses, the update is abandoned and the row keeps its
/// previous finite value.  Returns whether the row was updated.
pub(crate) fn solve_row_cg<T: Real>(
    row_data: &mut ArrayViewMut1<'_, T>,
    cols: &[i32],
    vals: &[T],
    other: &ArrayView2<'_, T>,
    gram: &ArrayView2<'_, T>,
    params: &SolveParams<T>,
    steps: usize,
) -> bool {
    if cols.is_empty() {
        row_data.fill(T::zero());
        return true;
    }

    let tiny = T::from_float(CG_TOLERANCE);
    let lambda = params.regularization;
    let mut x = row_data.to_owned();

    // r = b − A·x, accumulated without forming A
    let mut r: Array1<T> = gram.dot(&x);
    r.zip_mut_with(&x, |ri, &xi| *ri = -(*ri + lambda * xi));
    for (&c, &v) in cols.iter().zip(vals) {
        let y = other.row(c as usize);
        let conf = params.confidence(v);
        let coeff = conf - (conf - T::one()) * y.dot(&x);
        r.scaled_add(coeff, &y);
    }

    let mut rsold = r.dot(&r);
    if !Float::is_finite(rsold) {
        return false;
    }
    if rsold < tiny {
        return true;
    }

    let mut p = r.clone();
    for _ in 0..steps {
        // ap = A·p
        let mut ap: Array1<T> = gram.dot(&p);
        ap.zip_mut_with(&p, |api, &pi| *api += lambda * pi);
        for (&c, &v) in cols.iter().zip(vals) {
            let y = other.row(c as usize);
            let w = (params.confidence(v) - T::one()) * y.dot(&p);
            ap.scaled_add(w, &y);
        }

        let pap = p.dot(&ap);
        if !Float::is_finite(pap) || pap <= tiny {
            break;
        }
        let step = rsold / pap;
        x.scaled_add(step, &p);
        r.scaled_add(-step, &ap);

        let rsnew = r.dot(&r);
        if !Float::is_finite(rsnew) {
            return false;
        }
        if rsnew < tiny {
            break;
        }
        let beta = rsnew / rsold;
        p.zip_mut_with(&r, |pi, &ri| *pi = ri + beta * *pi);
        rsold = rsnew;
    }

    if x.iter().all(|v| Float::is_finite(*v)) {
        row_data.assign(&x);
        true
    } else {
        false
    }
}
