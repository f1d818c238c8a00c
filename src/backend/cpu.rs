// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Thread-parallel CPU backend.

use std::marker::PhantomData;

use ndarray::{Array1, Array2, ArrayView2};
use rayon::prelude::*;

use crate::als::loss::calculate_loss;
use crate::als::solve::{solve_row_cg, solve_row_direct, SolveMethod, SolveParams};
use crate::dtype::Real;
use crate::sparse::{CsrMatrix, SparseRowRef};

use super::{Backend, BackendKind};

/// CPU backend, generic over the factor dtype.
///
/// Row solves within a half-iteration are independent (each writes only
/// its own factor row) and run unordered on the rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend<T> {
    _elem: PhantomData<T>,
}

impl<T> CpuBackend<T> {
    pub fn new() -> Self {
        CpuBackend { _elem: PhantomData }
    }
}

impl<T: Real> Backend for CpuBackend<T> {
    type Elem = T;

    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn gram(&self, factors: &ArrayView2<'_, T>) -> Array2<T> {
        factors.t().dot(factors)
    }

    fn solve_half(
        &self,
        interactions: &CsrMatrix<T>,
        this: &mut Array2<T>,
        other: &ArrayView2<'_, T>,
        gram: &ArrayView2<'_, T>,
        params: &SolveParams<T>,
    ) {
        this.outer_iter_mut()
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let cols = interactions.row_cols(i);
                let vals = interactions.row_vals(i);
                match params.method {
                    SolveMethod::Direct => {
                        solve_row_direct(&mut row, cols, vals, other, gram, params);
                    }
                    SolveMethod::ConjugateGradient => {
                        solve_row_cg(&mut row, cols, vals, other, gram, params, params.cg_steps);
                    }
                }
            });
    }

    fn solve_row(
        &self,
        row: SparseRowRef<'_, T>,
        other: &ArrayView2<'_, T>,
        gram: &ArrayView2<'_, T>,
        params: &SolveParams<T>,
    ) -> Array1<T> {
        let mut x = Array1::zeros(gram.nrows());
        solve_row_direct(&mut x.view_mut(), row.cols, row.vals, other, gram, params);
        x
    }

    fn loss(
        &self,
        interactions: &CsrMatrix<T>,
        user_factors: &ArrayView2<'_, T>,
        item_factors: &ArrayView2<'_, T>,
        regularization: f64,
        alpha: f64,
    ) -> f64 {
        calculate_loss(
            interactions,
            user_factors,
            item_factors,
            regularization,
            alpha,
        )
    }
}
