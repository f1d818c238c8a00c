// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Numeric backend abstraction.
//!
//! A [`Backend`] supplies the numeric kernels of the training engine: Gram
//! matrix computation, the batched per-row solves of one half-iteration,
//! single-row solves for recalculation, and the training loss.  The engine
//! in [`crate::als`] is backend-agnostic and holds whichever strategy is
//! active; both implementations share the confidence-weight and
//! regularization semantics, so a model fit on one backend converts to the
//! other without changing its recommendations.

mod cpu;
mod gpu;

pub use cpu::CpuBackend;
pub use gpu::GpuBackend;

use ndarray::{Array1, Array2, ArrayView2};

use crate::als::solve::SolveParams;
use crate::dtype::Real;
use crate::sparse::{CsrMatrix, SparseRowRef};

/// Which backend family a strategy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Gpu,
}

/// Numeric kernels behind the training engine.
pub trait Backend: Send + Sync {
    type Elem: Real;

    fn kind(&self) -> BackendKind;

    /// Compute the Gram matrix `FᵀF` of a factor matrix.
    fn gram(&self, factors: &ArrayView2<'_, Self::Elem>) -> Array2<Self::Elem>;

    /// Solve every row of `this` against the fixed opposite factors.
    ///
    /// `gram` must be the Gram matrix of `other` as of the start of this
    /// half-iteration.  Rows are write-disjoint; a row whose solve
    /// diverges keeps its previous finite value.
    fn solve_half(
        &self,
        interactions: &CsrMatrix<Self::Elem>,
        this: &mut Array2<Self::Elem>,
        other: &ArrayView2<'_, Self::Elem>,
        gram: &ArrayView2<'_, Self::Elem>,
        params: &SolveParams<Self::Elem>,
    );

    /// Solve a single row directly, without touching stored factors.
    ///
    /// Used for user recalculation and incremental refits; always uses the
    /// direct solver so the result is the row's exact optimum given the
    /// opposite factors.
    fn solve_row(
        &self,
        row: SparseRowRef<'_, Self::Elem>,
        other: &ArrayView2<'_, Self::Elem>,
        gram: &ArrayView2<'_, Self::Elem>,
        params: &SolveParams<Self::Elem>,
    ) -> Array1<Self::Elem>;

    /// Normalized confidence-weighted training loss.
    fn loss(
        &self,
        interactions: &CsrMatrix<Self::Elem>,
        user_factors: &ArrayView2<'_, Self::Elem>,
        item_factors: &ArrayView2<'_, Self::Elem>,
        regularization: f64,
        alpha: f64,
    ) -> f64;
}
