// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Latent-factor collaborative filtering for implicit feedback data.
//!
//! This crate fits matrix factorization models to sparse user-item
//! interaction counts with alternating least squares, using the
//! confidence-weighted formulation of Hu, Koren, and Volinsky
//! ("Collaborative Filtering for Implicit Feedback Datasets").
//!
//! The model is [`AlsModel`], configured through [`AlsConfig`].  Training
//! alternates between solving every user row and every item row of the
//! factor matrices; each per-row regularized least-squares system is solved
//! either directly by Cholesky decomposition or by a fixed number of
//! conjugate-gradient steps.  Fitted models support top-N recommendation,
//! incremental refitting of new users and items, additive score
//! explanations, backend conversion, and byte-level snapshots.
//!
//! Row solves are dispatched through the [`backend::Backend`] strategy
//! trait.  [`backend::CpuBackend`] solves rows in parallel with rayon and
//! is generic over `f32`/`f64`; [`backend::GpuBackend`] is the `f32`-only
//! batched implementation of the same contract.

pub mod als;
pub mod backend;
pub mod dtype;
pub mod errors;
pub mod recommend;
pub mod snapshot;
pub mod sparse;

pub use als::{AlsConfig, AlsModel, CpuAlsModel, Explanation, GpuAlsModel, SolveMethod};
pub use dtype::{Dtype, Real};
pub use errors::{Error, Result};
pub use recommend::RecommendOptions;
pub use sparse::{CooMatrixBuilder, CsrMatrix, SparseRowRef};
