// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

use log::*;
use ndarray::{Array1, Array2, ArrayView2, s};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, CpuBackend, GpuBackend};
use crate::dtype::Real;
use crate::errors::{Error, Result};
use crate::sparse::{CsrMatrix, SparseRowRef};

use super::solve::{SolveMethod, SolveParams};

/// Hyperparameters of an ALS model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlsConfig {
    /// Number of latent factors `k`.
    pub factors: usize,
    /// Regularization weight λ added to each per-row normal matrix.
    pub regularization: f64,
    /// Confidence scale: `c = 1 + alpha · count`.
    pub alpha: f64,
    /// Number of alternating iterations per `fit` call.
    pub iterations: usize,
    /// Solve rows by conjugate gradient instead of Cholesky.
    pub use_cg: bool,
    /// CG steps per row solve.
    pub cg_steps: usize,
    /// Compute and log the training loss after each iteration.
    pub calculate_loss: bool,
    /// Seed for factor initialization.
    pub random_state: u64,
}

impl Default for AlsConfig {
    fn default() -> Self {
        AlsConfig {
            factors: 64,
            regularization: 0.01,
            alpha: 1.0,
            iterations: 15,
            use_cg: true,
            cg_steps: 3,
            calculate_loss: false,
            random_state: 42,
        }
    }
}

impl AlsConfig {
    fn validate(&self) -> Result<()> {
        if self.factors == 0 {
            return Err(Error::hyper("factors", "must be positive"));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(Error::hyper(
                "regularization",
                format!("must be finite and non-negative, got {}", self.regularization),
            ));
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(Error::hyper(
                "alpha",
                format!("must be finite and positive, got {}", self.alpha),
            ));
        }
        if self.cg_steps == 0 {
            return Err(Error::hyper("cg_steps", "must be positive"));
        }
        Ok(())
    }
}

/// An alternating-least-squares latent factor model.
///
/// Generic over the numeric [`Backend`]; see [`CpuAlsModel`] and
/// [`GpuAlsModel`].  Factor matrices grow (never shrink) as new user and
/// item ids are introduced by the incremental refit operations.
pub struct AlsModel<B: Backend> {
    pub(crate) config: AlsConfig,
    pub(crate) backend: B,
    pub(crate) user_factors: Array2<B::Elem>,
    pub(crate) item_factors: Array2<B::Elem>,
    /// Gram matrix of the item factors, if current.
    pub(crate) yt_y: Option<Array2<B::Elem>>,
    /// Gram matrix of the user factors, if current.
    pub(crate) xt_x: Option<Array2<B::Elem>>,
}

/// ALS model on the thread-parallel CPU backend.
pub type CpuAlsModel<T> = AlsModel<CpuBackend<T>>;
/// ALS model on the batched `f32` device backend.
pub type GpuAlsModel = AlsModel<GpuBackend>;

impl<T: Real> CpuAlsModel<T> {
    /// Create an unfitted model on the CPU backend.
    pub fn new(config: AlsConfig) -> Result<Self> {
        Self::with_backend(config, CpuBackend::new())
    }
}

impl GpuAlsModel {
    /// Create an unfitted model on the device backend.
    pub fn new_gpu(config: AlsConfig) -> Result<Self> {
        Self::with_backend(config, GpuBackend::new())
    }
}

impl<B: Backend> AlsModel<B> {
    pub fn with_backend(config: AlsConfig, backend: B) -> Result<Self> {
        config.validate()?;
        let k = config.factors;
        Ok(AlsModel {
            config,
            backend,
            user_factors: Array2::zeros((0, k)),
            item_factors: Array2::zeros((0, k)),
            yt_y: None,
            xt_x: None,
        })
    }

    pub fn config(&self) -> &AlsConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn user_factors(&self) -> ArrayView2<'_, B::Elem> {
        self.user_factors.view()
    }

    pub fn item_factors(&self) -> ArrayView2<'_, B::Elem> {
        self.item_factors.view()
    }

    pub(crate) fn solve_params(&self) -> SolveParams<B::Elem> {
        SolveParams {
            regularization: B::Elem::from_float(self.config.regularization),
            alpha: B::Elem::from_float(self.config.alpha),
            method: if self.config.use_cg {
                SolveMethod::ConjugateGradient
            } else {
                SolveMethod::Direct
            },
            cg_steps: self.config.cg_steps,
        }
    }

    /// Fit the model to an interaction matrix (users × items).
    ///
    /// Factor matrices are (re)initialized from `random_state`, so a fit
    /// with the same seed, data, and backend is reproducible.  Each
    /// iteration recomputes the item Gram matrix, solves every user row,
    /// recomputes the user Gram matrix, and solves every item row; the
    /// Gram recompute between the two half-steps is the synchronization
    /// point that observes the fully updated factors.
    pub fn fit(&mut self, interactions: &CsrMatrix<B::Elem>) -> Result<()> {
        let n_users = interactions.n_rows;
        let n_items = interactions.n_cols;
        let params = self.solve_params();

        self.init_factors(n_users, n_items);
        let transposed = interactions.transpose();

        debug!(
            "fitting {} users x {} items with {} factors ({} iterations)",
            n_users, n_items, self.config.factors, self.config.iterations
        );

        for iteration in 0..self.config.iterations {
            let yty = self.backend.gram(&self.item_factors.view());
            self.backend.solve_half(
                interactions,
                &mut self.user_factors,
                &self.item_factors.view(),
                &yty.view(),
                &params,
            );

            let xtx = self.backend.gram(&self.user_factors.view());
            self.backend.solve_half(
                &transposed,
                &mut self.item_factors,
                &self.user_factors.view(),
                &xtx.view(),
                &params,
            );

            if self.config.calculate_loss {
                let loss = self.backend.loss(
                    interactions,
                    &self.user_factors.view(),
                    &self.item_factors.view(),
                    self.config.regularization,
                    self.config.alpha,
                );
                info!("iteration {}: training loss {:.6}", iteration + 1, loss);
            }
        }

        if self.config.iterations == 0 && self.config.calculate_loss {
            let loss = self.backend.loss(
                interactions,
                &self.user_factors.view(),
                &self.item_factors.view(),
                self.config.regularization,
                self.config.alpha,
            );
            info!("initial training loss {:.6}", loss);
        }

        self.yt_y = Some(self.backend.gram(&self.item_factors.view()));
        self.xt_x = Some(self.backend.gram(&self.user_factors.view()));
        Ok(())
    }

    /// Training loss of the current factors on an interaction matrix.
    pub fn loss(&self, interactions: &CsrMatrix<B::Elem>) -> Result<f64> {
        if interactions.n_rows != self.user_factors.nrows() {
            return Err(Error::shape(
                "interaction rows",
                self.user_factors.nrows(),
                interactions.n_rows,
            ));
        }
        if interactions.n_cols != self.item_factors.nrows() {
            return Err(Error::shape(
                "interaction columns",
                self.item_factors.nrows(),
                interactions.n_cols,
            ));
        }
        Ok(self.backend.loss(
            interactions,
            &self.user_factors.view(),
            &self.item_factors.view(),
            self.config.regularization,
            self.config.alpha,
        ))
    }

    /// Refit factors for the given user ids from their interaction rows.
    ///
    /// Row `r` of `user_items` holds the interactions of `user_ids[r]`.
    /// Ids beyond the current user count extend the factor matrix; ids in
    /// the gap that are not supplied stay zero-initialized.  Each supplied
    /// row is solved once against the cached item Gram matrix — the model
    /// is not re-alternated, so the result is the row's optimum given the
    /// factors of the last full fit.
    pub fn partial_fit_users(
        &mut self,
        user_ids: &[usize],
        user_items: &CsrMatrix<B::Elem>,
    ) -> Result<()> {
        if user_items.n_rows != user_ids.len() {
            return Err(Error::shape(
                "partial fit rows",
                user_ids.len(),
                user_items.n_rows,
            ));
        }
        if user_items.n_cols > self.item_factors.nrows() {
            return Err(Error::shape(
                "interaction columns",
                self.item_factors.nrows(),
                user_items.n_cols,
            ));
        }

        if let Some(&max_id) = user_ids.iter().max() {
            grow_rows(&mut self.user_factors, max_id + 1);
        }
        // user factors changed; the cached user Gram matrix is stale
        self.xt_x = None;

        let params = self.solve_params();
        let yty = self.item_gram();
        for (r, &id) in user_ids.iter().enumerate() {
            let x = self.backend.solve_row(
                user_items.row(r),
                &self.item_factors.view(),
                &yty.view(),
                &params,
            );
            self.user_factors.row_mut(id).assign(&x);
        }
        Ok(())
    }

    /// Refit factors for the given item ids; symmetric to
    /// [`AlsModel::partial_fit_users`] with `item_users` rows holding each
    /// item's interactions over users.
    pub fn partial_fit_items(
        &mut self,
        item_ids: &[usize],
        item_users: &CsrMatrix<B::Elem>,
    ) -> Result<()> {
        if item_users.n_rows != item_ids.len() {
            return Err(Error::shape(
                "partial fit rows",
                item_ids.len(),
                item_users.n_rows,
            ));
        }
        if item_users.n_cols > self.user_factors.nrows() {
            return Err(Error::shape(
                "interaction columns",
                self.user_factors.nrows(),
                item_users.n_cols,
            ));
        }

        if let Some(&max_id) = item_ids.iter().max() {
            grow_rows(&mut self.item_factors, max_id + 1);
        }
        self.yt_y = None;

        let params = self.solve_params();
        let xtx = self.user_gram();
        for (r, &id) in item_ids.iter().enumerate() {
            let x = self.backend.solve_row(
                item_users.row(r),
                &self.user_factors.view(),
                &xtx.view(),
                &params,
            );
            self.item_factors.row_mut(id).assign(&x);
        }
        Ok(())
    }

    /// Solve a user factor vector from an interaction row without
    /// touching the stored factors.
    pub(crate) fn recalculate_user(&self, user_items: SparseRowRef<'_, B::Elem>) -> Array1<B::Elem> {
        let params = self.solve_params();
        let yty_local;
        let yty = match &self.yt_y {
            Some(g) => g,
            None => {
                yty_local = self.backend.gram(&self.item_factors.view());
                &yty_local
            }
        };
        self.backend
            .solve_row(user_items, &self.item_factors.view(), &yty.view(), &params)
    }

    /// Cached item Gram matrix, recomputing and storing it if stale.
    pub(crate) fn item_gram(&mut self) -> Array2<B::Elem> {
        if let Some(g) = &self.yt_y {
            return g.clone();
        }
        let g = self.backend.gram(&self.item_factors.view());
        self.yt_y = Some(g.clone());
        g
    }

    /// Cached user Gram matrix, recomputing and storing it if stale.
    pub(crate) fn user_gram(&mut self) -> Array2<B::Elem> {
        if let Some(g) = &self.xt_x {
            return g.clone();
        }
        let g = self.backend.gram(&self.user_factors.view());
        self.xt_x = Some(g.clone());
        g
    }

    fn init_factors(&mut self, n_users: usize, n_items: usize) {
        let k = self.config.factors;
        let mut rng = Pcg64::seed_from_u64(self.config.random_state);
        self.user_factors = random_factors(&mut rng, n_users, k);
        self.item_factors = random_factors(&mut rng, n_items, k);
        self.yt_y = None;
        self.xt_x = None;
    }
}

impl CpuAlsModel<f32> {
    /// Convert to the batched device backend, preserving hyperparameters,
    /// factors, and Gram caches.
    pub fn to_gpu(self) -> GpuAlsModel {
        AlsModel {
            config: self.config,
            backend: GpuBackend::new(),
            user_factors: self.user_factors,
            item_factors: self.item_factors,
            yt_y: self.yt_y,
            xt_x: self.xt_x,
        }
    }
}

impl GpuAlsModel {
    /// Convert to the CPU backend, preserving hyperparameters, factors,
    /// and Gram caches.
    pub fn to_cpu(self) -> CpuAlsModel<f32> {
        AlsModel {
            config: self.config,
            backend: CpuBackend::new(),
            user_factors: self.user_factors,
            item_factors: self.item_factors,
            yt_y: self.yt_y,
            xt_x: self.xt_x,
        }
    }
}

/// Small uniform values in `[0, 0.01)`, one RNG stream for both matrices.
fn random_factors<T: Real>(rng: &mut Pcg64, rows: usize, k: usize) -> Array2<T> {
    Array2::from_shape_simple_fn((rows, k), || T::from_float(rng.random::<f64>() * 0.01))
}

/// Extend a factor matrix with zero rows up to `new_rows`.
fn grow_rows<T: Real>(factors: &mut Array2<T>, new_rows: usize) {
    let (old_rows, k) = factors.dim();
    if new_rows <= old_rows {
        return;
    }
    let mut grown = Array2::zeros((new_rows, k));
    grown.slice_mut(s![..old_rows, ..]).assign(factors);
    *factors = grown;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(AlsConfig::default().validate().is_ok());
        let bad = AlsConfig {
            factors: 0,
            ..Default::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(Error::InvalidHyperparameter { name: "factors", .. })
        ));
        let bad = AlsConfig {
            regularization: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = AlsConfig {
            alpha: 0.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn seeded_init_is_reproducible() {
        let mut rng1 = Pcg64::seed_from_u64(7);
        let mut rng2 = Pcg64::seed_from_u64(7);
        let a: Array2<f64> = random_factors(&mut rng1, 4, 3);
        let b: Array2<f64> = random_factors(&mut rng2, 4, 3);
        assert_eq!(a, b);
        assert!(a.iter().all(|&v| (0.0..0.01).contains(&v)));
    }

    #[test]
    fn grow_rows_preserves_existing() {
        let mut m = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32);
        let orig = m.clone();
        grow_rows(&mut m, 5);
        assert_eq!(m.dim(), (5, 3));
        assert_eq!(m.slice(s![..2, ..]), orig);
        assert!(m.slice(s![2.., ..]).iter().all(|&v| v == 0.0));

        grow_rows(&mut m, 3); // never shrinks
        assert_eq!(m.dim(), (5, 3));
    }
}
