// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Additive decomposition of recommendation scores.
//!
//! The predicted score for `(user, item)` can be written as
//! `yᵢᵀ · W · (Yᵀ Cu pu)` with `W = (YᵀY + Yᵀ(Cu−I)Y + λI)⁻¹`, the
//! inverse of the same normal matrix the direct solver factorizes for
//! that user.  Expanding the right-hand side turns the score into one
//! term per liked item, `c_j · yᵢᵀ W y_j`, which sum exactly to the
//! total.

use std::cmp::Ordering;

use nalgebra::Cholesky;
use ndarray::{Array1, Array2};
use nshare::{IntoNalgebra, IntoNdarray2};

use crate::backend::Backend;
use crate::errors::{Error, Result};
use crate::sparse::CsrMatrix;

use super::model::AlsModel;
use super::solve::normal_equation;

/// The decomposition of one predicted score.
pub struct Explanation<T> {
    /// Total predicted score, the sum of all contributions (including any
    /// truncated away from `contributions`).
    pub score: T,
    /// `(liked_item_id, contribution)` pairs, sorted by descending
    /// contribution.
    pub contributions: Vec<(i32, T)>,
    /// The k×k inverse normal matrix `W` for this user; pass it back in
    /// to explain further items for the same user without refactorizing.
    pub user_weights: Array2<T>,
}

impl<B: Backend> AlsModel<B> {
    /// Explain the predicted score of `item_id` for `user_id` as additive
    /// per-interaction contributions.
    ///
    /// `user_items` is the full user/item interaction matrix; the user's
    /// row supplies the liked items and their confidences.  `n` truncates
    /// the returned list (the score still sums all contributions), and
    /// `user_weights` reuses a previously returned `W`.
    pub fn explain(
        &self,
        user_id: usize,
        user_items: &CsrMatrix<B::Elem>,
        item_id: usize,
        user_weights: Option<&Array2<B::Elem>>,
        n: Option<usize>,
    ) -> Result<Explanation<B::Elem>> {
        let n_items = self.item_factors.nrows();
        if item_id >= n_items {
            return Err(Error::unknown("item", item_id, n_items));
        }
        if user_id >= user_items.n_rows {
            return Err(Error::unknown("user", user_id, user_items.n_rows));
        }
        if user_items.n_cols > n_items {
            return Err(Error::shape("interaction columns", n_items, user_items.n_cols));
        }

        let row = user_items.row(user_id);
        let params = self.solve_params();
        let k = self.config.factors;

        let weights = match user_weights {
            Some(w) => {
                if w.dim() != (k, k) {
                    return Err(Error::shape("user weights", k, w.nrows()));
                }
                w.clone()
            }
            None => {
                let yty_local;
                let yty = match &self.yt_y {
                    Some(g) => g,
                    None => {
                        yty_local = self.backend.gram(&self.item_factors.view());
                        &yty_local
                    }
                };
                let (a, _) = normal_equation(
                    row.cols,
                    row.vals,
                    &self.item_factors.view(),
                    &yty.view(),
                    &params,
                );
                let chol = Cholesky::new(a.into_nalgebra())
                    .ok_or(Error::NumericDivergence("normal matrix is not positive definite"))?;
                chol.inverse().into_ndarray2()
            }
        };

        // yᵢᵀ W, reused across all contributions
        let target: Array1<B::Elem> = weights.dot(&self.item_factors.row(item_id));

        let mut contributions: Vec<(i32, B::Elem)> = row
            .iter()
            .map(|(c, v)| {
                let conf = params.confidence(v);
                let contribution = conf * target.dot(&self.item_factors.row(c as usize));
                (c, contribution)
            })
            .collect();
        let score: B::Elem = contributions.iter().map(|&(_, s)| s).sum();

        contributions.sort_unstable_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        if let Some(n) = n {
            contributions.truncate(n);
        }

        Ok(Explanation {
            score,
            contributions,
            user_weights: weights,
        })
    }
}
