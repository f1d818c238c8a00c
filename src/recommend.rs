// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Top-N recommendation from trained factor matrices.

use std::collections::BinaryHeap;

use ndarray::Array1;
use ordered_float::NotNan;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::als::AlsModel;
use crate::backend::Backend;
use crate::dtype::Real;
use crate::errors::{Error, Result};
use crate::sparse::{CsrMatrix, SparseRowRef};

/// Options controlling a [`AlsModel::recommend`] call.
#[derive(Debug, Clone)]
pub struct RecommendOptions {
    /// Number of items to return.
    pub n: usize,
    /// Drop items the user has already interacted with.
    pub filter_already_liked_items: bool,
    /// Re-solve the user's factor vector from the supplied interaction
    /// row instead of using the stored one.  Required for user ids the
    /// model has never seen.
    pub recalculate_user: bool,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        RecommendOptions {
            n: 10,
            filter_already_liked_items: true,
            recalculate_user: false,
        }
    }
}

/// Entries in the bounded score heap.
///
/// The ordering is reversed on score so that [`BinaryHeap`] keeps the
/// worst candidate on top; score ties order by ascending item id.
#[derive(Debug, Clone, Copy)]
struct RecEntry<T> {
    score: NotNan<T>,
    item: i32,
}

impl<T: Real> PartialEq for RecEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.item == other.item
    }
}

impl<T: Real> Eq for RecEntry<T> {}

impl<T: Real> PartialOrd for RecEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Real> Ord for RecEntry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.item.cmp(&other.item))
    }
}

impl<B: Backend> AlsModel<B> {
    /// Recommend the top-`n` unseen items for a user.
    ///
    /// `user_items` is the user's interaction row; it drives liked-item
    /// filtering and, with `recalculate_user`, the factor re-solve.
    /// Returns item ids and scores in descending score order, ties broken
    /// by ascending item id.
    pub fn recommend(
        &self,
        user_id: usize,
        user_items: SparseRowRef<'_, B::Elem>,
        options: &RecommendOptions,
    ) -> Result<(Vec<i32>, Vec<B::Elem>)> {
        let n_items = self.item_factors().nrows();
        for &c in user_items.cols {
            if c as usize >= n_items {
                return Err(Error::unknown("item", c as usize, n_items));
            }
        }

        let xu: Array1<B::Elem> = if options.recalculate_user {
            self.recalculate_user(user_items)
        } else {
            let n_users = self.user_factors().nrows();
            if user_id >= n_users {
                return Err(Error::unknown("user", user_id, n_users));
            }
            self.user_factors().row(user_id).to_owned()
        };

        let liked: FxHashSet<i32> = if options.filter_already_liked_items {
            user_items.cols.iter().copied().collect()
        } else {
            FxHashSet::default()
        };

        let scores = self.item_factors().dot(&xu);
        let mut heap: BinaryHeap<RecEntry<B::Elem>> =
            BinaryHeap::with_capacity(options.n + 1);
        for (i, &s) in scores.iter().enumerate() {
            let item = i as i32;
            if liked.contains(&item) {
                continue;
            }
            let score =
                NotNan::new(s).map_err(|_| Error::NumericDivergence("predicted score is NaN"))?;
            let entry = RecEntry { score, item };
            if heap.len() < options.n {
                heap.push(entry);
            } else if let Some(worst) = heap.peek() {
                if entry < *worst {
                    heap.push(entry);
                    heap.pop();
                }
            }
        }

        let ranked = heap.into_sorted_vec();
        let ids = ranked.iter().map(|e| e.item).collect();
        let scores = ranked.iter().map(|e| e.score.into_inner()).collect();
        Ok((ids, scores))
    }

    /// Recommend for every row of an interaction matrix in parallel.
    pub fn recommend_all(
        &self,
        user_items: &CsrMatrix<B::Elem>,
        options: &RecommendOptions,
    ) -> Result<Vec<(Vec<i32>, Vec<B::Elem>)>> {
        (0..user_items.n_rows)
            .into_par_iter()
            .map(|u| self.recommend(u, user_items.row(u), options))
            .collect()
    }
}
