// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Error types for model construction, training, and inference.

use thiserror::Error;

/// Errors surfaced at the public API boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Matrix dimensions are inconsistent with the model or each other.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A hyperparameter is outside its valid range.
    #[error("invalid hyperparameter {name}: {reason}")]
    InvalidHyperparameter { name: &'static str, reason: String },

    /// A user or item id is beyond the current factor matrix bounds.
    #[error("unknown {kind} id {id} (model has {count})")]
    UnknownId {
        kind: &'static str,
        id: usize,
        count: usize,
    },

    /// A computation produced a non-finite result that could not be
    /// recovered locally.
    #[error("numeric divergence: {0}")]
    NumericDivergence(&'static str),

    /// Snapshot encoding or decoding failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Error::ShapeMismatch {
            what,
            expected,
            actual,
        }
    }

    pub(crate) fn hyper(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidHyperparameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown(kind: &'static str, id: usize, count: usize) -> Self {
        Error::UnknownId { kind, id, count }
    }
}
