// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Sparse matrix support.
//!
//! Interaction data is consumed as read-only compressed sparse row
//! matrices.  [`CsrMatrix`] owns its storage; [`SparseRowRef`] is a cheap
//! borrowed view of one row, used to hand individual users' interactions
//! to the recommender.  [`CooMatrixBuilder`] collects coordinate triples
//! and compresses them.

mod coo;
mod csr;

pub use coo::{CooMatrix, CooMatrixBuilder};
pub use csr::{CsrMatrix, SparseRowRef};
