// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Alternating least squares training.

mod explain;
pub(crate) mod loss;
mod model;
pub(crate) mod solve;

pub use explain::Explanation;
pub use model::{AlsConfig, AlsModel, CpuAlsModel, GpuAlsModel};
pub use solve::{SolveMethod, SolveParams};
