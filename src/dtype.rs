// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Floating-point element support.

use std::fmt;
use std::iter::Sum;

use ndarray::NdFloat;
use num_traits::float::FloatCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Tag identifying the element type of a model, carried in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dtype {
    F32,
    F64,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::F32 => write!(f, "float32"),
            Dtype::F64 => write!(f, "float64"),
        }
    }
}

/// Floating-point element types the solvers can operate on.
///
/// Combines the `ndarray` arithmetic bounds with `nalgebra`'s field trait
/// (for the Cholesky path) and serde (for snapshots).  Implemented for
/// `f32` and `f64`.
pub trait Real:
    NdFloat
    + FloatCore
    + nalgebra::RealField
    + Sum
    + Default
    + Serialize
    + DeserializeOwned
{
    const DTYPE: Dtype;

    fn from_float(x: f64) -> Self;
    fn into_f64(self) -> f64;
}

impl Real for f32 {
    const DTYPE: Dtype = Dtype::F32;

    #[inline]
    fn from_float(x: f64) -> Self {
        x as f32
    }

    #[inline]
    fn into_f64(self) -> f64 {
        self as f64
    }
}

impl Real for f64 {
    const DTYPE: Dtype = Dtype::F64;

    #[inline]
    fn from_float(x: f64) -> Self {
        x
    }

    #[inline]
    fn into_f64(self) -> f64 {
        self
    }
}
