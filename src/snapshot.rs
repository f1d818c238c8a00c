// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Saving and restoring trained models.
//!
//! A snapshot records the configuration and both factor matrices along
//! with an element-type tag; the Gram caches are derived state and are
//! rebuilt deterministically after restore.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::als::{AlsConfig, AlsModel, CpuAlsModel};
use crate::backend::{Backend, CpuBackend};
use crate::dtype::{Dtype, Real};
use crate::errors::{Error, Result};

#[derive(Serialize, Deserialize)]
struct ModelSnapshot<T> {
    dtype: Dtype,
    config: AlsConfig,
    user_factors: Array2<T>,
    item_factors: Array2<T>,
}

impl<B: Backend> AlsModel<B> {
    /// Serialize the model state to a byte buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snap = ModelSnapshot {
            dtype: B::Elem::DTYPE,
            config: self.config.clone(),
            user_factors: self.user_factors.clone(),
            item_factors: self.item_factors.clone(),
        };
        Ok(serde_json::to_vec(&snap)?)
    }
}

impl<T: Real> CpuAlsModel<T> {
    /// Restore a model from a [`AlsModel::to_bytes`] buffer.
    ///
    /// Fails if the buffer was written with a different element type
    /// than `T`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snap: ModelSnapshot<T> = serde_json::from_slice(bytes)?;
        if snap.dtype != T::DTYPE {
            return Err(Error::hyper(
                "dtype",
                "snapshot element type does not match the model",
            ));
        }
        let mut model = Self::with_backend(snap.config, CpuBackend::new())?;
        model.user_factors = snap.user_factors;
        model.item_factors = snap.item_factors;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_factors() {
        let mut model = CpuAlsModel::<f64>::new(AlsConfig {
            factors: 3,
            ..AlsConfig::default()
        })
        .unwrap();
        model.user_factors = Array2::from_shape_fn((2, 3), |(i, j)| (i * 3 + j) as f64);
        model.item_factors = Array2::from_shape_fn((4, 3), |(i, j)| (i + j) as f64 * 0.5);

        let bytes = model.to_bytes().unwrap();
        let restored = CpuAlsModel::<f64>::from_bytes(&bytes).unwrap();
        assert_eq!(restored.config().factors, 3);
        assert_eq!(restored.user_factors, model.user_factors);
        assert_eq!(restored.item_factors, model.item_factors);
    }

    #[test]
    fn dtype_mismatch_is_rejected() {
        let model = CpuAlsModel::<f32>::new(AlsConfig::default()).unwrap();
        let bytes = model.to_bytes().unwrap();
        let err = CpuAlsModel::<f64>::from_bytes(&bytes);
        assert!(err.is_err());
    }
}
