// This file is part of implicit-als.
// Licensed under the MIT license, see LICENSE.md for details.
// SPDX-License-Identifier: MIT

//! Agreement tests between the CPU and batched device backends.

mod common;

use implicit_als::{AlsConfig, CooMatrixBuilder, CpuAlsModel, GpuAlsModel, RecommendOptions};

use common::{checkerboard, counts_7x6, dense};

#[test]
fn test_gpu_factorize() {
    let counts = counts_7x6::<f32>();
    let expected = dense::<f32>(&[
        &[1., 1., 0., 1., 0., 0.],
        &[0., 1., 1., 1., 0., 0.],
        &[1., 0., 1., 0., 0., 0.],
        &[1., 1., 0., 0., 0., 0.],
        &[0., 0., 1., 1., 0., 1.],
        &[0., 1., 0., 0., 0., 1.],
        &[0., 0., 0., 0., 1., 1.],
    ]);

    let mut model = GpuAlsModel::new_gpu(AlsConfig {
        factors: 6,
        regularization: 0.0,
        alpha: 2.0,
        iterations: 30,
        random_state: 42,
        ..AlsConfig::default()
    })
    .unwrap();
    model.fit(&counts).unwrap();

    let reconstructed = model.user_factors().dot(&model.item_factors().t());
    for i in 0..counts.n_rows {
        for j in 0..counts.n_cols {
            common::assert_close(reconstructed[[i, j]] as f64, expected[[i, j]] as f64, 1e-4);
        }
    }
}

#[test]
fn test_gpu_direct_uses_configured_cg_steps() {
    // the device solver is CG-only, so a direct-solve configuration must
    // run the configured number of CG steps, not a fixed default
    let likes = checkerboard::<f32>(16);
    let fit = |use_cg: bool| {
        let mut model = GpuAlsModel::new_gpu(AlsConfig {
            factors: 4,
            iterations: 3,
            use_cg,
            cg_steps: 6,
            random_state: 23,
            ..AlsConfig::default()
        })
        .unwrap();
        model.fit(&likes).unwrap();
        model
    };

    let direct = fit(false);
    let cg = fit(true);
    assert_eq!(direct.user_factors(), cg.user_factors());
    assert_eq!(direct.item_factors(), cg.item_factors());
}

#[test]
fn test_loss_parity_small() {
    let likes = checkerboard::<f32>(10);
    let config = AlsConfig {
        factors: 4,
        iterations: 0,
        random_state: 23,
        ..AlsConfig::default()
    };

    let mut cpu = CpuAlsModel::<f32>::new(config.clone()).unwrap();
    let mut gpu = GpuAlsModel::new_gpu(config).unwrap();
    cpu.fit(&likes).unwrap();
    gpu.fit(&likes).unwrap();

    // identical seeds give identical factors, so losses must agree
    assert_eq!(cpu.user_factors(), gpu.user_factors());
    let cl = cpu.loss(&likes).unwrap();
    let gl = gpu.loss(&likes).unwrap();
    assert!((cl - gl).abs() <= 1e-6 * cl.abs().max(1.0));
}

#[test]
fn test_loss_parity_large_pair_count() {
    // 65536² user/item pairs exceed a 32-bit count; both backends must
    // agree on the normalization
    let n = 65536usize;
    let mut coo = CooMatrixBuilder::with_capacity(n);
    for i in 0..n {
        coo.add_entry(i, (i * 31) % n, 1.0f32);
    }
    let interactions = coo.to_csr(n, n).unwrap();

    let config = AlsConfig {
        factors: 8,
        iterations: 0,
        random_state: 7,
        ..AlsConfig::default()
    };
    let mut cpu = CpuAlsModel::<f32>::new(config.clone()).unwrap();
    let mut gpu = GpuAlsModel::new_gpu(config).unwrap();
    cpu.fit(&interactions).unwrap();
    gpu.fit(&interactions).unwrap();

    let cl = cpu.loss(&interactions).unwrap();
    let gl = gpu.loss(&interactions).unwrap();
    assert!(cl.is_finite() && cl > 0.0);
    assert!((cl - gl).abs() <= 1e-5 * cl.abs());
}

#[test]
fn test_recalculate_after_backend_conversion() {
    let likes = checkerboard::<f32>(50);
    let mut model = GpuAlsModel::new_gpu(AlsConfig {
        factors: 2,
        random_state: 23,
        ..AlsConfig::default()
    })
    .unwrap();
    model.fit(&likes).unwrap();

    let options = RecommendOptions {
        recalculate_user: true,
        ..RecommendOptions::default()
    };
    let (original_ids, _) = model.recommend(0, likes.row(0), &options).unwrap();

    let model = model.to_cpu().to_gpu();
    let (ids, _) = model.recommend(0, likes.row(0), &options).unwrap();

    assert_eq!(ids, original_ids);
}

#[test]
fn test_gpu_snapshot_round_trip() {
    let likes = checkerboard::<f32>(10);
    let mut model = GpuAlsModel::new_gpu(AlsConfig {
        factors: 2,
        regularization: 0.1,
        random_state: 23,
        ..AlsConfig::default()
    })
    .unwrap();
    model.fit(&likes).unwrap();

    let options = RecommendOptions {
        recalculate_user: true,
        ..RecommendOptions::default()
    };
    let (original_ids, _) = model.recommend(0, likes.row(0), &options).unwrap();

    let bytes = model.to_bytes().unwrap();
    let restored = CpuAlsModel::<f32>::from_bytes(&bytes).unwrap().to_gpu();
    let (ids, _) = restored.recommend(0, likes.row(0), &options).unwrap();

    assert_eq!(ids, original_ids);
}
