//! End-to-end checks: SSP estimation from recordings, then sensitivity maps
//! of a forward model under those projections.

use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use dspant_ssp_rs::{
    compute_covariance_segments, compute_proj, compute_proj_epochs, sensitivity_map, ChannelInfo,
    ChannelType, Epochs, Exclude, ForwardModel, ProjectionConfig, ProjectionKind, ProjectionRanks,
    SensitivityConfig, SensitivityMode, SensorType, SourceOrientation, SourceSpace, SspError,
};
use ndarray::{arr1, arr2, Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn grad_info(n: usize) -> ChannelInfo {
    let names = (0..n).map(|i| format!("MEG {:04}", i + 1)).collect();
    ChannelInfo::new(names, vec![ChannelType::Grad; n], vec![], 1000.0).unwrap()
}

fn noise(shape: (usize, usize), scale: f64, rng: &mut StdRng) -> Array2<f64> {
    Array2::from_shape_fn(shape, |_| scale * rng.random_range(-1.0..1.0))
}

#[test]
fn four_gradiometer_segments_give_two_unit_vectors() {
    let mut rng = StdRng::seed_from_u64(42);
    let segments: Vec<Array2<f64>> = (0..4).map(|_| noise((6, 100), 1.0, &mut rng)).collect();
    let views: Vec<ArrayView2<'_, f64>> = segments.iter().map(|s| s.view()).collect();

    let cov = compute_covariance_segments(&views, 2).unwrap();
    let projs = compute_proj(&cov, &grad_info(6), ProjectionRanks::new(2, 0, 0), "Raw-0.000-0.400").unwrap();

    assert_eq!(projs.len(), 2);
    assert!(projs[0].desc.ends_with("PCA-01"));
    assert!(projs[1].desc.ends_with("PCA-02"));
    for proj in &projs {
        assert_eq!(proj.ncol(), 6);
        assert!(!proj.active);
        assert_eq!(proj.kind, ProjectionKind::Field);
        let norm = proj.data.row(0).dot(&proj.data.row(0)).sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-10);
    }
    let overlap = projs[0].data.row(0).dot(&projs[1].data.row(0));
    assert_abs_diff_eq!(overlap, 0.0, epsilon = 1e-10);
}

#[test]
fn requesting_grads_without_grads_reduces_rank() {
    let info = ChannelInfo::new(
        vec!["EEG 001".into(), "EEG 002".into()],
        vec![ChannelType::Eeg; 2],
        vec![],
        250.0,
    )
    .unwrap();
    let projs = compute_proj(&Array2::eye(2), &info, ProjectionRanks::new(2, 0, 1), "x").unwrap();
    assert_eq!(projs.len(), 1);
    assert!(projs[0].desc.starts_with("eeg-"));
}

fn two_location_forward() -> ForwardModel {
    // normal columns [0, 3, 4] and [1, 0, 0]
    let gain = arr2(&[
        [1.0, 0.0, 0.0, 0.2, 0.3, 1.0],
        [0.0, 1.0, 3.0, 0.1, 0.0, 0.0],
        [0.5, 0.0, 4.0, 0.0, 0.7, 0.0],
    ]);
    ForwardModel::new(
        gain,
        grad_info(3),
        true,
        SourceOrientation::Free,
        vec![SourceSpace::new(vec![0]), SourceSpace::new(vec![5])],
        Some("sample".into()),
    )
    .unwrap()
}

#[test]
fn fixed_map_without_projectors() {
    let fwd = two_location_forward();
    let config = SensitivityConfig::new(SensorType::Grad, SensitivityMode::Fixed);
    let map = sensitivity_map(&fwd, None, &config).unwrap();

    assert_eq!(map.n_locations(), 2);
    assert_abs_diff_eq!(map.data[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(map.data[1], 1.0 / 5.0, epsilon = 1e-12);
    assert_eq!(map.vertices, vec![vec![0], vec![5]]);
    assert_eq!(map.tstep, 1.0);
}

#[test]
fn angle_without_projectors_is_a_configuration_error() {
    let fwd = two_location_forward();
    let config = SensitivityConfig::new(SensorType::Grad, SensitivityMode::Angle);
    let err = sensitivity_map(&fwd, None, &config).unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, SspError::MissingProjector { .. }));
}

#[test]
fn identities_hold_for_every_location() {
    let mut rng = StdRng::seed_from_u64(7);
    let n_channels = 8;
    let gain = noise((n_channels, 3 * 5), 1.0, &mut rng);
    let fwd = ForwardModel::new(
        gain,
        grad_info(n_channels),
        true,
        SourceOrientation::Free,
        vec![SourceSpace::new(vec![1, 2, 3]), SourceSpace::new(vec![4, 8])],
        None,
    )
    .unwrap();

    let cov = {
        let data = noise((n_channels, 200), 1.0, &mut rng);
        data.dot(&data.t())
    };
    let projs = compute_proj(&cov, &grad_info(n_channels), ProjectionRanks::new(2, 0, 0), "x").unwrap();

    let run = |mode| {
        sensitivity_map(&fwd, Some(&projs[..]), &SensitivityConfig::new(SensorType::Grad, mode))
            .unwrap()
            .data
    };
    let ratio = run(SensitivityMode::Ratio);
    let radiality = run(SensitivityMode::Radiality);
    let remaining = run(SensitivityMode::Remaining);
    let dampening = run(SensitivityMode::Dampening);
    let angle = run(SensitivityMode::Angle);
    let free = run(SensitivityMode::Free);

    for k in 0..5 {
        assert_abs_diff_eq!(radiality[k], 1.0 - ratio[k], epsilon = 1e-12);
        assert_abs_diff_eq!(dampening[k], 1.0 - remaining[k], epsilon = 1e-12);
        // Removed and surviving parts of the normal column are orthogonal
        assert_abs_diff_eq!(angle[k].powi(2) + remaining[k].powi(2), 1.0, epsilon = 1e-9);
        assert!((0.0..=1.0 + 1e-12).contains(&free[k]));
    }
    let max = free.iter().cloned().fold(f64::MIN, f64::max);
    assert_abs_diff_eq!(max, 1.0, epsilon = 1e-12);
}

#[test]
fn eeg_gets_an_average_reference_automatically() {
    let info = ChannelInfo::new(
        (1..=4).map(|i| format!("EEG {:03}", i)).collect(),
        vec![ChannelType::Eeg; 4],
        vec![],
        500.0,
    )
    .unwrap();
    // normal column of location 0 is common mode, location 1 is not
    let gain = arr2(&[
        [0.1, 0.0, 1.0, 0.3, 0.0, 1.0],
        [0.0, 0.2, 1.0, 0.0, 0.1, -1.0],
        [0.4, 0.0, 1.0, 0.2, 0.0, 0.0],
        [0.0, 0.5, 1.0, 0.0, 0.6, 0.0],
    ]);
    let fwd = ForwardModel::new(
        gain,
        info,
        true,
        SourceOrientation::Free,
        vec![SourceSpace::new(vec![3]), SourceSpace::new(vec![11])],
        None,
    )
    .unwrap();

    let config = SensitivityConfig::new(SensorType::Eeg, SensitivityMode::Angle);
    let angle = sensitivity_map(&fwd, None, &config).unwrap();
    assert_abs_diff_eq!(angle.data[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(angle.data[1], 0.0, epsilon = 1e-12);

    // After referencing, the common-mode location is invisible
    let config = SensitivityConfig::new(SensorType::Eeg, SensitivityMode::Fixed);
    let fixed = sensitivity_map(&fwd, None, &config).unwrap();
    assert_abs_diff_eq!(fixed.data[0], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(fixed.data[1], 1.0, epsilon = 1e-12);
}

#[test]
fn artifact_projection_shadows_aligned_sources() {
    let mut rng = StdRng::seed_from_u64(3);
    let n_channels = 5;
    let pattern = arr1(&[1.0, -2.0, 0.5, 0.0, 1.5]);

    // Epochs dominated by a single spatial artifact pattern
    let data: Vec<Array2<f64>> = (0..10)
        .map(|e| {
            let mut epoch = noise((n_channels, 60), 1e-3, &mut rng);
            for t in 0..60 {
                let amplitude = ((e * 60 + t) as f64 * 0.21).sin() * 10.0;
                for c in 0..n_channels {
                    epoch[[c, t]] += amplitude * pattern[c];
                }
            }
            epoch
        })
        .collect();
    let mut event_id = BTreeMap::new();
    event_id.insert("blink".to_string(), 998);
    let epochs = Epochs::new(data, grad_info(n_channels), -0.2, 0.2, event_id).unwrap();

    let config = ProjectionConfig {
        n_grad: 1,
        n_mag: 0,
        n_eeg: 0,
        n_jobs: 4,
    };
    let projs = compute_proj_epochs(&epochs, &config).unwrap();
    assert_eq!(projs.len(), 1);
    assert_eq!(projs[0].desc, "planar-998--0.200-0.200-PCA-01");

    // Location 0 points along the artifact, location 1 is orthogonal to it
    let mut gain = Array2::<f64>::zeros((n_channels, 6));
    gain.column_mut(0).assign(&arr1(&[0.0, 0.0, 0.0, 1.0, 0.0]));
    gain.column_mut(2).assign(&pattern);
    gain.column_mut(5).assign(&arr1(&[2.0, 1.0, 0.0, 0.0, 0.0]));
    let fwd = ForwardModel::new(
        gain,
        grad_info(n_channels),
        true,
        SourceOrientation::Free,
        vec![SourceSpace::new(vec![0, 1])],
        None,
    )
    .unwrap();

    let config = SensitivityConfig::new(SensorType::Grad, SensitivityMode::Dampening)
        .with_exclude(Exclude::Bads);
    let dampening = sensitivity_map(&fwd, Some(&projs[..]), &config).unwrap();
    assert!(dampening.data[0] > 0.99, "aligned source kept {}", dampening.data[0]);
    assert!(dampening.data[1] < 0.01, "orthogonal source lost {}", dampening.data[1]);
}
