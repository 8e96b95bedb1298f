// src/processors/sensitivity/map.rs

use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::forward::{ForwardModel, SourceOrientation};
use super::modes::LocationTerms;
use crate::config::SensitivityConfig;
use crate::error::{Result, SspError};
use crate::processors::channels::SensorType;
use crate::processors::spatial::projector::{
    Projection, ProjectionKind, Projector, ProjectorConstructor, SvdProjector,
};
use crate::processors::spatial::svd::singular_values;

/// One value per source location, laid out like the forward's source spaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityMap {
    pub data: Array1<f64>,
    /// Vertex numbers per source space (hemisphere), concatenated order of `data`
    pub vertices: Vec<Vec<usize>>,
    pub subject: Option<String>,
    pub tmin: f64,
    pub tstep: f64,
}

impl SensitivityMap {
    pub fn n_locations(&self) -> usize {
        self.data.len()
    }

    /// Vertex numbers of source space `hemi`
    pub fn vertices_for(&self, hemi: usize) -> Option<&[usize]> {
        self.vertices.get(hemi).map(Vec::as_slice)
    }

    /// Values belonging to source space `hemi`
    pub fn values_for(&self, hemi: usize) -> Option<ArrayView1<'_, f64>> {
        let offset: usize = self.vertices.iter().take(hemi).map(Vec::len).sum();
        let len = self.vertices.get(hemi)?.len();
        Some(self.data.slice(s![offset..offset + len]))
    }
}

fn norm(v: &ArrayView1<'_, f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Reject forward models a sensitivity map is undefined for
pub fn check_orientation(surf_ori: bool, source_ori: SourceOrientation) -> Result<()> {
    if !surf_ori {
        return Err(SspError::NotSurfaceOriented);
    }
    if source_ori == SourceOrientation::Fixed {
        return Err(SspError::FixedOrientation);
    }
    Ok(())
}

/// Compute a sensitivity map with the default SVD projector construction
///
/// Such maps tell how visible each source is to one type of sensor, and how
/// much of that visibility a set of projections shadows.
pub fn sensitivity_map(
    fwd: &ForwardModel,
    projs: Option<&[Projection]>,
    config: &SensitivityConfig,
) -> Result<SensitivityMap> {
    sensitivity_map_with(fwd, projs, config, &SvdProjector)
}

/// Compute a sensitivity map using `constructor` to turn projections into
/// a projector
pub fn sensitivity_map_with<C>(
    fwd: &ForwardModel,
    projs: Option<&[Projection]>,
    config: &SensitivityConfig,
    constructor: &C,
) -> Result<SensitivityMap>
where
    C: ProjectorConstructor + ?Sized,
{
    let mode = config.mode;
    let projs = projs.filter(|p| !p.is_empty());

    // check forward
    check_orientation(fwd.surf_ori, fwd.source_ori)?;
    if fwd.gain.ncols() != 3 * fwd.n_sources() {
        return Err(SspError::ForwardShape(format!(
            "gain has {} columns for {} free-orientation sources",
            fwd.gain.ncols(),
            fwd.n_sources()
        )));
    }

    // EEG always gets an average reference, every other type needs projections
    if mode.requires_projector() && projs.is_none() && config.ch_type != SensorType::Eeg {
        return Err(SspError::MissingProjector {
            mode: mode.to_string(),
        });
    }

    // limit forward
    let fwd = fwd.pick_channels(config.ch_type, &config.exclude)?;
    let n_sensors = fwd.gain.nrows();

    let mut projs: Vec<Projection> = projs.map(<[Projection]>::to_vec).unwrap_or_default();
    if config.ch_type == SensorType::Eeg
        && !projs
            .iter()
            .any(|p| p.kind == ProjectionKind::EegAverageReference)
    {
        projs.push(constructor.make_eeg_average_ref_proj(&fwd.info)?);
    }

    let projector = if projs.is_empty() {
        None
    } else {
        let projector = constructor.make_projector(&projs, fwd.row_names(), true)?;
        check_projector(&projector, n_sensors)?;
        Some(projector)
    };

    // do projection for most types
    let projected;
    let gain: &Array2<f64> = match &projector {
        Some(p) if mode.projects_gain() => {
            projected = p.matrix.dot(&fwd.gain);
            &projected
        }
        _ => &fwd.gain,
    };

    let n_locations = gain.ncols() / 3;
    let mut data = Array1::<f64>::zeros(n_locations);

    for k in 0..n_locations {
        let gg = gain.slice(s![.., 3 * k..3 * (k + 1)]);
        let normal = gg.column(2);

        let s_max = if mode.needs_singular_values() {
            singular_values(&gg)?[0]
        } else {
            f64::NAN
        };
        let (removed, remaining) = match &projector {
            Some(p) if mode.requires_projector() => {
                let removed = normal.dot(&p.basis);
                let kept = p.matrix.dot(&normal);
                (norm(&removed.view()), norm(&kept.view()))
            }
            _ => (f64::NAN, f64::NAN),
        };

        data[k] = mode.evaluate(&LocationTerms {
            s_max,
            gz: norm(&normal),
            removed,
            remaining,
        });
    }

    // only normalize fixed and free methods
    if mode.is_normalized() && n_locations > 0 {
        let max = data.fold(f64::NEG_INFINITY, |acc, &x| acc.max(x));
        data.mapv_inplace(|x| x / max);
    }

    debug!(
        ch_type = %config.ch_type,
        mode = %mode,
        n_sensors,
        n_locations,
        ncomp = projector.as_ref().map_or(0, |p| p.ncomp),
        "computed sensitivity map"
    );

    Ok(SensitivityMap {
        data,
        vertices: fwd.vertices(),
        subject: fwd.subject.clone(),
        tmin: 0.0,
        tstep: 1.0,
    })
}

fn check_projector(projector: &Projector, n_sensors: usize) -> Result<()> {
    if projector.matrix.dim() != (n_sensors, n_sensors) {
        return Err(SspError::ShapeMismatch {
            expected: vec![n_sensors, n_sensors],
            got: vec![projector.matrix.nrows(), projector.matrix.ncols()],
        });
    }
    if projector.basis.nrows() != n_sensors {
        return Err(SspError::ShapeMismatch {
            expected: vec![n_sensors, projector.ncomp],
            got: vec![projector.basis.nrows(), projector.basis.ncols()],
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::channels::{ChannelInfo, ChannelType, Exclude};
    use crate::processors::sensitivity::forward::{SourceOrientation, SourceSpace};
    use crate::processors::sensitivity::modes::SensitivityMode;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    /// 3 gradiometers, 2 locations (one per hemisphere)
    fn grad_forward() -> ForwardModel {
        let info = ChannelInfo::new(
            vec!["G1".into(), "G2".into(), "G3".into()],
            vec![ChannelType::Grad; 3],
            vec![],
            1000.0,
        )
        .unwrap();
        let gain = arr2(&[
            [1.0, 0.0, 3.0, 0.5, 0.0, 1.0],
            [0.0, 2.0, 0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 4.0, 0.0, 0.0, 0.0],
        ]);
        ForwardModel::new(
            gain,
            info,
            true,
            SourceOrientation::Free,
            vec![SourceSpace::new(vec![10]), SourceSpace::new(vec![20])],
            Some("sample".into()),
        )
        .unwrap()
    }

    fn grad_proj(data: [[f64; 3]; 1]) -> Projection {
        Projection::new(
            "planar-test-PCA-01",
            ProjectionKind::Field,
            vec!["G1".into(), "G2".into(), "G3".into()],
            arr2(&data),
        )
        .unwrap()
    }

    fn config(mode: SensitivityMode) -> SensitivityConfig {
        SensitivityConfig::new(SensorType::Grad, mode)
    }

    #[test]
    fn test_fixed_without_projectors_is_normalized_normal_norm() {
        let map = sensitivity_map(&grad_forward(), None, &config(SensitivityMode::Fixed)).unwrap();
        // normal columns: [3, 0, 4] -> 5 and [1, 0, 0] -> 1
        assert_eq!(map.n_locations(), 2);
        assert_abs_diff_eq!(map.data[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(map.data[1], 0.2, epsilon = 1e-12);
        assert_eq!(map.vertices, vec![vec![10], vec![20]]);
        assert_eq!(map.subject.as_deref(), Some("sample"));
        assert_eq!(map.values_for(1).unwrap().to_vec(), vec![map.data[1]]);
        assert!(map.values_for(2).is_none());
        assert_eq!(map.vertices_for(0), Some(&[10][..]));
        assert!(map.vertices_for(2).is_none());
    }

    #[test]
    fn test_free_is_normalized_largest_singular_value() {
        let map = sensitivity_map(&grad_forward(), None, &config(SensitivityMode::Free)).unwrap();
        let max = map.data.iter().cloned().fold(f64::MIN, f64::max);
        assert_abs_diff_eq!(max, 1.0, epsilon = 1e-12);
        assert!(map.data.iter().all(|&x| (0.0..=1.0 + 1e-12).contains(&x)));
    }

    #[test]
    fn test_ratio_and_radiality_are_complements() {
        let proj = grad_proj([[0.0, 1.0, 0.0]]);
        let projs = [proj];
        let ratio = sensitivity_map(&grad_forward(), Some(&projs[..]), &config(SensitivityMode::Ratio)).unwrap();
        let radiality =
            sensitivity_map(&grad_forward(), Some(&projs[..]), &config(SensitivityMode::Radiality)).unwrap();
        for k in 0..2 {
            assert_abs_diff_eq!(radiality.data[k], 1.0 - ratio.data[k], epsilon = 1e-12);
            assert!(ratio.data[k] <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_angle_remaining_dampening() {
        // Remove the G3 direction: location 0 normal [3, 0, 4] loses 4/5 of its norm
        let projs = [grad_proj([[0.0, 0.0, 2.0]])];
        let fwd = grad_forward();

        let angle = sensitivity_map(&fwd, Some(&projs[..]), &config(SensitivityMode::Angle)).unwrap();
        let remaining = sensitivity_map(&fwd, Some(&projs[..]), &config(SensitivityMode::Remaining)).unwrap();
        let dampening = sensitivity_map(&fwd, Some(&projs[..]), &config(SensitivityMode::Dampening)).unwrap();

        assert_abs_diff_eq!(angle.data[0], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(remaining.data[0], 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(angle.data[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(remaining.data[1], 1.0, epsilon = 1e-12);
        for k in 0..2 {
            assert_abs_diff_eq!(dampening.data[k], 1.0 - remaining.data[k], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_projection_lowers_fixed_sensitivity_before_normalizing() {
        let projs = [grad_proj([[0.0, 0.0, 1.0]])];
        let map = sensitivity_map(&grad_forward(), Some(&projs[..]), &config(SensitivityMode::Fixed)).unwrap();
        // Projected normals: [3, 0, 0] -> 3 and [1, 0, 0] -> 1
        assert_abs_diff_eq!(map.data[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(map.data[1], 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_projector_modes_need_projections() {
        for mode in [SensitivityMode::Angle, SensitivityMode::Remaining, SensitivityMode::Dampening] {
            let err = sensitivity_map(&grad_forward(), None, &config(mode)).unwrap_err();
            assert!(matches!(err, SspError::MissingProjector { .. }));
            let err = sensitivity_map(&grad_forward(), Some(&[][..]), &config(mode)).unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_forward_orientation_checks() {
        let mut fwd = grad_forward();
        fwd.surf_ori = false;
        let err = sensitivity_map(&fwd, None, &config(SensitivityMode::Fixed)).unwrap_err();
        assert!(matches!(err, SspError::NotSurfaceOriented));

        let mut fwd = grad_forward();
        fwd.source_ori = SourceOrientation::Fixed;
        let err = sensitivity_map(&fwd, None, &config(SensitivityMode::Fixed)).unwrap_err();
        assert!(matches!(err, SspError::FixedOrientation));
    }

    #[test]
    fn test_orientation_is_checked_before_gain_shape() {
        // a fixed-orientation flag on a free-shaped gain is a configuration error
        let err = check_orientation(true, SourceOrientation::Fixed).unwrap_err();
        assert!(matches!(err, SspError::FixedOrientation));
        assert!(err.is_configuration());
        assert!(matches!(
            check_orientation(false, SourceOrientation::Free),
            Err(SspError::NotSurfaceOriented)
        ));
        assert!(check_orientation(true, SourceOrientation::Free).is_ok());
    }

    #[test]
    fn test_gain_edited_after_construction_is_rejected() {
        let mut fwd = grad_forward();
        fwd.gain = fwd.gain.slice(s![.., ..5]).to_owned();
        let err = sensitivity_map(&fwd, None, &config(SensitivityMode::Fixed)).unwrap_err();
        assert!(matches!(err, SspError::ForwardShape(_)));
    }

    #[test]
    fn test_exclusion_changes_the_rows_used() {
        let excluded = config(SensitivityMode::Fixed).with_exclude(Exclude::Channels(vec!["G3".into()]));
        let map = sensitivity_map(&grad_forward(), None, &excluded).unwrap();
        // Normals without G3: [3, 0] -> 3 and [1, 0] -> 1
        assert_abs_diff_eq!(map.data[1], 1.0 / 3.0, epsilon = 1e-12);
    }

    struct CountingConstructor {
        calls: std::cell::Cell<usize>,
    }

    impl ProjectorConstructor for CountingConstructor {
        fn make_projector(
            &self,
            projs: &[Projection],
            ch_names: &[String],
            include_active: bool,
        ) -> Result<Projector> {
            self.calls.set(self.calls.get() + 1);
            SvdProjector.make_projector(projs, ch_names, include_active)
        }

        fn make_eeg_average_ref_proj(&self, info: &ChannelInfo) -> Result<Projection> {
            SvdProjector.make_eeg_average_ref_proj(info)
        }
    }

    #[test]
    fn test_custom_constructor_is_used() {
        let constructor = CountingConstructor {
            calls: std::cell::Cell::new(0),
        };
        let projs = [grad_proj([[1.0, 0.0, 0.0]])];
        sensitivity_map_with(&grad_forward(), Some(&projs[..]), &config(SensitivityMode::Remaining), &constructor)
            .unwrap();
        assert_eq!(constructor.calls.get(), 1);

        sensitivity_map_with(&grad_forward(), None, &config(SensitivityMode::Fixed), &constructor).unwrap();
        assert_eq!(constructor.calls.get(), 1);
    }
}
