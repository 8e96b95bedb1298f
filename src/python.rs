// src/python.rs

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::config::{ProjectionConfig, RawProjectionConfig, SensitivityConfig};
use crate::error::{Result, SspError};
use crate::processors::channels::{ChannelInfo, ChannelType, Exclude, ProjectionRanks};
use crate::processors::sensitivity::{self, ForwardModel, SourceOrientation, SourceSpace};
use crate::processors::spatial::{self, Projection, ProjectionKind, ProjectorConstructor, SvdProjector};

impl From<SspError> for PyErr {
    fn from(err: SspError) -> PyErr {
        match err {
            SspError::Linalg(_) | SspError::ThreadPool(_) | SspError::MissingSingularVectors => {
                PyRuntimeError::new_err(err.to_string())
            }
            ref e if e.is_insufficient_data() => PyRuntimeError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

fn channel_info(
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    sfreq: f64,
) -> Result<ChannelInfo> {
    let ch_types = ch_types
        .iter()
        .map(|t| t.parse())
        .collect::<Result<Vec<ChannelType>>>()?;
    ChannelInfo::new(ch_names, ch_types, bads, sfreq)
}

fn thresholds(map: Option<BTreeMap<String, f64>>) -> Result<BTreeMap<ChannelType, f64>> {
    map.unwrap_or_default()
        .into_iter()
        .map(|(kind, value)| kind.parse::<ChannelType>().map(|kind| (kind, value)))
        .collect()
}

fn projection_to_dict<'py>(py: Python<'py>, proj: Projection) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("desc", proj.desc)?;
    dict.set_item("kind", proj.kind.code())?;
    dict.set_item("active", proj.active)?;
    dict.set_item("col_names", proj.col_names)?;
    dict.set_item("data", proj.data.into_pyarray(py))?;
    Ok(dict)
}

fn projections_to_list<'py>(
    py: Python<'py>,
    projs: Vec<Projection>,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    projs
        .into_iter()
        .map(|p| projection_to_dict(py, p))
        .collect()
}

fn required<'py>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Bound<'py, PyAny>> {
    dict.get_item(key)?
        .ok_or_else(|| PyValueError::new_err(format!("projection is missing '{}'", key)))
}

fn projection_from_dict(dict: &Bound<'_, PyDict>) -> PyResult<Projection> {
    let desc: String = required(dict, "desc")?.extract()?;
    let code: i32 = required(dict, "kind")?.extract()?;
    let kind = ProjectionKind::from_code(code)
        .ok_or_else(|| PyValueError::new_err(format!("Unknown projection kind {}", code)))?;
    let active: bool = required(dict, "active")?.extract()?;
    let col_names: Vec<String> = required(dict, "col_names")?.extract()?;
    let data: PyReadonlyArray2<f64> = required(dict, "data")?.extract()?;

    let mut proj = Projection::new(desc, kind, col_names, data.as_array().to_owned())?;
    proj.active = active;
    Ok(proj)
}

fn exclude_from_py(exclude: Option<&Bound<'_, PyAny>>) -> PyResult<Exclude> {
    let Some(obj) = exclude else {
        return Ok(Exclude::default());
    };
    if let Ok(keyword) = obj.extract::<String>() {
        return match keyword.as_str() {
            "bads" => Ok(Exclude::Bads),
            other => Err(PyValueError::new_err(format!(
                "exclude must be a list of channel names or 'bads' (got {})",
                other
            ))),
        };
    }
    Ok(Exclude::Channels(obj.extract()?))
}

/// Sum X @ X.T over a list of (channels × samples) segments
#[pyfunction]
#[pyo3(signature = (segments, n_jobs=1))]
pub fn compute_covariance_segments(
    py: Python<'_>,
    segments: Vec<PyReadonlyArray2<f64>>,
    n_jobs: usize,
) -> PyResult<Py<PyArray2<f64>>> {
    // Convert inputs to rust ndarrays
    let owned: Vec<Array2<f64>> = segments.iter().map(|s| s.as_array().to_owned()).collect();

    // Allow Python threads to run during computation
    let cov = Python::allow_threads(py, || {
        let views: Vec<ArrayView2<'_, f64>> = owned.iter().map(|s| s.view()).collect();
        spatial::compute_covariance_segments(&views, n_jobs)
    })?;

    Ok(cov.into_pyarray(py).into())
}

/// SSP vectors from an already computed covariance matrix
#[pyfunction]
#[pyo3(signature = (cov, ch_names, ch_types, bads, desc_prefix, n_grad=2, n_mag=2, n_eeg=2))]
#[allow(clippy::too_many_arguments)]
pub fn compute_proj_from_cov<'py>(
    py: Python<'py>,
    cov: PyReadonlyArray2<f64>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    desc_prefix: &str,
    n_grad: usize,
    n_mag: usize,
    n_eeg: usize,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let cov_array = cov.as_array().to_owned();
    let info = channel_info(ch_names, ch_types, bads, 0.0)?;
    let ranks = ProjectionRanks::new(n_grad, n_mag, n_eeg);

    let projs = Python::allow_threads(py, || {
        spatial::compute_proj(&cov_array, &info, ranks, desc_prefix)
    })?;

    projections_to_list(py, projs)
}

/// SSP vectors from a list of epochs
#[pyfunction]
#[pyo3(signature = (
    epochs, ch_names, ch_types, bads, sfreq, tmin, tmax,
    event_id=None, n_grad=2, n_mag=2, n_eeg=2, n_jobs=1
))]
#[allow(clippy::too_many_arguments)]
pub fn compute_proj_epochs<'py>(
    py: Python<'py>,
    epochs: Vec<PyReadonlyArray2<f64>>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    sfreq: f64,
    tmin: f64,
    tmax: f64,
    event_id: Option<BTreeMap<String, i32>>,
    n_grad: usize,
    n_mag: usize,
    n_eeg: usize,
    n_jobs: usize,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let data: Vec<Array2<f64>> = epochs.iter().map(|e| e.as_array().to_owned()).collect();
    let info = channel_info(ch_names, ch_types, bads, sfreq)?;
    let epochs = spatial::Epochs::new(data, info, tmin, tmax, event_id.unwrap_or_default())?;
    let config = ProjectionConfig {
        n_grad,
        n_mag,
        n_eeg,
        n_jobs,
    };

    let projs = Python::allow_threads(py, || spatial::compute_proj_epochs(&epochs, &config))?;

    projections_to_list(py, projs)
}

/// SSP vectors from an evoked response
#[pyfunction]
#[pyo3(signature = (data, times, ch_names, ch_types, bads, sfreq, n_grad=2, n_mag=2, n_eeg=2))]
#[allow(clippy::too_many_arguments)]
pub fn compute_proj_evoked<'py>(
    py: Python<'py>,
    data: PyReadonlyArray2<f64>,
    times: PyReadonlyArray1<f64>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    sfreq: f64,
    n_grad: usize,
    n_mag: usize,
    n_eeg: usize,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let info = channel_info(ch_names, ch_types, bads, sfreq)?;
    let evoked = spatial::Evoked::new(
        data.as_array().to_owned(),
        info,
        times.as_array().to_owned(),
    )?;
    let config = ProjectionConfig {
        n_grad,
        n_mag,
        n_eeg,
        n_jobs: 1,
    };

    let projs = Python::allow_threads(py, || spatial::compute_proj_evoked(&evoked, &config))?;

    projections_to_list(py, projs)
}

/// SSP vectors from a continuous recording
#[pyfunction]
#[pyo3(signature = (
    data, ch_names, ch_types, bads, sfreq,
    start=0.0, stop=None, duration=Some(1.0), n_grad=2, n_mag=2, n_eeg=0,
    reject=None, flat=None, n_jobs=1
))]
#[allow(clippy::too_many_arguments)]
pub fn compute_proj_raw<'py>(
    py: Python<'py>,
    data: PyReadonlyArray2<f64>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    sfreq: f64,
    start: f64,
    stop: Option<f64>,
    duration: Option<f64>,
    n_grad: usize,
    n_mag: usize,
    n_eeg: usize,
    reject: Option<BTreeMap<String, f64>>,
    flat: Option<BTreeMap<String, f64>>,
    n_jobs: usize,
) -> PyResult<Vec<Bound<'py, PyDict>>> {
    let info = channel_info(ch_names, ch_types, bads, sfreq)?;
    let raw = spatial::Raw::new(data.as_array().to_owned(), info)?;
    let config = RawProjectionConfig {
        start,
        stop,
        duration,
        reject: thresholds(reject)?,
        flat: thresholds(flat)?,
        projection: ProjectionConfig {
            n_grad,
            n_mag,
            n_eeg,
            n_jobs,
        },
    };

    let projs = Python::allow_threads(py, || spatial::compute_proj_raw(&raw, &config))?;

    projections_to_list(py, projs)
}

/// Average EEG reference projection over the good EEG channels
#[pyfunction]
pub fn make_eeg_average_ref_proj<'py>(
    py: Python<'py>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
) -> PyResult<Bound<'py, PyDict>> {
    let info = channel_info(ch_names, ch_types, bads, 0.0)?;
    let proj = SvdProjector.make_eeg_average_ref_proj(&info)?;
    projection_to_dict(py, proj)
}

/// Sensitivity map of a free, surface-oriented forward model
///
/// Returns a dict with `data` (one value per location), `vertices`,
/// `subject`, `tmin` and `tstep`.
#[pyfunction]
#[pyo3(signature = (
    gain, ch_names, ch_types, bads, vertices,
    projs=None, ch_type="grad", mode="fixed", exclude=None,
    surf_ori=true, fixed_ori=false, subject=None
))]
#[allow(clippy::too_many_arguments)]
pub fn sensitivity_map<'py>(
    py: Python<'py>,
    gain: PyReadonlyArray2<f64>,
    ch_names: Vec<String>,
    ch_types: Vec<String>,
    bads: Vec<String>,
    vertices: Vec<Vec<usize>>,
    projs: Option<Vec<Bound<'py, PyDict>>>,
    ch_type: &str,
    mode: &str,
    exclude: Option<Bound<'py, PyAny>>,
    surf_ori: bool,
    fixed_ori: bool,
    subject: Option<String>,
) -> PyResult<Bound<'py, PyDict>> {
    // check strings before touching any array
    let config = SensitivityConfig::parse(ch_type, mode, exclude_from_py(exclude.as_ref())?)?;

    let projs = projs
        .map(|list| list.iter().map(projection_from_dict).collect::<PyResult<Vec<_>>>())
        .transpose()?;

    let info = channel_info(ch_names, ch_types, bads, 0.0)?;
    let source_ori = if fixed_ori {
        SourceOrientation::Fixed
    } else {
        SourceOrientation::Free
    };
    // orientation errors take precedence over gain shape errors
    sensitivity::check_orientation(surf_ori, source_ori)?;
    let src = vertices.into_iter().map(SourceSpace::new).collect();
    let fwd = ForwardModel::new(
        gain.as_array().to_owned(),
        info,
        surf_ori,
        source_ori,
        src,
        subject,
    )?;

    let stc = Python::allow_threads(py, || {
        sensitivity::sensitivity_map(&fwd, projs.as_deref(), &config)
    })?;

    let dict = PyDict::new(py);
    dict.set_item("data", stc.data.into_pyarray(py))?;
    dict.set_item("vertices", stc.vertices)?;
    dict.set_item("subject", stc.subject)?;
    dict.set_item("tmin", stc.tmin)?;
    dict.set_item("tstep", stc.tstep)?;
    Ok(dict)
}
