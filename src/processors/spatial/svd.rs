// src/processors/spatial/svd.rs

use ndarray::{s, Array1, Array2, ArrayBase, Data, Ix2};
use ndarray_linalg::SVD;

use crate::error::{Result, SspError};

/// Left singular vectors and singular values of `a`, economy sized
///
/// Columns of the returned `U` follow LAPACK's ordering by descending
/// singular value; only the first `min(m, n)` are kept.
pub(crate) fn left_singular_vectors<S>(a: &ArrayBase<S, Ix2>) -> Result<(Array2<f64>, Array1<f64>)>
where
    S: Data<Elem = f64>,
{
    let (u, sigma, _) = a.svd(true, false)?;
    let u = u.ok_or(SspError::MissingSingularVectors)?;
    let k = sigma.len();
    Ok((u.slice(s![.., ..k]).to_owned(), sigma))
}

/// Singular values only, in descending order
pub(crate) fn singular_values<S>(a: &ArrayBase<S, Ix2>) -> Result<Array1<f64>>
where
    S: Data<Elem = f64>,
{
    let (_, sigma, _) = a.svd(false, false)?;
    Ok(sigma)
}
