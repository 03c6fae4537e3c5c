//! Homogeneous 4x4 transforms stored as `glam` double precision matrices.
//!
//! Poses arrive from capture tools as flat row-major lists of 12 (`[R | t]`) or
//! 16 numbers. `glam` stores matrices column-major, so every conversion in and
//! out of a flat list goes through this module.

use glam::{DMat3, DMat4, DVec3, DVec4};
use thiserror::Error;

/// Absolute determinant below which a matrix is treated as singular.
pub const SINGULAR_EPS: f64 = 1e-12;

/// Error type for the homogeneous matrix helpers.
#[derive(Debug, Error, PartialEq)]
pub enum LinalgError {
    /// The matrix has no usable inverse.
    #[error("Matrix is singular or non-finite (determinant {0})")]
    Singular(f64),

    /// A flat matrix did not have 12 or 16 entries.
    #[error("Expected 12 or 16 matrix entries, got {0}")]
    InvalidLength(usize),
}

/// Build a 4x4 matrix from 12 (3x4) or 16 (4x4) row-major values.
///
/// A 3x4 input is padded with the `[0, 0, 0, 1]` row.
///
/// Example:
///
/// ```
/// use depthcloud_linalg::homogeneous::mat4_from_row_major;
///
/// let m = mat4_from_row_major(&[
///     1.0, 0.0, 0.0, 5.0,
///     0.0, 1.0, 0.0, 6.0,
///     0.0, 0.0, 1.0, 7.0,
/// ])?;
/// assert_eq!(m.w_axis.x, 5.0);
/// assert_eq!(m.w_axis.w, 1.0);
/// # Ok::<(), depthcloud_linalg::homogeneous::LinalgError>(())
/// ```
pub fn mat4_from_row_major(values: &[f64]) -> Result<DMat4, LinalgError> {
    let last_row = match values.len() {
        12 => [0.0, 0.0, 0.0, 1.0],
        16 => [values[12], values[13], values[14], values[15]],
        n => return Err(LinalgError::InvalidLength(n)),
    };

    let row = |r: usize| {
        DVec4::new(
            values[4 * r],
            values[4 * r + 1],
            values[4 * r + 2],
            values[4 * r + 3],
        )
    };

    // rows are assembled as columns, then transposed into glam's column-major layout
    Ok(DMat4::from_cols(row(0), row(1), row(2), DVec4::from_array(last_row)).transpose())
}

/// Flatten a 4x4 matrix into 16 row-major values.
pub fn mat4_to_row_major(m: &DMat4) -> [f64; 16] {
    m.transpose().to_cols_array()
}

/// Compose a homogeneous transform from a rotation block and a translation column.
pub fn compose(rotation: &DMat3, translation: &DVec3) -> DMat4 {
    DMat4::from_cols(
        rotation.x_axis.extend(0.0),
        rotation.y_axis.extend(0.0),
        rotation.z_axis.extend(0.0),
        translation.extend(1.0),
    )
}

/// Split a homogeneous transform into its rotation block and translation column.
///
/// The bottom row is ignored.
pub fn decompose(m: &DMat4) -> (DMat3, DVec3) {
    (DMat3::from_mat4(*m), m.w_axis.truncate())
}

/// Invert a general 4x4 matrix, reporting singular or non-finite inputs.
///
/// The full inverse is computed rather than the rigid shortcut `[Rᵀ | -Rᵀt]`
/// so that scaled or sheared poses are still inverted exactly.
pub fn try_inverse(m: &DMat4) -> Result<DMat4, LinalgError> {
    let det = m.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_EPS {
        return Err(LinalgError::Singular(det));
    }

    let inv = m.inverse();
    if !inv.is_finite() {
        return Err(LinalgError::Singular(det));
    }

    Ok(inv)
}

/// Apply a homogeneous transform to a 3D point, dividing by `w` when it is not 1.
#[inline]
pub fn transform_point(m: &DMat4, point: &DVec3) -> DVec3 {
    let p = *m * point.extend(1.0);
    if p.w == 1.0 || p.w == 0.0 {
        p.truncate()
    } else {
        p.truncate() / p.w
    }
}
