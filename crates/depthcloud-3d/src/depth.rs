//! Depth semantics and the camera-space geometry of a pixel.
//!
//! Camera space follows the computer-vision convention: +X right, +Y down,
//! +Z forward along the optical axis. With `flip_y` the vertical axis points
//! up instead, which is what most game engines expect.

use std::str::FromStr;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraIntrinsics;
use crate::error::ReconstructionError;

/// What a stored depth sample measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSemantics {
    /// Distance along the optical axis (camera-space Z).
    PerspectiveZ,
    /// Straight-line distance from the camera center to the surface.
    EuclideanRange,
}

impl FromStr for DepthSemantics {
    type Err = ReconstructionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z" | "perspective_z" | "perspective-z" | "perspectivez" => Ok(Self::PerspectiveZ),
            "range" | "ray" | "euclidean" | "euclidean_range" | "euclidean-range" => {
                Ok(Self::EuclideanRange)
            }
            "" => Err(ReconstructionError::InvalidDepthSemantics(
                "depth semantics not specified".to_string(),
            )),
            other => Err(ReconstructionError::InvalidDepthSemantics(format!(
                "unknown depth semantics '{other}'"
            ))),
        }
    }
}

/// A unit direction in camera space through a pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray(DVec3);

impl Ray {
    /// The unit direction.
    #[inline]
    pub fn direction(&self) -> DVec3 {
        self.0
    }

    /// The camera-space point at `range` along the ray.
    #[inline]
    pub fn at(&self, range: f64) -> DVec3 {
        self.0 * range
    }
}

/// Norm of the unnormalized ray `[x, y, 1]`.
#[inline]
fn ray_scale(x: f64, y: f64) -> f64 {
    (x * x + y * y + 1.0).sqrt()
}

/// Perspective Z from a Euclidean range at normalized image coordinates `(x, y)`.
///
/// `Z = range / ‖[x, y, 1]‖`
#[inline]
pub fn z_from_range(range: f64, x: f64, y: f64) -> f64 {
    range / ray_scale(x, y)
}

/// Euclidean range from a perspective Z at normalized image coordinates `(x, y)`.
///
/// `range = Z · ‖[x, y, 1]‖`
#[inline]
pub fn range_from_z(z: f64, x: f64, y: f64) -> f64 {
    z * ray_scale(x, y)
}

/// Turns depth samples at pixels into camera-space points and back.
///
/// Holds the two conventions that must stay fixed for a whole frame: what the
/// depth measures and whether camera +Y points up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthInterpreter {
    /// What the depth samples measure.
    pub semantics: DepthSemantics,
    /// Negate the vertical camera axis so that +Y points up.
    pub flip_y: bool,
}

impl DepthInterpreter {
    /// Create a new interpreter.
    pub fn new(semantics: DepthSemantics, flip_y: bool) -> Self {
        Self { semantics, flip_y }
    }

    /// Normalized image coordinates `((u-cx)/fx, ±(v-cy)/fy)` of a pixel.
    #[inline]
    pub fn normalized(&self, intrinsics: &CameraIntrinsics, u: f64, v: f64) -> (f64, f64) {
        let x = (u - intrinsics.cx) / intrinsics.fx;
        let y = (v - intrinsics.cy) / intrinsics.fy;
        if self.flip_y {
            (x, -y)
        } else {
            (x, y)
        }
    }

    /// The unit viewing ray through a pixel.
    pub fn ray(&self, intrinsics: &CameraIntrinsics, u: f64, v: f64) -> Ray {
        let (x, y) = self.normalized(intrinsics, u, v);
        Ray(DVec3::new(x, y, 1.0) / ray_scale(x, y))
    }

    /// Convert a depth sample at a pixel into perspective Z.
    #[inline]
    pub fn z_at(&self, intrinsics: &CameraIntrinsics, u: f64, v: f64, depth: f64) -> f64 {
        match self.semantics {
            DepthSemantics::PerspectiveZ => depth,
            DepthSemantics::EuclideanRange => {
                let (x, y) = self.normalized(intrinsics, u, v);
                z_from_range(depth, x, y)
            }
        }
    }

    /// Convert a perspective Z at a pixel into this interpreter's depth semantics.
    #[inline]
    pub fn depth_from_z(&self, intrinsics: &CameraIntrinsics, u: f64, v: f64, z: f64) -> f64 {
        match self.semantics {
            DepthSemantics::PerspectiveZ => z,
            DepthSemantics::EuclideanRange => {
                let (x, y) = self.normalized(intrinsics, u, v);
                range_from_z(z, x, y)
            }
        }
    }

    /// The camera-space point observed at pixel `(u, v)` with the given depth sample.
    ///
    /// The caller is responsible for rejecting invalid samples first.
    #[inline]
    pub fn camera_point(&self, intrinsics: &CameraIntrinsics, u: f64, v: f64, depth: f64) -> DVec3 {
        match self.semantics {
            DepthSemantics::PerspectiveZ => {
                let (x, y) = self.normalized(intrinsics, u, v);
                DVec3::new(x * depth, y * depth, depth)
            }
            DepthSemantics::EuclideanRange => self.ray(intrinsics, u, v).at(depth),
        }
    }

    /// Project a camera-space point to pixel coordinates.
    ///
    /// Returns `None` for points on or behind the image plane.
    #[inline]
    pub fn project(&self, intrinsics: &CameraIntrinsics, point: &DVec3) -> Option<[f64; 2]> {
        if point.z.is_nan() || point.z <= 0.0 {
            return None;
        }
        let x = point.x / point.z;
        let y = if self.flip_y {
            -point.y / point.z
        } else {
            point.y / point.z
        };
        Some([
            intrinsics.fx * x + intrinsics.cx,
            intrinsics.fy * y + intrinsics.cy,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FieldOfView, PixelCenter};
    use approx::assert_relative_eq;

    fn intrinsics() -> CameraIntrinsics {
        CameraIntrinsics {
            fx: 500.0,
            fy: 500.0,
            cx: 320.0,
            cy: 240.0,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_parse_semantics() {
        assert_eq!("Z".parse::<DepthSemantics>(), Ok(DepthSemantics::PerspectiveZ));
        assert_eq!("ray".parse::<DepthSemantics>(), Ok(DepthSemantics::EuclideanRange));
        assert_eq!(
            " Euclidean_Range ".parse::<DepthSemantics>(),
            Ok(DepthSemantics::EuclideanRange)
        );
        assert!(matches!(
            "disparity".parse::<DepthSemantics>(),
            Err(ReconstructionError::InvalidDepthSemantics(_))
        ));
        assert!(matches!(
            "".parse::<DepthSemantics>(),
            Err(ReconstructionError::InvalidDepthSemantics(_))
        ));
    }

    #[test]
    fn test_depth_conversion_invertible() {
        for &(x, y) in &[(0.0, 0.0), (0.7, -0.3), (-2.5, 4.0), (1e-6, 123.0)] {
            for &d in &[1e-3, 0.5, 10.0, 12345.678] {
                let back = z_from_range(range_from_z(d, x, y), x, y);
                assert_relative_eq!(back, d, max_relative = 1e-9);
                let back = range_from_z(z_from_range(d, x, y), x, y);
                assert_relative_eq!(back, d, max_relative = 1e-9);
            }
        }
    }

    #[test]
    fn test_perspective_z_point() {
        let k = intrinsics();
        let interp = DepthInterpreter::new(DepthSemantics::PerspectiveZ, false);
        let p = interp.camera_point(&k, 420.0, 140.0, 5.0);
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, -1.0);
        assert_relative_eq!(p.z, 5.0);
    }

    #[test]
    fn test_range_point_has_range_norm() {
        let k = intrinsics();
        let interp = DepthInterpreter::new(DepthSemantics::EuclideanRange, false);
        let p = interp.camera_point(&k, 600.0, 20.0, 7.5);
        assert_relative_eq!(p.length(), 7.5, epsilon = 1e-12);

        // same direction as a z-depth point at the same pixel
        let z = DepthInterpreter::new(DepthSemantics::PerspectiveZ, false)
            .camera_point(&k, 600.0, 20.0, p.z);
        assert_relative_eq!(z.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(z.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_is_unit() {
        let k = intrinsics();
        for flip_y in [false, true] {
            let interp = DepthInterpreter::new(DepthSemantics::EuclideanRange, flip_y);
            let ray = interp.ray(&k, 10.0, 470.0);
            assert_relative_eq!(ray.direction().length(), 1.0, epsilon = 1e-12);
            assert_eq!(ray.direction().y > 0.0, !flip_y);
        }
    }

    #[test]
    fn test_center_pixel_on_axis() {
        let k = intrinsics();
        let interp = DepthInterpreter::new(DepthSemantics::EuclideanRange, true);
        let p = interp.camera_point(&k, k.cx, k.cy, 3.0);
        assert_relative_eq!(p.x, 0.0);
        assert_relative_eq!(p.y, 0.0);
        assert_relative_eq!(p.z, 3.0);
    }

    #[test]
    fn test_to_z_and_back() {
        let k = intrinsics();
        let interp = DepthInterpreter::new(DepthSemantics::EuclideanRange, false);
        let z = interp.z_at(&k, 12.0, 400.0, 9.0);
        assert!(z < 9.0);
        assert_relative_eq!(interp.depth_from_z(&k, 12.0, 400.0, z), 9.0, max_relative = 1e-12);
    }

    #[test]
    fn test_project_unproject() -> Result<(), ReconstructionError> {
        let k = CameraIntrinsics::from_fov(
            1280,
            720,
            FieldOfView::Vertical(70.0),
            PixelCenter::HalfPixel,
        )?;
        for semantics in [DepthSemantics::PerspectiveZ, DepthSemantics::EuclideanRange] {
            for flip_y in [false, true] {
                let interp = DepthInterpreter::new(semantics, flip_y);
                let p = interp.camera_point(&k, 17.0, 650.0, 42.0);
                let [u, v] = interp.project(&k, &p).unwrap_or([f64::NAN; 2]);
                assert_relative_eq!(u, 17.0, epsilon = 1e-9);
                assert_relative_eq!(v, 650.0, epsilon = 1e-9);
            }
        }
        Ok(())
    }

    #[test]
    fn test_project_behind_camera() {
        let interp = DepthInterpreter::new(DepthSemantics::PerspectiveZ, false);
        assert_eq!(interp.project(&intrinsics(), &DVec3::new(0.0, 0.0, -1.0)), None);
        assert_eq!(interp.project(&intrinsics(), &DVec3::ZERO), None);
    }
}
