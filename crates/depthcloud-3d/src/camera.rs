use glam::DMat3;
use serde::{Deserialize, Serialize};

use crate::error::ReconstructionError;

/// Where pixel centers sit relative to integer pixel coordinates.
///
/// The choice moves the principal point by half a pixel, which matters for
/// reprojection at grazing angles, so it is always supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelCenter {
    /// Pixel centers at integer + 0.5; principal point `((W-1)/2, (H-1)/2)`.
    HalfPixel,
    /// Principal point at the geometric image center `(W/2, H/2)`.
    ImageCenter,
}

impl PixelCenter {
    /// The principal point for an image of the given size.
    pub fn principal_point(&self, width: usize, height: usize) -> (f64, f64) {
        let (w, h) = (width as f64, height as f64);
        match self {
            PixelCenter::HalfPixel => ((w - 1.0) / 2.0, (h - 1.0) / 2.0),
            PixelCenter::ImageCenter => (w / 2.0, h / 2.0),
        }
    }
}

/// How to reconcile a vertical and a horizontal field of view given together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FovRule {
    /// Use the vertical value and ignore the horizontal one.
    PreferVertical,
    /// Use the horizontal value and ignore the vertical one.
    PreferHorizontal,
    /// Use the vertical value, failing unless the horizontal one agrees within
    /// `tolerance_deg` after conversion.
    CrossCheck {
        /// Maximum allowed disagreement in degrees, finite and non-negative.
        tolerance_deg: f64,
    },
}

/// Field of view specification in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOfView {
    /// Vertical field of view.
    Vertical(f64),
    /// Horizontal field of view.
    Horizontal(f64),
    /// Both values with an explicit rule deciding between them.
    Both {
        /// Vertical field of view.
        vertical: f64,
        /// Horizontal field of view.
        horizontal: f64,
        /// Resolution rule.
        rule: FovRule,
    },
}

impl FieldOfView {
    /// Build a field of view from the optional values of a camera descriptor.
    ///
    /// Exactly one value must be present; two values need an explicit rule and
    /// must go through [`FieldOfView::Both`] instead.
    pub fn from_options(
        vertical: Option<f64>,
        horizontal: Option<f64>,
    ) -> Result<Self, ReconstructionError> {
        match (vertical, horizontal) {
            (Some(v), None) => Ok(FieldOfView::Vertical(v)),
            (None, Some(h)) => Ok(FieldOfView::Horizontal(h)),
            (None, None) => Err(ReconstructionError::InvalidFov(
                "neither vertical nor horizontal field of view given".to_string(),
            )),
            (Some(_), Some(_)) => Err(ReconstructionError::InvalidFov(
                "both vertical and horizontal field of view given without a resolution rule"
                    .to_string(),
            )),
        }
    }

    /// Resolve to the vertical field of view in degrees for the given image size.
    pub fn vertical_degrees(
        &self,
        width: usize,
        height: usize,
    ) -> Result<f64, ReconstructionError> {
        match *self {
            FieldOfView::Vertical(v) => check_fov(v, "vertical"),
            FieldOfView::Horizontal(h) => {
                Ok(fov_v_from_h(check_fov(h, "horizontal")?, width, height))
            }
            FieldOfView::Both {
                vertical,
                horizontal,
                rule,
            } => {
                let vertical = check_fov(vertical, "vertical")?;
                let horizontal = check_fov(horizontal, "horizontal")?;
                match rule {
                    FovRule::PreferVertical => Ok(vertical),
                    FovRule::PreferHorizontal => Ok(fov_v_from_h(horizontal, width, height)),
                    FovRule::CrossCheck { tolerance_deg } => {
                        if !tolerance_deg.is_finite() || tolerance_deg < 0.0 {
                            return Err(ReconstructionError::InvalidFov(format!(
                                "cross-check tolerance must be finite and non-negative, \
                                 got {tolerance_deg}"
                            )));
                        }
                        let derived = fov_v_from_h(horizontal, width, height);
                        if (derived - vertical).abs() > tolerance_deg {
                            return Err(ReconstructionError::InvalidFov(format!(
                                "vertical fov {vertical} disagrees with {derived} derived \
                                 from horizontal fov {horizontal}"
                            )));
                        }
                        Ok(vertical)
                    }
                }
            }
        }
    }
}

fn check_fov(degrees: f64, which: &str) -> Result<f64, ReconstructionError> {
    if degrees.is_finite() && degrees > 0.0 && degrees < 180.0 {
        Ok(degrees)
    } else {
        Err(ReconstructionError::InvalidFov(format!(
            "{which} fov must be in (0, 180) degrees, got {degrees}"
        )))
    }
}

/// Vertical field of view from a horizontal one, both in degrees.
///
/// `fov_v = 2·atan(tan(fov_h/2)·H/W)`
pub fn fov_v_from_h(fov_h_degrees: f64, width: usize, height: usize) -> f64 {
    let half = (fov_h_degrees.to_radians() / 2.0).tan() * (height as f64 / width as f64);
    (2.0 * half.atan()).to_degrees()
}

/// Horizontal field of view from a vertical one, both in degrees.
///
/// `fov_h = 2·atan(tan(fov_v/2)·W/H)`
pub fn fov_h_from_v(fov_v_degrees: f64, width: usize, height: usize) -> f64 {
    let half = (fov_v_degrees.to_radians() / 2.0).tan() * (width as f64 / height as f64);
    (2.0 * half.atan()).to_degrees()
}

/// The intrinsic parameters of a square-pixel pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length along x in pixels.
    pub fx: f64,
    /// Focal length along y in pixels.
    pub fy: f64,
    /// Principal point x in pixels.
    pub cx: f64,
    /// Principal point y in pixels.
    pub cy: f64,
    /// Image width the intrinsics were derived for.
    pub width: usize,
    /// Image height the intrinsics were derived for.
    pub height: usize,
}

impl CameraIntrinsics {
    /// Derive the intrinsics from a field of view and the image resolution.
    ///
    /// `fy = (H/2) / tan(fov_v/2)` and, since pixels are square,
    /// `fx = (W/2) / tan(fov_h/2)` with `fov_h` derived from `fov_v`, which
    /// evaluates to the same focal length as `fy`.
    ///
    /// Example:
    ///
    /// ```
    /// use depthcloud_3d::camera::{CameraIntrinsics, FieldOfView, PixelCenter};
    ///
    /// let k = CameraIntrinsics::from_fov(
    ///     640,
    ///     480,
    ///     FieldOfView::Vertical(90.0),
    ///     PixelCenter::ImageCenter,
    /// )?;
    /// assert!((k.fy - 240.0).abs() < 1e-9);
    /// assert_eq!((k.cx, k.cy), (320.0, 240.0));
    /// # Ok::<(), depthcloud_3d::ReconstructionError>(())
    /// ```
    pub fn from_fov(
        width: usize,
        height: usize,
        fov: FieldOfView,
        pixel_center: PixelCenter,
    ) -> Result<Self, ReconstructionError> {
        if width == 0 || height == 0 {
            return Err(ReconstructionError::shape_mismatch(
                "camera resolution",
                "non-zero width and height",
                format!("{width}x{height}"),
            ));
        }

        let fov_v = fov.vertical_degrees(width, height)?;
        let fov_h = fov_h_from_v(fov_v, width, height);

        let fy = (height as f64 / 2.0) / (fov_v.to_radians() / 2.0).tan();
        let fx = (width as f64 / 2.0) / (fov_h.to_radians() / 2.0).tan();
        let (cx, cy) = pixel_center.principal_point(width, height);

        Ok(Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        })
    }

    /// The 3x3 camera matrix `K`.
    pub fn camera_matrix(&self) -> DMat3 {
        // glam is column-major: columns are (fx,0,0), (0,fy,0), (cx,cy,1)
        DMat3::from_cols_array(&[self.fx, 0.0, 0.0, 0.0, self.fy, 0.0, self.cx, self.cy, 1.0])
    }

    /// Vertical field of view in degrees.
    pub fn fov_vertical_degrees(&self) -> f64 {
        (2.0 * (self.height as f64 / (2.0 * self.fy)).atan()).to_degrees()
    }

    /// Horizontal field of view in degrees.
    pub fn fov_horizontal_degrees(&self) -> f64 {
        (2.0 * (self.width as f64 / (2.0 * self.fx)).atan()).to_degrees()
    }

    /// Image dimensions as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}
