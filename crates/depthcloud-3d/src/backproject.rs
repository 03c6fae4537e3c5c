use rayon::prelude::*;

use crate::camera::CameraIntrinsics;
use crate::depth::DepthInterpreter;
use crate::error::ReconstructionError;
use crate::extrinsic::CameraPose;
use crate::image::{is_valid_depth, ColorImage, DepthImage};
use crate::pointcloud::PointCloud;

/// Tuning for a back-projection run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackProjectOptions {
    /// Visit every `stride`-th pixel along both axes.
    pub stride: usize,
    /// Drop samples below this depth.
    pub min_range: Option<f64>,
    /// Drop samples at or above this depth.
    pub max_range: Option<f64>,
}

impl Default for BackProjectOptions {
    fn default() -> Self {
        Self {
            stride: 1,
            min_range: None,
            max_range: None,
        }
    }
}

impl BackProjectOptions {
    /// Check the stride and the clipping interval.
    pub fn validate(&self) -> Result<(), ReconstructionError> {
        if self.stride == 0 {
            return Err(ReconstructionError::InvalidParameter(
                "stride must be at least 1".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_range, self.max_range) {
            if min.is_nan() || max.is_nan() || min >= max {
                return Err(ReconstructionError::InvalidParameter(format!(
                    "min_range {min} must be below max_range {max}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn keeps(&self, depth: f64) -> bool {
        is_valid_depth(depth)
            && self.min_range.map_or(true, |min| depth >= min)
            && self.max_range.map_or(true, |max| depth < max)
    }
}

/// Back-project a depth image into a world-space point cloud.
///
/// Each valid sample on the stride grid becomes one point, in row-major
/// order, carrying its source pixel and, when `color` is given, the color of
/// the same pixel. A frame without valid samples yields an empty cloud.
///
/// # Arguments
///
/// * `depth` - The depth image.
/// * `intrinsics` - Intrinsics derived for the depth resolution.
/// * `pose` - The camera-to-world pose of the frame.
/// * `interpreter` - Depth semantics and vertical axis convention.
/// * `color` - Optional color image aligned with the depth image.
/// * `options` - Stride and depth clipping.
///
/// # Errors
///
/// [`ReconstructionError::ShapeMismatch`] when the intrinsics or the color
/// image do not match the depth resolution, and
/// [`ReconstructionError::InvalidParameter`] for a zero stride or an empty
/// clipping interval.
pub fn back_project(
    depth: &DepthImage,
    intrinsics: &CameraIntrinsics,
    pose: &CameraPose,
    interpreter: &DepthInterpreter,
    color: Option<&ColorImage>,
    options: &BackProjectOptions,
) -> Result<PointCloud, ReconstructionError> {
    options.validate()?;

    let (width, height) = depth.dimensions();
    if intrinsics.dimensions() != depth.dimensions() {
        return Err(ReconstructionError::shape_mismatch(
            "intrinsics resolution",
            format!("{width}x{height}"),
            format!("{}x{}", intrinsics.width, intrinsics.height),
        ));
    }
    if let Some(color) = color {
        if color.dimensions() != depth.dimensions() {
            let (cw, ch) = color.dimensions();
            return Err(ReconstructionError::shape_mismatch(
                "color image",
                format!("{width}x{height}"),
                format!("{cw}x{ch}"),
            ));
        }
    }

    let rows: Vec<usize> = (0..height).step_by(options.stride).collect();
    let per_row: Vec<Vec<([f64; 3], [u32; 2])>> = rows
        .par_iter()
        .map(|&v| {
            let row = depth.row(v);
            (0..width)
                .step_by(options.stride)
                .filter(|&u| options.keeps(row[u]))
                .map(|u| {
                    let p_cam = interpreter.camera_point(intrinsics, u as f64, v as f64, row[u]);
                    let p_world = pose.camera_to_world(&p_cam);
                    (p_world.to_array(), [u as u32, v as u32])
                })
                .collect()
        })
        .collect();

    let (points, pixels): (Vec<_>, Vec<_>) = per_row.into_iter().flatten().unzip();
    let colors = color.map(|color| {
        let rgb = color.as_slice();
        pixels
            .iter()
            .map(|&[u, v]| rgb[v as usize * width + u as usize])
            .collect::<Vec<_>>()
    });

    log::debug!(
        "back-projected {} of {} pixels (stride {})",
        points.len(),
        width * height,
        options.stride
    );

    PointCloud::new(points, colors, Some(pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{FieldOfView, PixelCenter};
    use crate::depth::DepthSemantics;
    use approx::assert_relative_eq;
    use glam::{DMat3, DVec3};

    fn z_interpreter() -> DepthInterpreter {
        DepthInterpreter::new(DepthSemantics::PerspectiveZ, false)
    }

    #[test]
    fn test_flat_wall() -> Result<(), ReconstructionError> {
        let (w, h) = (1920, 1080);
        let depth = DepthImage::filled(w, h, 10.0)?;
        let k =
            CameraIntrinsics::from_fov(w, h, FieldOfView::Vertical(60.0), PixelCenter::HalfPixel)?;
        let cloud = back_project(
            &depth,
            &k,
            &CameraPose::identity(),
            &z_interpreter(),
            None,
            &BackProjectOptions::default(),
        )?;
        assert_eq!(cloud.len(), w * h);

        let half_h = 10.0 * 30f64.to_radians().tan();
        let half_w = half_h * w as f64 / h as f64;
        for p in cloud.points() {
            assert_relative_eq!(p[2], 10.0);
            assert!(p[0].abs() <= half_w + 1e-9);
            assert!(p[1].abs() <= half_h + 1e-9);
        }

        // the extreme pixels reach the frustum edges within one pixel footprint
        let footprint = 10.0 / k.fx;
        let (min, max) = (cloud.min_bound(), cloud.max_bound());
        assert_relative_eq!(min.x, -half_w, epsilon = footprint);
        assert_relative_eq!(max.x, half_w, epsilon = footprint);
        assert_relative_eq!(min.y, -half_h, epsilon = footprint);
        assert_relative_eq!(max.y, half_h, epsilon = footprint);
        assert!(cloud.colors().is_none());
        Ok(())
    }

    #[test]
    fn test_invalid_samples_skipped() -> Result<(), ReconstructionError> {
        let depth = DepthImage::new(
            3,
            2,
            vec![1.0, f64::NAN, 0.0, -2.0, f64::INFINITY, 4.0],
        )?;
        let k =
            CameraIntrinsics::from_fov(3, 2, FieldOfView::Vertical(90.0), PixelCenter::HalfPixel)?;
        let cloud = back_project(
            &depth,
            &k,
            &CameraPose::identity(),
            &z_interpreter(),
            None,
            &BackProjectOptions::default(),
        )?;
        assert_eq!(cloud.len(), 2);
        assert_eq!(cloud.pixels(), Some(&[[0, 0], [2, 1]][..]));
        assert!(cloud.points().iter().all(|p| p.iter().all(|c| c.is_finite())));
        Ok(())
    }

    #[test]
    fn test_all_invalid_is_empty() -> Result<(), ReconstructionError> {
        let depth = DepthImage::filled(4, 4, f64::NAN)?;
        let k =
            CameraIntrinsics::from_fov(4, 4, FieldOfView::Vertical(90.0), PixelCenter::HalfPixel)?;
        let cloud = back_project(
            &depth,
            &k,
            &CameraPose::identity(),
            &z_interpreter(),
            None,
            &BackProjectOptions::default(),
        )?;
        assert!(cloud.is_empty());
        Ok(())
    }

    #[test]
    fn test_range_depth_and_pose() -> Result<(), ReconstructionError> {
        let (w, h) = (64, 48);
        let depth = DepthImage::filled(w, h, 5.0)?;
        let k = CameraIntrinsics::from_fov(
            w,
            h,
            FieldOfView::Vertical(75.0),
            PixelCenter::ImageCenter,
        )?;
        let center = DVec3::new(1.0, -2.0, 30.0);
        let pose = CameraPose::from_rotation_translation(&DMat3::from_rotation_y(1.1), &center)?;
        let interpreter = DepthInterpreter::new(DepthSemantics::EuclideanRange, true);
        let options = BackProjectOptions::default();
        let cloud = back_project(&depth, &k, &pose, &interpreter, None, &options)?;
        for p in cloud.points() {
            assert_relative_eq!(DVec3::from_array(*p).distance(center), 5.0, epsilon = 1e-9);
        }
        Ok(())
    }

    #[test]
    fn test_colors_follow_pixels() -> Result<(), ReconstructionError> {
        let (w, h) = (5, 4);
        let mut depth = DepthImage::filled(w, h, 2.0)?;
        if let Some(d) = depth.get_mut(2, 2) {
            *d = 0.0;
        }
        let rgb = (0..w * h).map(|i| [i as u8, 0, 255]).collect();
        let color = ColorImage::new(w, h, rgb)?;
        let k =
            CameraIntrinsics::from_fov(w, h, FieldOfView::Vertical(60.0), PixelCenter::HalfPixel)?;
        let options = BackProjectOptions {
            stride: 2,
            ..Default::default()
        };
        let cloud = back_project(
            &depth,
            &k,
            &CameraPose::identity(),
            &z_interpreter(),
            Some(&color),
            &options,
        )?;
        // 3 columns x 2 rows on the stride grid, minus the hole at (2, 2)
        assert_eq!(cloud.len(), 5);
        let pixels: Vec<[u32; 2]> = cloud.iter().filter_map(|p| p.pixel).collect();
        assert_eq!(pixels, vec![[0, 0], [2, 0], [4, 0], [0, 2], [4, 2]]);
        for p in cloud.iter() {
            let [u, v] = p.pixel.unwrap_or_default();
            assert_eq!(p.color, Some([(v as usize * w + u as usize) as u8, 0, 255]));
        }
        Ok(())
    }

    #[test]
    fn test_range_clipping() -> Result<(), ReconstructionError> {
        let depth = DepthImage::new(4, 1, vec![0.1, 1.0, 5.0, 50.0])?;
        let k = CameraIntrinsics::from_fov(
            4,
            1,
            FieldOfView::Horizontal(90.0),
            PixelCenter::HalfPixel,
        )?;
        let options = BackProjectOptions {
            stride: 1,
            min_range: Some(0.2),
            max_range: Some(50.0),
        };
        let cloud = back_project(
            &depth,
            &k,
            &CameraPose::identity(),
            &z_interpreter(),
            None,
            &options,
        )?;
        assert_eq!(cloud.pixels(), Some(&[[1, 0], [2, 0]][..]));
        Ok(())
    }

    #[test]
    fn test_shape_errors() -> Result<(), ReconstructionError> {
        let depth = DepthImage::filled(8, 6, 1.0)?;
        let k =
            CameraIntrinsics::from_fov(8, 6, FieldOfView::Vertical(60.0), PixelCenter::HalfPixel)?;
        let pose = CameraPose::identity();
        let options = BackProjectOptions::default();

        let k_other = CameraIntrinsics::from_fov(
            16,
            12,
            FieldOfView::Vertical(60.0),
            PixelCenter::HalfPixel,
        )?;
        assert!(matches!(
            back_project(&depth, &k_other, &pose, &z_interpreter(), None, &options),
            Err(ReconstructionError::ShapeMismatch { .. })
        ));

        let color = ColorImage::new(4, 3, vec![[0; 3]; 12])?;
        assert!(matches!(
            back_project(&depth, &k, &pose, &z_interpreter(), Some(&color), &options),
            Err(ReconstructionError::ShapeMismatch { .. })
        ));

        let zero_stride = BackProjectOptions {
            stride: 0,
            ..options
        };
        assert!(matches!(
            back_project(&depth, &k, &pose, &z_interpreter(), None, &zero_stride),
            Err(ReconstructionError::InvalidParameter(_))
        ));
        Ok(())
    }
}
