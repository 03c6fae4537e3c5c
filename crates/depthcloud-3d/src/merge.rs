use std::fmt;

use rayon::prelude::*;

use crate::backproject::{back_project, BackProjectOptions};
use crate::config::{CameraConfig, CameraDescriptor};
use crate::error::ReconstructionError;
use crate::image::{ColorImage, DepthImage};
use crate::pointcloud::PointCloud;
use crate::sampling::Subsampler;

/// One captured frame ready for reconstruction.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Identifier used in logs and failure reports.
    pub id: String,
    /// The depth image.
    pub depth: DepthImage,
    /// Optional color image with the depth resolution.
    pub color: Option<ColorImage>,
    /// Raw camera metadata of the frame.
    pub camera: CameraDescriptor,
}

/// A frame that contributed nothing to the merged cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    /// Frame identifier.
    pub id: String,
    /// Human readable cause.
    pub reason: String,
}

/// The outcome of reconstructing a batch of frames.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// All surviving points of all successful frames.
    pub cloud: PointCloud,
    /// Identifiers of the frames merged into `cloud`.
    pub succeeded: Vec<String>,
    /// Frames that were skipped and why.
    pub failures: Vec<FrameFailure>,
}

/// Concatenate point clouds.
///
/// Colors are kept only if every input carries colors and source pixels only
/// if every input carries pixels; otherwise the attribute is dropped for the
/// whole result.
pub fn merge_clouds(clouds: impl IntoIterator<Item = PointCloud>) -> PointCloud {
    let clouds: Vec<PointCloud> = clouds.into_iter().collect();
    if clouds.is_empty() {
        return PointCloud::empty();
    }

    let all_colored = clouds.iter().all(|c| c.colors().is_some());
    let all_pixels = clouds.iter().all(|c| c.pixels().is_some());
    if !all_colored && clouds.iter().any(|c| c.colors().is_some()) {
        log::debug!("dropping colors, not every merged cloud carries them");
    }

    let total = clouds.iter().map(PointCloud::len).sum();
    let mut points = Vec::with_capacity(total);
    let mut colors = all_colored.then(|| Vec::with_capacity(total));
    let mut pixels = all_pixels.then(|| Vec::with_capacity(total));

    for cloud in clouds {
        let (p, c, px) = cloud.into_parts();
        points.extend(p);
        if let (Some(colors), Some(c)) = (colors.as_mut(), c) {
            colors.extend(c);
        }
        if let (Some(pixels), Some(px)) = (pixels.as_mut(), px) {
            pixels.extend(px);
        }
    }

    PointCloud::from_parts(points, colors, pixels)
}

/// Merge per-frame results, skipping the frames that failed.
///
/// Accepts errors of any displayable type so that loaders can report frames
/// they could not read alongside frames that failed reconstruction.
pub fn merge_frame_results<E: fmt::Display>(
    results: impl IntoIterator<Item = (String, Result<PointCloud, E>)>,
) -> BatchReport {
    let mut clouds = Vec::new();
    let mut succeeded = Vec::new();
    let mut failures = Vec::new();

    for (id, result) in results {
        match result {
            Ok(cloud) => {
                log::debug!("frame {id}: {} points", cloud.len());
                succeeded.push(id);
                clouds.push(cloud);
            }
            Err(err) => {
                log::warn!("skipping frame {id}: {err}");
                failures.push(FrameFailure {
                    id,
                    reason: err.to_string(),
                });
            }
        }
    }

    BatchReport {
        cloud: merge_clouds(clouds),
        succeeded,
        failures,
    }
}

/// Reconstruct the world-space cloud of a single frame.
pub fn reconstruct_frame(
    frame: &Frame,
    config: &CameraConfig,
    options: &BackProjectOptions,
) -> Result<PointCloud, ReconstructionError> {
    let (width, height) = frame.depth.dimensions();
    let intrinsics = frame.camera.intrinsics(width, height, config)?;
    let resolved = frame.camera.resolve_pose(config)?;
    log::debug!(
        "frame {}: fx={:.3} cx={:.2} cy={:.2} ortho_err={:.2e} det={:.6}",
        frame.id,
        intrinsics.fx,
        intrinsics.cx,
        intrinsics.cy,
        resolved.diagnostics.ortho_err,
        resolved.diagnostics.determinant
    );

    back_project(
        &frame.depth,
        &intrinsics,
        &resolved.pose,
        &config.interpreter(),
        frame.color.as_ref(),
        options,
    )
}

/// Reconstruct and merge a batch of frames in parallel.
///
/// Each frame is back-projected, optionally subsampled (a random stride gets
/// the base seed plus the frame position) and merged. A frame that fails is
/// logged and listed in [`BatchReport::failures`]; it never aborts the batch.
///
/// # Errors
///
/// Only invalid `options` or `subsampler` parameters, which would fail every
/// frame alike, are reported as an error.
pub fn reconstruct_frames(
    frames: &[Frame],
    config: &CameraConfig,
    options: &BackProjectOptions,
    subsampler: Option<&Subsampler>,
) -> Result<BatchReport, ReconstructionError> {
    options.validate()?;
    if let Some(subsampler) = subsampler {
        subsampler.validate()?;
    }

    let results: Vec<(String, Result<PointCloud, ReconstructionError>)> = frames
        .par_iter()
        .enumerate()
        .map(|(i, frame)| {
            let cloud = reconstruct_frame(frame, config, options).and_then(|cloud| {
                match subsampler {
                    Some(s) => s.with_seed_offset(i as u64).apply(&cloud),
                    None => Ok(cloud),
                }
            });
            (frame.id.clone(), cloud)
        })
        .collect();

    let report = merge_frame_results(results);
    log::debug!(
        "merged {} frames into {} points, {} skipped",
        report.succeeded.len(),
        report.cloud.len(),
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PixelCenter;
    use crate::depth::DepthSemantics;
    use crate::extrinsic::ConventionHypothesis;
    use std::collections::HashSet;

    fn config() -> CameraConfig {
        CameraConfig {
            pixel_center: PixelCenter::HalfPixel,
            depth_semantics: DepthSemantics::PerspectiveZ,
            flip_y: false,
            convention: ConventionHypothesis::CAM_TO_WORLD,
            pose_scale: 1.0,
        }
    }

    fn frame(id: &str, x: f64, fov_v: Option<f64>) -> Result<Frame, ReconstructionError> {
        Ok(Frame {
            id: id.to_string(),
            depth: DepthImage::filled(8, 6, 3.0)?,
            color: None,
            camera: CameraDescriptor {
                extrinsic_cam2world: vec![1.0, 0.0, 0.0, x, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                fov_v_degrees: fov_v,
                fov_h_degrees: None,
            },
        })
    }

    #[test]
    fn test_merge_mixed_colors() -> Result<(), ReconstructionError> {
        let a = PointCloud::new(
            vec![[0.0; 3]; 2],
            Some(vec![[1, 2, 3]; 2]),
            Some(vec![[0, 0]; 2]),
        )?;
        let b = PointCloud::new(vec![[1.0; 3]; 3], None, Some(vec![[1, 1]; 3]))?;
        let merged = merge_clouds([a.clone(), b]);
        assert_eq!(merged.len(), 5);
        assert!(merged.colors().is_none());
        assert_eq!(merged.pixels().map(|p| p.len()), Some(5));

        let merged = merge_clouds([a.clone(), a]);
        assert_eq!(merged.colors().map(|c| c.len()), Some(4));
        Ok(())
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge_clouds(Vec::new()).is_empty());
    }

    #[test]
    fn test_merge_frame_results() -> Result<(), ReconstructionError> {
        let cloud = PointCloud::new(vec![[0.0; 3]; 4], None, None)?;
        let results: Vec<(String, Result<PointCloud, String>)> = vec![
            ("a".to_string(), Ok(cloud.clone())),
            ("b".to_string(), Err("missing camera file".to_string())),
            ("c".to_string(), Ok(cloud)),
        ];
        let report = merge_frame_results(results);
        assert_eq!(report.cloud.len(), 8);
        assert_eq!(report.succeeded, vec!["a", "c"]);
        assert_eq!(
            report.failures,
            vec![FrameFailure {
                id: "b".to_string(),
                reason: "missing camera file".to_string()
            }]
        );
        Ok(())
    }

    #[test]
    fn test_batch_skips_failed_frame() -> Result<(), ReconstructionError> {
        let frames = vec![
            frame("0", 0.0, Some(60.0))?,
            frame("1", 10.0, None)?,
            frame("2", 20.0, Some(60.0))?,
        ];
        let report = reconstruct_frames(&frames, &config(), &BackProjectOptions::default(), None)?;
        assert_eq!(report.cloud.len(), 2 * 48);
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, "1");

        let xs: Vec<f64> = report.cloud.points().iter().map(|p| p[0]).collect();
        assert!(xs.iter().any(|&x| x > 15.0));
        assert!(xs.iter().all(|&x| x < 5.0 || x > 15.0));
        Ok(())
    }

    #[test]
    fn test_batch_seeds_differ_per_frame() -> Result<(), ReconstructionError> {
        let frames = vec![frame("a", 0.0, Some(60.0))?, frame("b", 0.0, Some(60.0))?];
        let subsampler = Subsampler::RandomStride {
            every_nth: 4,
            seed: 11,
        };
        let report = reconstruct_frames(
            &frames,
            &config(),
            &BackProjectOptions::default(),
            Some(&subsampler),
        )?;
        assert_eq!(report.cloud.len(), 24);

        let pixels = report.cloud.pixels().map(|p| p.to_vec()).unwrap_or_default();
        let first: HashSet<_> = pixels[..12].iter().collect();
        let second: HashSet<_> = pixels[12..].iter().collect();
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn test_batch_rejects_bad_options() -> Result<(), ReconstructionError> {
        let frames = vec![frame("a", 0.0, Some(60.0))?];
        let bad = Subsampler::RandomStride {
            every_nth: 0,
            seed: 0,
        };
        let result =
            reconstruct_frames(&frames, &config(), &BackProjectOptions::default(), Some(&bad));
        assert!(matches!(result, Err(ReconstructionError::InvalidParameter(_))));
        Ok(())
    }
}
