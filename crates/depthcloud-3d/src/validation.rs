//! Empirical checks of camera conventions.
//!
//! When two frames see the same surfaces, the right pose convention makes the
//! geometry of one frame land on the depth observed by the other. Scoring all
//! [`ConventionHypothesis`] values this way and sorting by residual picks the
//! convention out of the data instead of guessing it.

use glam::DVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::backproject::{back_project, BackProjectOptions};
use crate::camera::CameraIntrinsics;
use crate::config::CameraConfig;
use crate::depth::DepthInterpreter;
use crate::error::ReconstructionError;
use crate::extrinsic::{CameraPose, ConventionHypothesis};
use crate::image::DepthImage;
use crate::merge::Frame;

/// How observed depth is read at a projected sub-pixel location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthSampling {
    /// Depth of the nearest pixel.
    Nearest,
    /// Bilinear blend of the four neighbours, all of which must be valid.
    Bilinear,
}

impl DepthSampling {
    /// Sample `depth` at `(u, v)`.
    pub fn sample(&self, depth: &DepthImage, u: f64, v: f64) -> Option<f64> {
        match self {
            DepthSampling::Nearest => depth.sample_nearest(u, v),
            DepthSampling::Bilinear => depth.sample_bilinear(u, v),
        }
    }
}

/// Parameters of the cross-frame consistency check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossFrameParams {
    /// Pixel stride used to pick the sparse sample of the source frame.
    pub stride: usize,
    /// A residual is an inlier below this fraction of the observed depth.
    pub rel_threshold: f64,
    /// A residual is an inlier below this absolute depth difference.
    pub abs_threshold: f64,
    /// Inlier ratios below this value are reported in the log.
    pub min_inlier_ratio: f64,
    /// Hypotheses with fewer overlapping samples than this rank as non-overlapping.
    pub min_overlap: usize,
    /// Depth lookup in the target frame.
    pub sampling: DepthSampling,
}

impl Default for CrossFrameParams {
    fn default() -> Self {
        Self {
            stride: 8,
            rel_threshold: 0.05,
            abs_threshold: 0.05,
            min_inlier_ratio: 0.5,
            min_overlap: 16,
            sampling: DepthSampling::Nearest,
        }
    }
}

impl CrossFrameParams {
    fn validate(&self) -> Result<(), ReconstructionError> {
        if self.stride == 0 {
            return Err(ReconstructionError::InvalidParameter(
                "validation stride must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("rel_threshold", self.rel_threshold),
            ("abs_threshold", self.abs_threshold),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ReconstructionError::InvalidParameter(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// One frame as seen by the validation: depth, intrinsics and the raw pose.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// The depth image.
    pub depth: &'a DepthImage,
    /// Intrinsics matching the depth resolution.
    pub intrinsics: CameraIntrinsics,
    /// 12 or 16 raw row-major pose values.
    pub raw_pose: &'a [f64],
}

impl<'a> FrameView<'a> {
    /// Create a view from its parts.
    pub fn new(depth: &'a DepthImage, intrinsics: CameraIntrinsics, raw_pose: &'a [f64]) -> Self {
        Self {
            depth,
            intrinsics,
            raw_pose,
        }
    }

    /// A view of a captured frame, with intrinsics derived from its descriptor.
    pub fn from_frame(
        frame: &'a Frame,
        config: &CameraConfig,
    ) -> Result<Self, ReconstructionError> {
        let (width, height) = frame.depth.dimensions();
        Ok(Self {
            depth: &frame.depth,
            intrinsics: frame.camera.intrinsics(width, height, config)?,
            raw_pose: &frame.camera.extrinsic_cam2world,
        })
    }
}

/// Agreement of one frame's geometry with another frame's observed depth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReprojectionScore {
    /// Valid samples taken from the source frame.
    pub samples: usize,
    /// Samples that projected inside the target frame onto valid depth.
    pub in_view: usize,
    /// In-view samples within the residual thresholds.
    pub inliers: usize,
    /// Root mean square depth residual over the in-view samples.
    pub rmse: Option<f64>,
    /// Mean absolute depth residual over the in-view samples.
    pub mean_abs_error: Option<f64>,
}

impl ReprojectionScore {
    /// Fraction of in-view samples that are inliers.
    pub fn inlier_ratio(&self) -> Option<f64> {
        (self.in_view > 0).then(|| self.inliers as f64 / self.in_view as f64)
    }
}

/// Score how well frame `a` reprojects into frame `b` under `config`.
///
/// Frame `a` is back-projected on a sparse stride grid with the configured
/// convention, moved into the camera of `b`, projected with the intrinsics of
/// `b` and compared against the perspective Z that `b` observed there.
pub fn cross_frame_score(
    a: &FrameView,
    b: &FrameView,
    config: &CameraConfig,
    params: &CrossFrameParams,
) -> Result<ReprojectionScore, ReconstructionError> {
    params.validate()?;
    let pose_a = config.resolve_pose(a.raw_pose)?.pose;
    let pose_b = config.resolve_pose(b.raw_pose)?.pose;
    let interpreter = config.interpreter();

    let options = BackProjectOptions {
        stride: params.stride,
        ..Default::default()
    };
    let cloud = back_project(a.depth, &a.intrinsics, &pose_a, &interpreter, None, &options)?;

    let mut score = ReprojectionScore {
        samples: cloud.len(),
        ..Default::default()
    };
    let (mut sum_sq, mut sum_abs) = (0.0, 0.0);

    for point in cloud.points() {
        let p_b = pose_b.world_to_camera(&DVec3::from_array(*point));
        let Some([u, v]) = interpreter.project(&b.intrinsics, &p_b) else {
            continue;
        };
        let Some(observed) = params.sampling.sample(b.depth, u, v) else {
            continue;
        };
        let z_obs = interpreter.z_at(&b.intrinsics, u, v, observed);
        let dz = (p_b.z - z_obs).abs();

        score.in_view += 1;
        sum_sq += dz * dz;
        sum_abs += dz;
        if dz < params.abs_threshold || dz / z_obs < params.rel_threshold {
            score.inliers += 1;
        }
    }

    if score.in_view > 0 {
        let n = score.in_view as f64;
        score.rmse = Some((sum_sq / n).sqrt());
        score.mean_abs_error = Some(sum_abs / n);
    }

    match score.inlier_ratio() {
        Some(ratio) if ratio < params.min_inlier_ratio => log::warn!(
            "[{}] low inlier ratio {:.3} ({} of {} in view)",
            config.convention,
            ratio,
            score.inliers,
            score.in_view
        ),
        None => log::warn!("[{}] no overlap between frames", config.convention),
        _ => log::debug!(
            "[{}] rmse={:.4} inliers={}/{}",
            config.convention,
            score.rmse.unwrap_or(f64::NAN),
            score.inliers,
            score.in_view
        ),
    }

    Ok(score)
}

/// The score of one hypothesis, or why it could not be scored.
#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisScore {
    /// The hypothesis.
    pub hypothesis: ConventionHypothesis,
    /// Its score, or the error raised while resolving poses.
    pub outcome: Result<ReprojectionScore, ReconstructionError>,
}

impl HypothesisScore {
    /// The RMSE if the hypothesis was scored with overlap.
    pub fn rmse(&self) -> Option<f64> {
        self.outcome.as_ref().ok().and_then(|s| s.rmse)
    }

    fn tier(&self, min_overlap: usize) -> u8 {
        match &self.outcome {
            Ok(s) if s.rmse.is_some() && s.in_view >= min_overlap => 0,
            Ok(_) => 1,
            Err(_) => 2,
        }
    }
}

/// Score every hypothesis and sort them best first.
///
/// Hypotheses are ordered by ascending RMSE. Those without enough overlap
/// come next, followed by those whose poses could not be resolved. Ties keep
/// the input order. Picking a winner, or refusing to when the top scores are
/// close, is left to the caller.
pub fn rank_hypotheses(
    a: &FrameView,
    b: &FrameView,
    config: &CameraConfig,
    hypotheses: &[ConventionHypothesis],
    params: &CrossFrameParams,
) -> Vec<HypothesisScore> {
    let mut scores: Vec<HypothesisScore> = hypotheses
        .par_iter()
        .map(|hypothesis| HypothesisScore {
            hypothesis: *hypothesis,
            outcome: cross_frame_score(a, b, &config.with_convention(*hypothesis), params),
        })
        .collect();

    scores.sort_by(|x, y| {
        x.tier(params.min_overlap)
            .cmp(&y.tier(params.min_overlap))
            .then_with(|| {
                let rx = x.rmse().unwrap_or(f64::INFINITY);
                let ry = y.rmse().unwrap_or(f64::INFINITY);
                rx.total_cmp(&ry)
            })
    });
    scores
}

/// Mean pixel distance between each back-projected sample and the pixel it
/// reprojects to in its own camera.
///
/// A sanity check of the intrinsics, depth semantics and pose inverse. Returns
/// `None` when the frame has no valid sample on the stride grid.
pub fn same_frame_reprojection_error(
    depth: &DepthImage,
    intrinsics: &CameraIntrinsics,
    pose: &CameraPose,
    interpreter: &DepthInterpreter,
    stride: usize,
) -> Result<Option<f64>, ReconstructionError> {
    let options = BackProjectOptions {
        stride,
        ..Default::default()
    };
    let cloud = back_project(depth, intrinsics, pose, interpreter, None, &options)?;
    if cloud.is_empty() {
        return Ok(None);
    }

    let total: f64 = cloud
        .iter()
        .filter_map(|p| {
            let [u, v] = p.pixel?;
            let p_cam = pose.world_to_camera(&DVec3::from_array(p.position));
            let Some([pu, pv]) = interpreter.project(intrinsics, &p_cam) else {
                return Some(f64::INFINITY);
            };
            Some(((pu - u as f64).powi(2) + (pv - v as f64).powi(2)).sqrt())
        })
        .sum();

    Ok(Some(total / cloud.len() as f64))
}
