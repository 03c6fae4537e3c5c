use serde::{Deserialize, Serialize};

use crate::camera::{CameraIntrinsics, FieldOfView, PixelCenter};
use crate::depth::{DepthInterpreter, DepthSemantics};
use crate::error::ReconstructionError;
use crate::extrinsic::{
    resolve_extrinsic, ConventionHypothesis, EngineAxes, EulerPose, ResolvedPose,
};

/// The conventions used to interpret every frame of a capture.
///
/// Every field changes the reconstructed geometry, so none of them has a
/// default value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Principal point convention.
    pub pixel_center: PixelCenter,
    /// What the depth samples measure.
    pub depth_semantics: DepthSemantics,
    /// Negate camera Y so that +Y points up.
    pub flip_y: bool,
    /// How to read the raw pose matrices.
    pub convention: ConventionHypothesis,
    /// Multiplier applied to pose translations to bring them into depth units.
    pub pose_scale: f64,
}

impl CameraConfig {
    /// The depth interpreter for this configuration.
    pub fn interpreter(&self) -> DepthInterpreter {
        DepthInterpreter::new(self.depth_semantics, self.flip_y)
    }

    /// Resolve raw pose values under the configured convention and translation scale.
    pub fn resolve_pose(&self, raw: &[f64]) -> Result<ResolvedPose, ReconstructionError> {
        let mut resolved = resolve_extrinsic(raw, &self.convention)?;
        if self.pose_scale != 1.0 {
            resolved.pose = resolved.pose.with_translation_scale(self.pose_scale)?;
        }
        Ok(resolved)
    }

    /// A copy of the configuration with a different pose convention.
    pub fn with_convention(&self, convention: ConventionHypothesis) -> Self {
        Self {
            convention,
            ..*self
        }
    }
}

/// The camera metadata recorded next to each captured frame.
///
/// Field names match the capture JSON, e.g.
///
/// ```json
/// { "extrinsic_cam2world": [1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0], "fov_v_degrees": 60.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// 12 or 16 row-major pose values. Despite the name the convention is not
    /// trusted and is decided by [`CameraConfig::convention`].
    pub extrinsic_cam2world: Vec<f64>,
    /// Vertical field of view in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov_v_degrees: Option<f64>,
    /// Horizontal field of view in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fov_h_degrees: Option<f64>,
}

impl CameraDescriptor {
    /// Build a descriptor from an engine location and rotator.
    pub fn from_euler(
        pose: &EulerPose,
        axes: EngineAxes,
        fov_v_degrees: Option<f64>,
        fov_h_degrees: Option<f64>,
    ) -> Self {
        Self {
            extrinsic_cam2world: pose.to_raw_matrix(axes).to_vec(),
            fov_v_degrees,
            fov_h_degrees,
        }
    }

    /// The field of view carried by the descriptor.
    pub fn field_of_view(&self) -> Result<FieldOfView, ReconstructionError> {
        FieldOfView::from_options(self.fov_v_degrees, self.fov_h_degrees)
    }

    /// Camera intrinsics for a frame of the given resolution.
    pub fn intrinsics(
        &self,
        width: usize,
        height: usize,
        config: &CameraConfig,
    ) -> Result<CameraIntrinsics, ReconstructionError> {
        CameraIntrinsics::from_fov(width, height, self.field_of_view()?, config.pixel_center)
    }

    /// Resolve the pose under the configured convention and translation scale.
    pub fn resolve_pose(&self, config: &CameraConfig) -> Result<ResolvedPose, ReconstructionError> {
        config.resolve_pose(&self.extrinsic_cam2world)
    }
}
