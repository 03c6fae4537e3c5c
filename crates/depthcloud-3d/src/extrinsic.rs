//! Camera pose conventions.
//!
//! Capture tools hand over a raw 3x4 or 4x4 pose whose meaning is not
//! documented: it may map camera to world or world to camera, its rotation
//! block may be stored transposed, and the camera axes may follow a different
//! handedness. A [`ConventionHypothesis`] names one interpretation; resolving
//! raw numbers under it yields a [`CameraPose`] plus diagnostics. Which
//! hypothesis is right is decided empirically, see [`crate::validation`].

use std::fmt;

use depthcloud_linalg::homogeneous::{
    compose, decompose, mat4_from_row_major, transform_point, try_inverse,
};
use depthcloud_linalg::rigid::{rotation_from_roll_pitch_yaw_degrees, RotationDiagnostics};
use glam::{DMat3, DMat4, DVec3, DVec4};
use serde::{Deserialize, Serialize};

use crate::error::ReconstructionError;

/// Which way the raw pose maps points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseDirection {
    /// The raw matrix maps camera coordinates to world coordinates.
    CamToWorld,
    /// The raw matrix maps world coordinates to camera coordinates.
    WorldToCam,
}

/// How the rotation block of the raw pose is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationLayout {
    /// Use the rotation block as stored.
    AsGiven,
    /// The rotation block is stored transposed (column-major writer).
    Transposed,
}

/// Sign flips of the camera-local axes applied on the right of `cam2world`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisFlip {
    /// Camera axes as stored.
    Identity,
    /// Negate camera Y (changes handedness).
    FlipY,
    /// Negate camera Z (changes handedness).
    FlipZ,
    /// Negate camera Y and Z, the OpenGL to OpenCV camera change.
    #[serde(rename = "flip_yz")]
    FlipYZ,
}

impl AxisFlip {
    /// All axis flips in a stable order.
    pub const ALL: [AxisFlip; 4] = [
        AxisFlip::Identity,
        AxisFlip::FlipY,
        AxisFlip::FlipZ,
        AxisFlip::FlipYZ,
    ];

    /// The diagonal 3x3 matrix of the flip.
    pub fn matrix(&self) -> DMat3 {
        let diagonal = match self {
            AxisFlip::Identity => DVec3::new(1.0, 1.0, 1.0),
            AxisFlip::FlipY => DVec3::new(1.0, -1.0, 1.0),
            AxisFlip::FlipZ => DVec3::new(1.0, 1.0, -1.0),
            AxisFlip::FlipYZ => DVec3::new(1.0, -1.0, -1.0),
        };
        DMat3::from_diagonal(diagonal)
    }
}

/// One interpretation of a raw pose matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConventionHypothesis {
    /// Mapping direction of the raw matrix.
    pub direction: PoseDirection,
    /// Layout of the rotation block.
    pub rotation: RotationLayout,
    /// Camera axis flip.
    pub axes: AxisFlip,
}

impl ConventionHypothesis {
    /// The raw matrix is already a camera-to-world transform in camera-vision axes.
    pub const CAM_TO_WORLD: Self = Self::new(
        PoseDirection::CamToWorld,
        RotationLayout::AsGiven,
        AxisFlip::Identity,
    );

    /// Create a new hypothesis.
    pub const fn new(direction: PoseDirection, rotation: RotationLayout, axes: AxisFlip) -> Self {
        Self {
            direction,
            rotation,
            axes,
        }
    }

    /// Every hypothesis (direction x rotation layout x axis flip), in a stable order.
    pub fn all() -> Vec<Self> {
        let mut hypotheses = Vec::with_capacity(16);
        for direction in [PoseDirection::CamToWorld, PoseDirection::WorldToCam] {
            for rotation in [RotationLayout::AsGiven, RotationLayout::Transposed] {
                for axes in AxisFlip::ALL {
                    hypotheses.push(Self::new(direction, rotation, axes));
                }
            }
        }
        hypotheses
    }
}

impl fmt::Display for ConventionHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.direction, self.rotation, self.axes)
    }
}

/// A camera pose as an immutable camera-to-world transform.
///
/// The inverse is computed once on construction, so a `CameraPose` can always
/// map in both directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    cam2world: DMat4,
    world2cam: DMat4,
}

impl CameraPose {
    /// Create a pose from a camera-to-world matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructionError::SingularMatrix`] if the matrix cannot be inverted.
    pub fn new(cam2world: DMat4) -> Result<Self, ReconstructionError> {
        let world2cam = try_inverse(&cam2world)?;
        Ok(Self {
            cam2world,
            world2cam,
        })
    }

    /// The pose of a camera sitting at the world origin.
    pub fn identity() -> Self {
        Self {
            cam2world: DMat4::IDENTITY,
            world2cam: DMat4::IDENTITY,
        }
    }

    /// Create a pose from a camera-to-world rotation and the camera position.
    pub fn from_rotation_translation(
        rotation: &DMat3,
        translation: &DVec3,
    ) -> Result<Self, ReconstructionError> {
        Self::new(compose(rotation, translation))
    }

    /// The camera-to-world matrix.
    #[inline]
    pub fn cam2world(&self) -> &DMat4 {
        &self.cam2world
    }

    /// The world-to-camera matrix.
    #[inline]
    pub fn world2cam(&self) -> &DMat4 {
        &self.world2cam
    }

    /// The rotation block of `cam2world`.
    pub fn rotation(&self) -> DMat3 {
        decompose(&self.cam2world).0
    }

    /// The camera center in world coordinates.
    pub fn translation(&self) -> DVec3 {
        decompose(&self.cam2world).1
    }

    /// Map a camera-space point into the world frame.
    #[inline]
    pub fn camera_to_world(&self, point: &DVec3) -> DVec3 {
        transform_point(&self.cam2world, point)
    }

    /// Map a world-space point into the camera frame.
    #[inline]
    pub fn world_to_camera(&self, point: &DVec3) -> DVec3 {
        transform_point(&self.world2cam, point)
    }

    /// A copy of the pose with its translation multiplied by `scale`.
    ///
    /// Converts engine position units to the depth units.
    pub fn with_translation_scale(&self, scale: f64) -> Result<Self, ReconstructionError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ReconstructionError::InvalidParameter(format!(
                "translation scale must be positive and finite, got {scale}"
            )));
        }
        let mut cam2world = self.cam2world;
        cam2world.w_axis = (cam2world.w_axis.truncate() * scale).extend(cam2world.w_axis.w);
        Self::new(cam2world)
    }
}

/// A pose resolved under one hypothesis, with its numerical diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPose {
    /// The resolved camera-to-world pose.
    pub pose: CameraPose,
    /// Orthogonality residual and determinant of the rotation block.
    pub diagnostics: RotationDiagnostics,
    /// The hypothesis used.
    pub hypothesis: ConventionHypothesis,
}

/// Resolve raw pose numbers into a camera-to-world pose under a hypothesis.
///
/// `raw` holds 12 (3x4) or 16 (4x4) row-major values. The steps are: pad to
/// 4x4, transpose the rotation block if requested, invert if the raw matrix
/// maps world to camera, then apply the camera axis flip on the right.
///
/// Suspicious rotations (orthogonality residual above 1e-3, determinant not
/// within 1e-3 of ±1) are logged but never rejected; the caller decides.
///
/// # Errors
///
/// - [`ReconstructionError::NonFinitePose`] if any entry is NaN or infinite.
/// - [`ReconstructionError::ShapeMismatch`] if `raw` holds neither 12 nor 16 values.
/// - [`ReconstructionError::SingularMatrix`] if a required inverse does not exist.
///
/// Example:
///
/// ```
/// use depthcloud_3d::extrinsic::{resolve_extrinsic, ConventionHypothesis};
///
/// let raw = [1.0, 0.0, 0.0, 2.0, 0.0, 1.0, 0.0, 3.0, 0.0, 0.0, 1.0, 4.0];
/// let resolved = resolve_extrinsic(&raw, &ConventionHypothesis::CAM_TO_WORLD)?;
/// assert_eq!(resolved.pose.translation().x, 2.0);
/// assert!(resolved.diagnostics.is_proper_rotation());
/// # Ok::<(), depthcloud_3d::ReconstructionError>(())
/// ```
pub fn resolve_extrinsic(
    raw: &[f64],
    hypothesis: &ConventionHypothesis,
) -> Result<ResolvedPose, ReconstructionError> {
    if let Some((index, &value)) = raw.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ReconstructionError::NonFinitePose { index, value });
    }

    let mut matrix = mat4_from_row_major(raw)?;
    if matrix.row(3) != DVec4::W {
        log::warn!(
            "pose bottom row is {:?}, expected [0, 0, 0, 1]",
            matrix.row(3).to_array()
        );
    }

    if hypothesis.rotation == RotationLayout::Transposed {
        let rotation = DMat3::from_mat4(matrix).transpose();
        matrix.x_axis = rotation.x_axis.extend(matrix.x_axis.w);
        matrix.y_axis = rotation.y_axis.extend(matrix.y_axis.w);
        matrix.z_axis = rotation.z_axis.extend(matrix.z_axis.w);
    }

    let cam2world = match hypothesis.direction {
        PoseDirection::CamToWorld => matrix,
        PoseDirection::WorldToCam => try_inverse(&matrix)?,
    };
    let cam2world = cam2world * DMat4::from_mat3(hypothesis.axes.matrix());

    let pose = CameraPose::new(cam2world)?;
    let diagnostics = RotationDiagnostics::from_rotation(&pose.rotation());

    if !diagnostics.is_orthonormal() {
        log::warn!(
            "[{hypothesis}] rotation is not orthonormal: |RᵀR - I| = {:.3e}",
            diagnostics.ortho_err
        );
    }
    if !diagnostics.has_unit_determinant() {
        log::warn!(
            "[{hypothesis}] rotation determinant {:.6} is not ±1",
            diagnostics.determinant
        );
    }

    Ok(ResolvedPose {
        pose,
        diagnostics,
        hypothesis: *hypothesis,
    })
}

/// Axis layout of an engine world frame relative to the camera-vision frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAxes {
    /// Keep the engine axes unchanged.
    Native,
    /// Unreal: +X forward, +Y right, +Z up, remapped to x right, y down, z forward.
    UnrealToOpenCv,
}

impl EngineAxes {
    /// The 3x3 matrix mapping engine axes to the target axes.
    pub fn matrix(&self) -> DMat3 {
        match self {
            EngineAxes::Native => DMat3::IDENTITY,
            // rows: x = y_ue, y = -z_ue, z = x_ue
            EngineAxes::UnrealToOpenCv => DMat3::from_cols(
                DVec3::new(0.0, 0.0, 1.0),
                DVec3::new(1.0, 0.0, 0.0),
                DVec3::new(0.0, -1.0, 0.0),
            ),
        }
    }
}

/// A camera pose given as a location and roll/pitch/yaw angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EulerPose {
    /// Camera location in world units.
    pub location: [f64; 3],
    /// Rotation about X in degrees.
    pub roll: f64,
    /// Rotation about Y in degrees.
    pub pitch: f64,
    /// Rotation about Z in degrees.
    pub yaw: f64,
}

impl EulerPose {
    /// Convert to 12 row-major `[R | t]` values ready for [`resolve_extrinsic`].
    ///
    /// With a remap `M`, the rotation becomes `M·R·Mᵀ` and the location `M·t`.
    pub fn to_raw_matrix(&self, axes: EngineAxes) -> [f64; 12] {
        let m = axes.matrix();
        let rotation = m * rotation_from_roll_pitch_yaw_degrees(self.roll, self.pitch, self.yaw)
            * m.transpose();
        let translation = m * DVec3::from_array(self.location);

        let mut raw = [0.0; 12];
        for (r, chunk) in raw.chunks_exact_mut(4).enumerate() {
            let row = rotation.row(r);
            chunk.copy_from_slice(&[row.x, row.y, row.z, translation[r]]);
        }
        raw
    }
}
