//! Rotation diagnostics (orthogonality, handedness) and Euler constructors.

use glam::DMat3;

/// Orthogonality residual above which a rotation is reported as suspicious.
pub const ORTHO_TOLERANCE: f64 = 1e-3;

/// Allowed distance of `det(R)` from ±1.
pub const DET_TOLERANCE: f64 = 1e-3;

/// Numerical health of a 3x3 rotation block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationDiagnostics {
    /// Frobenius norm of `RᵀR − I`.
    pub ortho_err: f64,
    /// Determinant of `R`.
    pub determinant: f64,
}

impl RotationDiagnostics {
    /// Compute the diagnostics of a rotation block.
    pub fn from_rotation(rotation: &DMat3) -> Self {
        Self {
            ortho_err: orthogonality_error(rotation),
            determinant: rotation.determinant(),
        }
    }

    /// Whether `RᵀR` is the identity within [`ORTHO_TOLERANCE`].
    pub fn is_orthonormal(&self) -> bool {
        self.ortho_err <= ORTHO_TOLERANCE
    }

    /// Whether `|det(R)|` is 1 within [`DET_TOLERANCE`].
    pub fn has_unit_determinant(&self) -> bool {
        (self.determinant.abs() - 1.0).abs() <= DET_TOLERANCE
    }

    /// Whether the rotation preserves handedness (`det(R) > 0`).
    pub fn is_right_handed(&self) -> bool {
        self.determinant > 0.0
    }

    /// Whether the block is a proper rotation: orthonormal with `det(R) ≈ +1`.
    pub fn is_proper_rotation(&self) -> bool {
        self.is_orthonormal() && self.has_unit_determinant() && self.is_right_handed()
    }
}

/// Frobenius norm of `RᵀR − I`.
///
/// Example:
///
/// ```
/// use glam::DMat3;
/// use depthcloud_linalg::rigid::orthogonality_error;
///
/// assert!(orthogonality_error(&DMat3::IDENTITY) < 1e-12);
/// assert!(orthogonality_error(&(DMat3::IDENTITY * 2.0)) > 1.0);
/// ```
pub fn orthogonality_error(rotation: &DMat3) -> f64 {
    let residual = rotation.transpose() * *rotation - DMat3::IDENTITY;
    residual
        .to_cols_array()
        .iter()
        .map(|v| v * v)
        .sum::<f64>()
        .sqrt()
}

/// Rotation from roll/pitch/yaw angles in degrees, applied roll first.
///
/// Roll rotates about X, pitch about Y and yaw about Z; the result is
/// `Rz(yaw) · Ry(pitch) · Rx(roll)`, the composition order used by Unreal
/// style rotators.
pub fn rotation_from_roll_pitch_yaw_degrees(roll: f64, pitch: f64, yaw: f64) -> DMat3 {
    let rx = DMat3::from_rotation_x(roll.to_radians());
    let ry = DMat3::from_rotation_y(pitch.to_radians());
    let rz = DMat3::from_rotation_z(yaw.to_radians());
    rz * ry * rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::DVec3;

    #[test]
    fn test_identity_diagnostics() {
        let diag = RotationDiagnostics::from_rotation(&DMat3::IDENTITY);
        assert!(diag.ortho_err < 1e-12);
        assert_relative_eq!(diag.determinant, 1.0);
        assert!(diag.is_proper_rotation());
    }

    #[test]
    fn test_quarter_turn_diagnostics() {
        let r = DMat3::from_cols(
            DVec3::new(0.0, 1.0, 0.0),
            DVec3::new(-1.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, 1.0),
        );
        let diag = RotationDiagnostics::from_rotation(&r);
        assert!(diag.ortho_err < 1e-12);
        assert!(diag.is_proper_rotation());
    }

    #[test]
    fn test_reflection_is_left_handed() {
        let r = DMat3::from_diagonal(DVec3::new(1.0, -1.0, 1.0));
        let diag = RotationDiagnostics::from_rotation(&r);
        assert!(diag.is_orthonormal());
        assert!(diag.has_unit_determinant());
        assert!(!diag.is_right_handed());
        assert!(!diag.is_proper_rotation());
    }

    #[test]
    fn test_scaled_rotation_flagged() {
        let r = DMat3::from_rotation_y(0.4) * 1.01;
        let diag = RotationDiagnostics::from_rotation(&r);
        assert!(!diag.is_orthonormal());
        assert!(!diag.has_unit_determinant());
    }

    #[test]
    fn test_yaw_only() {
        let r = rotation_from_roll_pitch_yaw_degrees(0.0, 0.0, 90.0);
        let x = r * DVec3::X;
        assert_relative_eq!(x.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(x.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(x.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roll_applied_before_yaw() {
        // roll 90 sends Y to Z, yaw 90 then leaves Z untouched
        let r = rotation_from_roll_pitch_yaw_degrees(90.0, 0.0, 90.0);
        let y = r * DVec3::Y;
        assert_relative_eq!(y.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(y.z, 1.0, epsilon = 1e-12);
    }
}
