use depthcloud_linalg::LinalgError;

/// An error type for the reconstruction engine.
///
/// Every variant signals a caller configuration error detected synchronously;
/// none of them is transient.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ReconstructionError {
    /// Field of view missing, out of range or inconsistent.
    #[error("Invalid field of view: {0}")]
    InvalidFov(String),

    /// The pose matrix cannot be inverted.
    #[error("Singular pose matrix (determinant {0})")]
    SingularMatrix(f64),

    /// A pose matrix entry is NaN or infinite.
    #[error("Non-finite pose matrix entry {value} at index {index}")]
    NonFinitePose {
        /// Row-major position of the entry.
        index: usize,
        /// The offending value.
        value: f64,
    },

    /// Two inputs that must agree in size do not.
    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Which input was inconsistent.
        what: &'static str,
        /// Expected size description.
        expected: String,
        /// Actual size description.
        actual: String,
    },

    /// Depth semantics tag is unknown or missing.
    #[error("Invalid depth semantics: {0}")]
    InvalidDepthSemantics(String),

    /// A tuning parameter is out of its valid range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ReconstructionError {
    pub(crate) fn shape_mismatch(
        what: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<LinalgError> for ReconstructionError {
    fn from(err: LinalgError) -> Self {
        match err {
            LinalgError::Singular(det) => Self::SingularMatrix(det),
            LinalgError::InvalidLength(n) => {
                Self::shape_mismatch("pose matrix", "12 or 16 values", n)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linalg_error_conversion() {
        let err: ReconstructionError = LinalgError::InvalidLength(7).into();
        assert_eq!(
            err,
            ReconstructionError::ShapeMismatch {
                what: "pose matrix",
                expected: "12 or 16 values".to_string(),
                actual: "7".to_string(),
            }
        );

        let err: ReconstructionError = LinalgError::Singular(0.0).into();
        assert_eq!(err, ReconstructionError::SingularMatrix(0.0));
    }

    #[test]
    fn test_non_finite_pose_message() {
        let err = ReconstructionError::NonFinitePose {
            index: 3,
            value: f64::NAN,
        };
        assert_eq!(err.to_string(), "Non-finite pose matrix entry NaN at index 3");
    }

    #[test]
    fn test_error_message() {
        let err = ReconstructionError::InvalidFov("fov must be in (0, 180)".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid field of view: fov must be in (0, 180)"
        );
    }
}
