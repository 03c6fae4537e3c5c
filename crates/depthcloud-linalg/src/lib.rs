#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Homogeneous 4x4 matrix construction, reshaping and inversion.
pub mod homogeneous;

/// Rotation diagnostics and constructors.
pub mod rigid;

pub use homogeneous::LinalgError;
