#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Back-projection of depth images into world-space point clouds.
pub mod backproject;

/// Pinhole intrinsics built from a field of view.
pub mod camera;

/// Camera configuration and per-frame camera descriptors.
pub mod config;

/// Depth semantics and camera-space ray geometry.
pub mod depth;

/// Error types for the reconstruction engine.
pub mod error;

/// Extrinsic convention hypotheses and pose resolution.
pub mod extrinsic;

/// Depth and color image containers.
pub mod image;

/// Multi-frame orchestration and cloud merging.
pub mod merge;

/// Point cloud container.
pub mod pointcloud;

/// Point cloud subsampling strategies.
pub mod sampling;

/// Cross-frame reprojection scoring of convention hypotheses.
pub mod validation;

/// Voxel grid downsampling.
pub mod voxel_grid;

pub use error::ReconstructionError;
