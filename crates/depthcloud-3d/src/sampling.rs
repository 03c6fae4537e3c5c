use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::ReconstructionError;
use crate::pointcloud::PointCloud;
use crate::voxel_grid::VoxelGrid;

/// How to thin out a point cloud before merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsampler {
    /// Shuffle the points with a seeded generator and keep every `every_nth`
    /// of the permutation. Source pixels and colors stay attached.
    RandomStride {
        /// Keep one point out of `every_nth`.
        every_nth: usize,
        /// Seed of the permutation.
        seed: u64,
    },
    /// Replace the points of each cubic cell by their centroid.
    Voxel {
        /// Edge length of the cells in world units.
        voxel_size: f64,
    },
}

impl Subsampler {
    /// Check the parameters without touching any data.
    pub fn validate(&self) -> Result<(), ReconstructionError> {
        match *self {
            Subsampler::RandomStride { every_nth, .. } if every_nth == 0 => Err(
                ReconstructionError::InvalidParameter("every_nth must be at least 1".to_string()),
            ),
            Subsampler::Voxel { voxel_size } => VoxelGrid::cubic(voxel_size).map(|_| ()),
            Subsampler::RandomStride { .. } => Ok(()),
        }
    }

    /// The same subsampler with its seed advanced by `offset`.
    ///
    /// Gives each frame of a batch its own reproducible permutation.
    pub fn with_seed_offset(&self, offset: u64) -> Self {
        match *self {
            Subsampler::RandomStride { every_nth, seed } => Subsampler::RandomStride {
                every_nth,
                seed: seed.wrapping_add(offset),
            },
            voxel @ Subsampler::Voxel { .. } => voxel,
        }
    }

    /// Subsample a point cloud.
    pub fn apply(&self, cloud: &PointCloud) -> Result<PointCloud, ReconstructionError> {
        self.validate()?;
        match *self {
            Subsampler::RandomStride { every_nth, seed } => {
                let indices = random_stride_indices(cloud.len(), every_nth, seed);
                Ok(cloud.select(&indices))
            }
            Subsampler::Voxel { voxel_size } => Ok(VoxelGrid::cubic(voxel_size)?.downsample(cloud)),
        }
    }
}

/// Every `every_nth` index of a seeded permutation of `0..len`.
///
/// Returns `ceil(len / every_nth)` distinct indices.
pub fn random_stride_indices(len: usize, every_nth: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..len).collect();
    indices.shuffle(&mut rng);
    indices.into_iter().step_by(every_nth.max(1)).collect()
}
