use std::collections::HashMap;

use glam::DVec3;

use crate::error::ReconstructionError;
use crate::pointcloud::PointCloud;

/// Running sums of the points falling into one voxel.
#[derive(Debug, Clone, Copy, Default)]
struct VoxelAccumulator {
    position: DVec3,
    color: [u64; 3],
    count: usize,
}

/// A 3D voxel grid for downsampling point clouds.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    /// The size of the voxel (leaf) in x, y, z dimensions.
    leaf_size: DVec3,
    /// Minimum number of points required per voxel.
    min_points_per_voxel: usize,
}

impl VoxelGrid {
    /// Creates a new `VoxelGrid` with the specified leaf size.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructionError::InvalidParameter`] if any dimension of
    /// `leaf_size` is non-positive or not finite.
    pub fn new(leaf_size: DVec3) -> Result<Self, ReconstructionError> {
        check_leaf_size(leaf_size)?;
        Ok(Self {
            leaf_size,
            min_points_per_voxel: 1,
        })
    }

    /// Creates a grid of cubic voxels with edge `size`.
    pub fn cubic(size: f64) -> Result<Self, ReconstructionError> {
        Self::new(DVec3::splat(size))
    }

    /// Downsamples the input point cloud by grouping points into voxels and computing centroids.
    ///
    /// Colors are averaged per voxel. Source pixels do not survive since a
    /// centroid has no single source pixel. Voxels are emitted in ascending
    /// index order so the output does not depend on hashing.
    pub fn downsample(&self, point_cloud: &PointCloud) -> PointCloud {
        let mut grid: HashMap<(i64, i64, i64), VoxelAccumulator> = HashMap::new();
        let colors = point_cloud.colors();

        for (i, point) in point_cloud.points().iter().enumerate() {
            let entry = grid.entry(self.voxel_index(point)).or_default();
            entry.position += DVec3::from_array(*point);
            entry.count += 1;
            if let Some(color) = colors.and_then(|c| c.get(i)) {
                for (acc, c) in entry.color.iter_mut().zip(color) {
                    *acc += *c as u64;
                }
            }
        }

        let mut voxels: Vec<_> = grid
            .into_iter()
            .filter(|(_, voxel)| voxel.count >= self.min_points_per_voxel)
            .collect();
        voxels.sort_unstable_by_key(|(key, _)| *key);

        let mut points = Vec::with_capacity(voxels.len());
        let mut out_colors = colors.map(|_| Vec::with_capacity(voxels.len()));
        for (_, voxel) in voxels {
            let inv_count = 1.0 / voxel.count as f64;
            points.push((voxel.position * inv_count).to_array());
            if let Some(out) = out_colors.as_mut() {
                out.push(voxel.color.map(|c| (c as f64 * inv_count).round() as u8));
            }
        }

        log::debug!(
            "voxel grid reduced {} points to {}",
            point_cloud.len(),
            points.len()
        );

        PointCloud::from_parts(points, out_colors, None)
    }

    /// Computes the voxel index for a given point.
    pub fn voxel_index(&self, point: &[f64; 3]) -> (i64, i64, i64) {
        let cell = (DVec3::from_array(*point) / self.leaf_size).floor();
        (cell.x as i64, cell.y as i64, cell.z as i64)
    }

    /// Sets the voxel grid leaf size.
    pub fn set_leaf_size(&mut self, leaf_size: DVec3) -> Result<(), ReconstructionError> {
        check_leaf_size(leaf_size)?;
        self.leaf_size = leaf_size;
        Ok(())
    }

    /// Gets the voxel grid leaf size.
    pub fn leaf_size(&self) -> DVec3 {
        self.leaf_size
    }

    /// Sets the minimum number of points required per voxel.
    pub fn set_min_points_per_voxel(&mut self, min_points: usize) {
        self.min_points_per_voxel = min_points;
    }

    /// Gets the minimum number of points required per voxel.
    pub fn min_points_per_voxel(&self) -> usize {
        self.min_points_per_voxel
    }
}

fn check_leaf_size(leaf_size: DVec3) -> Result<(), ReconstructionError> {
    if leaf_size.is_finite() && leaf_size.min_element() > 0.0 {
        Ok(())
    } else {
        Err(ReconstructionError::InvalidParameter(format!(
            "voxel size must be positive in all dimensions, got {leaf_size}"
        )))
    }
}
