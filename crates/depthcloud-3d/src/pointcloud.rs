use glam::DVec3;

use crate::error::ReconstructionError;

/// A single reconstructed point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldPoint {
    /// Position in world coordinates.
    pub position: [f64; 3],
    /// RGB color sampled from the source frame.
    pub color: Option<[u8; 3]>,
    /// Source pixel `[u, v]` in the depth image.
    pub pixel: Option<[u32; 2]>,
}

/// A point cloud stored as parallel arrays.
///
/// `colors` and `pixels` are either absent or exactly as long as `points`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    // The points in world coordinates.
    points: Vec<[f64; 3]>,
    // The colors of the points.
    colors: Option<Vec<[u8; 3]>>,
    // The source pixel of each point.
    pixels: Option<Vec<[u32; 2]>>,
}

impl PointCloud {
    /// Create a new point cloud from points, colors (optional), and source pixels (optional).
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructionError::ShapeMismatch`] if an optional array has a
    /// different length than `points`.
    pub fn new(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        pixels: Option<Vec<[u32; 2]>>,
    ) -> Result<Self, ReconstructionError> {
        if let Some(colors) = &colors {
            if colors.len() != points.len() {
                return Err(ReconstructionError::shape_mismatch(
                    "point colors",
                    points.len(),
                    colors.len(),
                ));
            }
        }
        if let Some(pixels) = &pixels {
            if pixels.len() != points.len() {
                return Err(ReconstructionError::shape_mismatch(
                    "point pixels",
                    points.len(),
                    pixels.len(),
                ));
            }
        }
        Ok(Self {
            points,
            colors,
            pixels,
        })
    }

    /// Create an empty point cloud.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the number of points in the point cloud.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the point cloud is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points in the point cloud.
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    /// Get as reference the colors of the points in the point cloud.
    pub fn colors(&self) -> Option<&[[u8; 3]]> {
        self.colors.as_deref()
    }

    /// Get as reference the source pixels of the points in the point cloud.
    pub fn pixels(&self) -> Option<&[[u32; 2]]> {
        self.pixels.as_deref()
    }

    /// Get the point at `index` with its attributes.
    pub fn get(&self, index: usize) -> Option<WorldPoint> {
        let position = *self.points.get(index)?;
        Some(WorldPoint {
            position,
            color: self.colors.as_ref().map(|c| c[index]),
            pixel: self.pixels.as_ref().map(|p| p[index]),
        })
    }

    /// Iterate over the points with their attributes.
    pub fn iter(&self) -> impl Iterator<Item = WorldPoint> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Keep only the points at `indices`, in that order, carrying all attributes.
    ///
    /// Indices past the end are ignored.
    pub fn select(&self, indices: &[usize]) -> Self {
        let indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.len()).collect();
        Self {
            points: indices.iter().map(|&i| self.points[i]).collect(),
            colors: self.colors.as_ref().map(|c| indices.iter().map(|&i| c[i]).collect()),
            pixels: self.pixels.as_ref().map(|p| indices.iter().map(|&i| p[i]).collect()),
        }
    }

    /// Get the minimum bound of the point cloud, zero when empty.
    pub fn min_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::min)
            .unwrap_or(DVec3::ZERO)
    }

    /// Get the maximum bound of the point cloud, zero when empty.
    pub fn max_bound(&self) -> DVec3 {
        self.points
            .iter()
            .map(|p| DVec3::from_array(*p))
            .reduce(DVec3::max)
            .unwrap_or(DVec3::ZERO)
    }

    /// Centroid of the points, `None` when empty.
    pub fn centroid(&self) -> Option<DVec3> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self.points.iter().map(|p| DVec3::from_array(*p)).sum::<DVec3>();
        Some(sum / self.points.len() as f64)
    }

    /// Assemble a cloud from arrays already known to have matching lengths.
    pub(crate) fn from_parts(
        points: Vec<[f64; 3]>,
        colors: Option<Vec<[u8; 3]>>,
        pixels: Option<Vec<[u32; 2]>>,
    ) -> Self {
        debug_assert!(colors.as_ref().map_or(true, |c| c.len() == points.len()));
        debug_assert!(pixels.as_ref().map_or(true, |p| p.len() == points.len()));
        Self {
            points,
            colors,
            pixels,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<[f64; 3]>, Option<Vec<[u8; 3]>>, Option<Vec<[u32; 2]>>) {
        (self.points, self.colors, self.pixels)
    }
}

impl FromIterator<WorldPoint> for PointCloud {
    /// Collect points; an attribute is kept only if every point carries it.
    fn from_iter<T: IntoIterator<Item = WorldPoint>>(iter: T) -> Self {
        let mut points = Vec::new();
        let mut colors = Some(Vec::new());
        let mut pixels = Some(Vec::new());
        for p in iter {
            points.push(p.position);
            colors = colors.zip(p.color).map(|(mut v, c)| {
                v.push(c);
                v
            });
            pixels = pixels.zip(p.pixel).map(|(mut v, px)| {
                v.push(px);
                v
            });
        }
        Self {
            points,
            colors,
            pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointcloud() -> Result<(), ReconstructionError> {
        let pointcloud = PointCloud::new(
            vec![[0.0, 0.0, 0.0], [1.0, -2.0, 3.0]],
            Some(vec![[255, 0, 0], [0, 255, 0]]),
            Some(vec![[4, 5], [6, 7]]),
        )?;

        assert_eq!(pointcloud.len(), 2);
        assert_eq!(pointcloud.colors().map(|c| c.len()), Some(2));
        assert_eq!(
            pointcloud.get(1),
            Some(WorldPoint {
                position: [1.0, -2.0, 3.0],
                color: Some([0, 255, 0]),
                pixel: Some([6, 7]),
            })
        );
        assert_eq!(pointcloud.get(2), None);
        assert_eq!(pointcloud.iter().count(), 2);
        Ok(())
    }

    #[test]
    fn test_attribute_length_mismatch() {
        let res = PointCloud::new(vec![[0.0; 3]; 3], Some(vec![[0, 0, 0]; 2]), None);
        assert!(matches!(res, Err(ReconstructionError::ShapeMismatch { .. })));
        let res = PointCloud::new(vec![[0.0; 3]; 3], None, Some(vec![[0, 0]; 4]));
        assert!(res.is_err());
    }

    #[test]
    fn test_bounds() -> Result<(), ReconstructionError> {
        let pointcloud = PointCloud::new(
            vec![[0.0, 5.0, -1.0], [1.0, 1.0, 1.0], [-3.0, 2.0, 0.0]],
            None,
            None,
        )?;
        assert_eq!(pointcloud.min_bound(), DVec3::new(-3.0, 1.0, -1.0));
        assert_eq!(pointcloud.max_bound(), DVec3::new(1.0, 5.0, 1.0));
        assert_eq!(pointcloud.centroid(), Some(DVec3::new(-2.0 / 3.0, 8.0 / 3.0, 0.0)));

        let empty = PointCloud::empty();
        assert_eq!(empty.min_bound(), DVec3::ZERO);
        assert_eq!(empty.centroid(), None);
        Ok(())
    }

    #[test]
    fn test_select_keeps_correspondence() -> Result<(), ReconstructionError> {
        let pointcloud = PointCloud::new(
            vec![[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3]],
            Some(vec![[0; 3], [1; 3], [2; 3], [3; 3]]),
            Some(vec![[0, 0], [1, 0], [2, 0], [3, 0]]),
        )?;
        let selected = pointcloud.select(&[3, 1, 42]);
        assert_eq!(selected.len(), 2);
        for p in selected.iter() {
            let pixel = p.pixel.unwrap_or_default();
            assert_eq!(p.position[0], pixel[0] as f64);
            assert_eq!(p.color, Some([pixel[0] as u8; 3]));
        }
        Ok(())
    }

    #[test]
    fn test_collect_drops_partial_attributes() {
        let cloud: PointCloud = [
            WorldPoint {
                position: [0.0; 3],
                color: Some([1, 2, 3]),
                pixel: Some([0, 0]),
            },
            WorldPoint {
                position: [1.0; 3],
                color: None,
                pixel: Some([1, 0]),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(cloud.len(), 2);
        assert!(cloud.colors().is_none());
        assert_eq!(cloud.pixels().map(|p| p.len()), Some(2));
    }
}
