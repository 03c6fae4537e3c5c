use crate::error::ReconstructionError;

/// Returns true when a depth sample can be back-projected.
///
/// Only finite, strictly positive samples are valid; zero usually encodes
/// "no hit" and negative or non-finite values come from clear color or sky.
#[inline]
pub fn is_valid_depth(depth: f64) -> bool {
    depth.is_finite() && depth > 0.0
}

/// A single channel depth image stored row-major as `height x width` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl DepthImage {
    /// Creates a new depth image from row-major samples.
    ///
    /// # Errors
    ///
    /// Returns [`ReconstructionError::ShapeMismatch`] if `data.len() != width * height`
    /// or if either dimension is zero.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self, ReconstructionError> {
        if width == 0 || height == 0 {
            return Err(ReconstructionError::shape_mismatch(
                "depth image",
                "non-zero width and height",
                format!("{width}x{height}"),
            ));
        }
        if data.len() != width * height {
            return Err(ReconstructionError::shape_mismatch(
                "depth image",
                width * height,
                data.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a depth image from single precision samples.
    pub fn from_f32(
        width: usize,
        height: usize,
        data: &[f32],
    ) -> Result<Self, ReconstructionError> {
        Self::new(width, height, data.iter().map(|&d| d as f64).collect())
    }

    /// Creates a depth image where every sample has the same value.
    pub fn filled(width: usize, height: usize, value: f64) -> Result<Self, ReconstructionError> {
        Self::new(width, height, vec![value; width * height])
    }

    /// The image width in pixels.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The image height in pixels.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// The image dimensions as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The raw row-major samples.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// The samples of row `v`.
    #[inline]
    pub fn row(&self, v: usize) -> &[f64] {
        &self.data[v * self.width..(v + 1) * self.width]
    }

    /// Get the depth value at a specific pixel, or `None` outside the image.
    #[inline]
    pub fn get(&self, u: usize, v: usize) -> Option<f64> {
        if u < self.width && v < self.height {
            Some(self.data[v * self.width + u])
        } else {
            None
        }
    }

    /// Mutable access to a sample, or `None` outside the image.
    #[inline]
    pub fn get_mut(&mut self, u: usize, v: usize) -> Option<&mut f64> {
        if u < self.width && v < self.height {
            Some(&mut self.data[v * self.width + u])
        } else {
            None
        }
    }

    /// Sample the nearest pixel to a sub-pixel location.
    ///
    /// Returns `None` outside the image or when the sample is invalid.
    pub fn sample_nearest(&self, u: f64, v: f64) -> Option<f64> {
        let (ui, vi) = (u.round(), v.round());
        if !(ui >= 0.0 && vi >= 0.0) {
            return None;
        }
        self.get(ui as usize, vi as usize).filter(|d| is_valid_depth(*d))
    }

    /// Bilinearly interpolate the depth at a sub-pixel location.
    ///
    /// All four neighbours must be inside the image and valid, otherwise the
    /// interpolation would blend across a depth discontinuity or a hole and
    /// `None` is returned.
    pub fn sample_bilinear(&self, u: f64, v: f64) -> Option<f64> {
        if !(u >= 0.0 && v >= 0.0) {
            return None;
        }
        let (u0, v0) = (u.floor(), v.floor());
        let (du, dv) = (u - u0, v - v0);
        let (u0, v0) = (u0 as usize, v0 as usize);

        // on the last row/column there is no right/bottom neighbour, clamp to it
        let u1 = if du > 0.0 { u0 + 1 } else { u0 };
        let v1 = if dv > 0.0 { v0 + 1 } else { v0 };

        let d00 = self.get(u0, v0).filter(|d| is_valid_depth(*d))?;
        let d10 = self.get(u1, v0).filter(|d| is_valid_depth(*d))?;
        let d01 = self.get(u0, v1).filter(|d| is_valid_depth(*d))?;
        let d11 = self.get(u1, v1).filter(|d| is_valid_depth(*d))?;

        let top = d00 * (1.0 - du) + d10 * du;
        let bottom = d01 * (1.0 - du) + d11 * du;
        Some(top * (1.0 - dv) + bottom * dv)
    }

    /// Number of valid samples.
    pub fn num_valid(&self) -> usize {
        self.data.iter().filter(|d| is_valid_depth(**d)).count()
    }

    /// Summary statistics over the valid samples.
    pub fn stats(&self) -> DepthStats {
        DepthStats::from_samples(&self.data)
    }
}

/// Summary of a depth image used to sanity check units and clip ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthStats {
    /// Number of valid samples.
    pub num_valid: usize,
    /// Number of invalid samples (non-finite, zero or negative).
    pub num_invalid: usize,
    /// Smallest valid sample.
    pub min: Option<f64>,
    /// Largest valid sample.
    pub max: Option<f64>,
    /// Mean of the valid samples.
    pub mean: Option<f64>,
    /// Median of the valid samples.
    pub median: Option<f64>,
}

impl DepthStats {
    fn from_samples(samples: &[f64]) -> Self {
        let mut valid: Vec<f64> = samples.iter().copied().filter(|d| is_valid_depth(*d)).collect();
        let num_valid = valid.len();
        let num_invalid = samples.len() - num_valid;

        if valid.is_empty() {
            return Self {
                num_valid,
                num_invalid,
                min: None,
                max: None,
                mean: None,
                median: None,
            };
        }

        valid.sort_by(|a, b| a.total_cmp(b));
        let mean = valid.iter().sum::<f64>() / num_valid as f64;
        let median = if num_valid % 2 == 1 {
            valid[num_valid / 2]
        } else {
            0.5 * (valid[num_valid / 2 - 1] + valid[num_valid / 2])
        };

        Self {
            num_valid,
            num_invalid,
            min: valid.first().copied(),
            max: valid.last().copied(),
            mean: Some(mean),
            median: Some(median),
        }
    }
}

/// An RGB image aligned pixel-for-pixel with a depth image.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorImage {
    width: usize,
    height: usize,
    data: Vec<[u8; 3]>,
}

impl ColorImage {
    /// Creates a new color image from row-major RGB triples.
    pub fn new(
        width: usize,
        height: usize,
        data: Vec<[u8; 3]>,
    ) -> Result<Self, ReconstructionError> {
        if data.len() != width * height {
            return Err(ReconstructionError::shape_mismatch(
                "color image",
                width * height,
                data.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a color image from interleaved RGB bytes.
    pub fn from_interleaved(
        width: usize,
        height: usize,
        bytes: &[u8],
    ) -> Result<Self, ReconstructionError> {
        if bytes.len() != width * height * 3 {
            return Err(ReconstructionError::shape_mismatch(
                "color image",
                width * height * 3,
                bytes.len(),
            ));
        }
        let data = bytes.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
        Self::new(width, height, data)
    }

    /// The image dimensions as (width, height).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Get the color value at a specific pixel.
    #[inline]
    pub fn get(&self, u: usize, v: usize) -> Option<[u8; 3]> {
        if u < self.width && v < self.height {
            Some(self.data[v * self.width + u])
        } else {
            None
        }
    }

    /// The raw row-major pixels.
    pub fn as_slice(&self) -> &[[u8; 3]] {
        &self.data
    }
}
