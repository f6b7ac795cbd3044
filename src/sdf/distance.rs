use image::{GrayImage, Luma};

use crate::error::{SdfError, SdfResult};

/// Host copy of the signed distance texture, row-major, in pixel units.
/// Negative inside the mask, positive outside.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceField {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DistanceField {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> SdfResult<Self> {
        let expected = crate::mask::texel_count(width, height)?;
        if values.len() != expected {
            return Err(SdfError::MaskSizeMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[y as usize * self.width as usize + x as usize]
    }

    /// True when no texel holds NaN or an infinity.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Number of texels with a negative distance.
    pub fn inside_count(&self) -> usize {
        self.values.iter().filter(|&&v| v < 0.0).count()
    }

    /// Grey visualisation: 128 on the boundary, brighter inside, darker
    /// outside, saturating `spread` pixels away from the edge.
    pub fn to_image(&self, spread: f32) -> GrayImage {
        let spread = spread.max(f32::EPSILON);
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let d = self.get(x, y);
            Luma([((0.5 - d / (2.0 * spread)).clamp(0.0, 1.0) * 255.0).round() as u8])
        })
    }
}
