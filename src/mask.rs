use crate::error::{SdfError, SdfResult};

/// Coverage midpoint used by the upstream rasteriser when binarising glyphs.
pub const DEFAULT_COVERAGE_THRESHOLD: u8 = 128;

/// Binary occupancy grid, row-major. Zero is outside, any other value inside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    values: Vec<u32>,
}

/// Check that `width` and `height` are usable and return the texel count.
pub(crate) fn texel_count(width: u32, height: u32) -> SdfResult<usize> {
    if width == 0 || height == 0 {
        return Err(SdfError::InvalidDimensions { width, height });
    }
    Ok(width as usize * height as usize)
}

impl Mask {
    pub fn new(width: u32, height: u32, values: Vec<u32>) -> SdfResult<Self> {
        let expected = texel_count(width, height)?;
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

    /// All texels outside.
    pub fn empty(width: u32, height: u32) -> SdfResult<Self> {
        let len = texel_count(width, height)?;
        Self::new(width, height, vec![0; len])
    }

    /// Binarise anti-aliased coverage: a texel is inside when its coverage is
    /// strictly above `threshold`.
    pub fn from_coverage(width: u32, height: u32, coverage: &[u8], threshold: u8) -> SdfResult<Self> {
        let values = coverage.iter().map(|&c| u32::from(c > threshold)).collect();
        Self::new(width, height, values)
    }

    /// Build a mask by evaluating `inside` at every texel.
    pub fn from_fn(width: u32, height: u32, mut inside: impl FnMut(u32, u32) -> bool) -> SdfResult<Self> {
        let len = texel_count(width, height)?;
        let mut values = Vec::with_capacity(len);
        for y in 0..height {
            for x in 0..width {
                values.push(u32::from(inside(x, y)));
            }
        }
        Self::new(width, height, values)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.values
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn is_inside(&self, x: u32, y: u32) -> bool {
        self.values[self.index(x, y)] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, inside: bool) {
        let i = self.index(x, y);
        self.values[i] = u32::from(inside);
    }

    /// Number of inside texels.
    pub fn inside_count(&self) -> usize {
        self.values.iter().filter(|&&v| v != 0).count()
    }
}
