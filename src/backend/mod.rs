//! Compute backends the [`Pipeline`](crate::Pipeline) can drive.
//!
//! A backend owns device memory and knows how to run the three kernels. The
//! pipeline decides which images exist, which pass reads which buffer, and in
//! what order passes run.

mod cpu;

pub use cpu::{CpuBackend, CpuImage};

use anyhow::Result;

use crate::sdf::{DistanceField, SeedTexel};

/// Role of a 2D storage image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// One unsigned integer per texel, nonzero inside.
    Mask,
    /// `(inside.xy, outside.xy)` seed coordinates, four floats per texel.
    Seeds,
    /// One signed float per texel, sampled by consumers.
    Distance,
}

/// One compute dispatch over the full grid.
///
/// Each pass reads only its source image and writes only its target image,
/// and observes every write of the passes before it.
#[derive(Debug)]
pub enum Pass<'a, I> {
    /// Seed `seeds` from `mask`.
    Init { mask: &'a I, seeds: &'a I },
    /// Propagate seeds from `read` into `write` at `offset` texels.
    Flood { read: &'a I, write: &'a I, offset: u32 },
    /// Turn `seeds` into signed distances, saturating at `max_distance`.
    Resolve {
        seeds: &'a I,
        distance: &'a I,
        max_distance: f32,
    },
}

pub trait ComputeBackend {
    /// Owned handle to one storage image.
    type Image;

    fn allocate(&mut self, kind: ImageKind, width: u32, height: u32) -> Result<Self::Image>;

    /// Give an image's memory back. The handle must not be used again.
    fn release(&mut self, image: Self::Image);

    /// Upload `mask` into `mask_image`, then run `passes` in order. Returns
    /// once the work is submitted; results are ready after [`wait`](Self::wait).
    fn submit(&mut self, mask: &[u32], mask_image: &Self::Image, passes: &[Pass<'_, Self::Image>]) -> Result<()>;

    /// Block until all submitted work has retired.
    fn wait(&mut self) -> Result<()>;

    fn read_distance(&mut self, image: &Self::Image) -> Result<DistanceField>;

    fn read_seeds(&mut self, image: &Self::Image) -> Result<Vec<SeedTexel>>;

    /// Images allocated and not yet released.
    fn live_images(&self) -> usize;

    /// Largest magnitude the distance image stores without overflowing to
    /// infinity.
    fn max_representable_distance(&self) -> f32;
}
