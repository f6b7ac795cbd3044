//! Jump flood orchestration.
//!
//! A [`Pipeline`] owns one mask image, two seed images used ping-pong, and
//! the distance image, all sized at construction. [`Pipeline::run`] records
//!
//! 1. the mask upload,
//! 2. the init pass into seed buffer 0,
//! 3. one flood pass per offset from [`flood_offsets`], alternating which
//!    seed buffer is read and which is written,
//! 4. the resolve pass from whichever buffer holds the last flood result,
//!
//! and submits them as one unit. A pass never reads the buffer it writes, so
//! texel results do not depend on invocation order within a pass.

use tracing::{debug, info, warn};

use super::distance::DistanceField;
use super::schedule::{flood_offsets, flood_pass_count};
use super::seed::SeedTexel;
use crate::backend::{ComputeBackend, ImageKind, Pass};
use crate::config::{DEFAULT_MAX_DISTANCE, SdfConfig};
use crate::error::{SdfError, SdfResult};
use crate::mask::{Mask, texel_count};

fn released() -> SdfError {
    SdfError::Device(anyhow::anyhow!("pipeline resources were released"))
}

struct Resources<I> {
    mask: I,
    seeds: [I; 2],
    distance: I,
}

pub struct Pipeline<B: ComputeBackend> {
    backend: B,
    width: u32,
    height: u32,
    max_distance: f32,
    /// `None` only once released.
    resources: Option<Resources<B::Image>>,
    /// Seed buffer holding the result of the last run.
    result_index: Option<usize>,
}

impl<B: ComputeBackend> Pipeline<B> {
    /// Allocate every image for a `width x height` field.
    ///
    /// Fails with [`SdfError::InvalidDimensions`] for a zero dimension and
    /// with [`SdfError::Allocation`] when the backend runs out of memory; in
    /// that case anything already allocated is released again.
    pub fn new(mut backend: B, width: u32, height: u32) -> SdfResult<Self> {
        texel_count(width, height)?;

        let mut allocated = Vec::with_capacity(4);
        for kind in [ImageKind::Mask, ImageKind::Seeds, ImageKind::Seeds, ImageKind::Distance] {
            match backend.allocate(kind, width, height) {
                Ok(image) => allocated.push(image),
                Err(e) => {
                    for image in allocated {
                        backend.release(image);
                    }
                    return Err(SdfError::Allocation(e));
                }
            }
        }

        let [mask, ping, pong, distance]: [B::Image; 4] = allocated
            .try_into()
            .map_err(|_| SdfError::Allocation(anyhow::anyhow!("backend returned too few images")))?;

        info!(width, height, passes = flood_pass_count(width, height), "SDF pipeline created");

        let max_distance = DEFAULT_MAX_DISTANCE.min(backend.max_representable_distance());

        Ok(Self {
            backend,
            width,
            height,
            max_distance,
            resources: Some(Resources {
                mask,
                seeds: [ping, pong],
                distance,
            }),
            result_index: None,
        })
    }

    /// Construct with the saturation distance from `config`.
    pub fn with_config(backend: B, width: u32, height: u32, config: &SdfConfig) -> SdfResult<Self> {
        config.validate()?;
        let mut pipeline = Self::new(backend, width, height)?;
        pipeline.set_max_distance(config.max_distance)?;
        Ok(pipeline)
    }

    /// Distance assigned to texels whose opposite side has no seed at all.
    ///
    /// Must be finite, positive, and storable in the backend's distance
    /// format.
    pub fn with_max_distance(mut self, max_distance: f32) -> SdfResult<Self> {
        self.set_max_distance(max_distance)?;
        Ok(self)
    }

    fn set_max_distance(&mut self, max_distance: f32) -> SdfResult<()> {
        if !max_distance.is_finite() || max_distance <= 0.0 {
            return Err(SdfError::InvalidConfig(format!(
                "max_distance must be finite and positive, got {max_distance}"
            )));
        }
        let limit = self.backend.max_representable_distance();
        if max_distance > limit {
            return Err(SdfError::InvalidConfig(format!(
                "max_distance {max_distance} exceeds {limit}, the largest distance the backend can store"
            )));
        }
        self.max_distance = max_distance;
        Ok(())
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

    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    pub fn flood_pass_count(&self) -> usize {
        flood_pass_count(self.width, self.height)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Handle to the distance image for external sampling. Its contents are
    /// defined after a [`run`](Self::run) has completed.
    pub fn distance(&self) -> SdfResult<&B::Image> {
        self.resources
            .as_ref()
            .map(|r| &r.distance)
            .ok_or_else(released)
    }

    /// Compute the signed distance field of `mask` (row-major, nonzero is
    /// inside). Every call replaces the previous result completely.
    ///
    /// Work is submitted, not awaited: call [`wait`](Self::wait) or a
    /// `read_*` method before consuming the returned image on the host.
    pub fn run(&mut self, mask: &[u32]) -> SdfResult<&B::Image> {
        let expected = self.width as usize * self.height as usize;
        if mask.len() != expected {
            return Err(SdfError::MaskSizeMismatch {
                expected,
                actual: mask.len(),
            });
        }

        let resources = self.resources.as_ref().ok_or_else(released)?;
        // Cleared until this submission succeeds, so a rejected run never
        // leaves an older result readable.
        self.result_index = None;

        let mut passes = Vec::with_capacity(self.flood_pass_count() + 2);
        passes.push(Pass::Init {
            mask: &resources.mask,
            seeds: &resources.seeds[0],
        });

        let mut read = 0;
        let offsets: Vec<u32> = flood_offsets(self.width, self.height).collect();
        for &offset in &offsets {
            passes.push(Pass::Flood {
                read: &resources.seeds[read],
                write: &resources.seeds[1 - read],
                offset,
            });
            read = 1 - read;
        }

        passes.push(Pass::Resolve {
            seeds: &resources.seeds[read],
            distance: &resources.distance,
            max_distance: self.max_distance,
        });

        debug!(?offsets, result_buffer = read, "submitting jump flood");

        self.backend
            .submit(mask, &resources.mask, &passes)
            .map_err(SdfError::Device)?;
        self.result_index = Some(read);

        Ok(&resources.distance)
    }

    /// Like [`run`](Self::run), also checking the mask's dimensions.
    pub fn run_mask(&mut self, mask: &Mask) -> SdfResult<&B::Image> {
        if mask.extent() != self.extent() {
            return Err(SdfError::MaskDimensionMismatch {
                mask: mask.extent(),
                pipeline: self.extent(),
            });
        }
        self.run(mask.as_slice())
    }

    /// Block until the last run has finished on the device. A failed wait
    /// invalidates the last result.
    pub fn wait(&mut self) -> SdfResult<()> {
        match self.backend.wait() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.result_index = None;
                Err(SdfError::Device(e))
            }
        }
    }

    /// Copy the distance image to the host, waiting for the last run first.
    ///
    /// Fails with [`SdfError::NoResult`] until a run has been submitted
    /// successfully.
    pub fn read_distance(&mut self) -> SdfResult<DistanceField> {
        if self.result_index.is_none() {
            return Err(SdfError::NoResult);
        }
        self.wait()?;
        let resources = self.resources.as_ref().ok_or_else(released)?;
        self.backend
            .read_distance(&resources.distance)
            .map_err(SdfError::Device)
    }

    /// Copy the final seed buffer of the last run to the host.
    pub fn read_seeds(&mut self) -> SdfResult<Vec<SeedTexel>> {
        let index = self.result_index.ok_or(SdfError::NoResult)?;
        self.wait()?;
        let resources = self.resources.as_ref().ok_or_else(released)?;
        self.backend
            .read_seeds(&resources.seeds[index])
            .map_err(SdfError::Device)
    }

    /// Wait for outstanding work and release every image.
    ///
    /// Consumes the pipeline; build a new one to change dimensions.
    pub fn destroy(mut self) -> SdfResult<()> {
        let waited = self.wait();
        self.release();
        waited
    }

    fn release(&mut self) {
        if let Some(resources) = self.resources.take() {
            let Resources {
                mask,
                seeds: [ping, pong],
                distance,
            } = resources;
            for image in [mask, ping, pong, distance] {
                self.backend.release(image);
            }
            debug!(live = self.backend.live_images(), "SDF pipeline released");
        }
    }
}

impl<B: ComputeBackend> Drop for Pipeline<B> {
    fn drop(&mut self) {
        if self.resources.is_none() {
            return;
        }
        if let Err(e) = self.backend.wait() {
            warn!("releasing SDF pipeline with unfinished work: {e:#}");
        }
        self.release();
    }
}
