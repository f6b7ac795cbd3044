//! Host backend with allocation and submission accounting.
//!
//! Runs the same kernels as the device shaders on the CPU. Clones share one
//! simulated device, so a test can keep a clone around to inspect how many
//! images a pipeline left behind, cap memory, or make the next submission fail
//! the way a validation layer would.

use anyhow::{Context, Result, anyhow, bail};
use half::f16;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{ComputeBackend, ImageKind, Pass};
use crate::config::DistanceFormat;
use crate::sdf::{DistanceField, SeedTexel, kernels};

/// Handle to an image owned by a [`CpuBackend`].
#[derive(Debug)]
pub struct CpuImage {
    id: u64,
    kind: ImageKind,
    width: u32,
    height: u32,
}

impl CpuImage {
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

enum Texels {
    Mask(Vec<u32>),
    Seeds(Vec<SeedTexel>),
    Distance(Vec<f32>),
}

#[derive(Default)]
struct CpuDevice {
    next_id: u64,
    images: HashMap<u64, Texels>,
    total_allocations: usize,
    submissions: usize,
    allocation_limit: Option<usize>,
    fail_next_submit: Option<String>,
    distance_format: DistanceFormat,
}

impl CpuDevice {
    /// Run `f` with `read` borrowed and `write` borrowed mutably.
    fn with_pair<R>(
        &mut self,
        read: &CpuImage,
        write: &CpuImage,
        f: impl FnOnce(&Texels, &mut Texels) -> Result<R>,
    ) -> Result<R> {
        if read.id == write.id {
            bail!("image {} bound for both reading and writing in one pass", read.id);
        }
        let mut target = self
            .images
            .remove(&write.id)
            .with_context(|| format!("image {} was released", write.id))?;
        let result = match self.images.get(&read.id) {
            Some(source) => f(source, &mut target),
            None => Err(anyhow!("image {} was released", read.id)),
        };
        self.images.insert(write.id, target);
        result
    }

    fn execute(&mut self, pass: &Pass<'_, CpuImage>) -> Result<()> {
        match *pass {
            Pass::Init { mask, seeds } => {
                let [width, height] = seeds.extent();
                self.with_pair(mask, seeds, |src, dst| match (src, dst) {
                    (Texels::Mask(m), Texels::Seeds(out)) => {
                        kernels::init(m, width, height, out);
                        Ok(())
                    }
                    _ => bail!("init expects a mask and a seed image"),
                })
            }
            Pass::Flood { read, write, offset } => {
                let [width, height] = write.extent();
                self.with_pair(read, write, |src, dst| match (src, dst) {
                    (Texels::Seeds(input), Texels::Seeds(out)) => {
                        kernels::flood(input, out, width, height, offset);
                        Ok(())
                    }
                    _ => bail!("flood expects two seed images"),
                })
            }
            Pass::Resolve {
                seeds,
                distance,
                max_distance,
            } => {
                let [width, height] = distance.extent();
                let format = self.distance_format;
                self.with_pair(seeds, distance, |src, dst| match (src, dst) {
                    (Texels::Seeds(input), Texels::Distance(out)) => {
                        kernels::resolve(input, out, width, height, max_distance);
                        if format == DistanceFormat::R16f {
                            for d in out.iter_mut() {
                                *d = f16::from_f32(*d).to_f32();
                            }
                        }
                        Ok(())
                    }
                    _ => bail!("resolve expects a seed image and a distance image"),
                })
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct CpuBackend {
    device: Arc<Mutex<CpuDevice>>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any allocation made while `limit` images are already live.
    pub fn with_allocation_limit(self, limit: usize) -> Self {
        self.device().allocation_limit = Some(limit);
        self
    }

    /// Store distances at the precision and range of `format`.
    pub fn with_distance_format(self, format: DistanceFormat) -> Self {
        self.device().distance_format = format;
        self
    }

    /// Reject the next submission with `message`.
    pub fn fail_next_submit(&self, message: impl Into<String>) {
        self.device().fail_next_submit = Some(message.into());
    }

    pub fn total_allocations(&self) -> usize {
        self.device().total_allocations
    }

    pub fn submissions(&self) -> usize {
        self.device().submissions
    }

    fn device(&self) -> MutexGuard<'_, CpuDevice> {
        self.device.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ComputeBackend for CpuBackend {
    type Image = CpuImage;

    fn allocate(&mut self, kind: ImageKind, width: u32, height: u32) -> Result<CpuImage> {
        let mut device = self.device();
        if let Some(limit) = device.allocation_limit {
            if device.images.len() >= limit {
                bail!("out of device memory: {limit} images already allocated");
            }
        }
        let len = width as usize * height as usize;
        let texels = match kind {
            ImageKind::Mask => Texels::Mask(vec![0; len]),
            ImageKind::Seeds => Texels::Seeds(vec![SeedTexel::EMPTY; len]),
            ImageKind::Distance => Texels::Distance(vec![0.0; len]),
        };
        let id = device.next_id;
        device.next_id += 1;
        device.total_allocations += 1;
        device.images.insert(id, texels);
        Ok(CpuImage {
            id,
            kind,
            width,
            height,
        })
    }

    fn release(&mut self, image: CpuImage) {
        self.device().images.remove(&image.id);
    }

    fn submit(&mut self, mask: &[u32], mask_image: &CpuImage, passes: &[Pass<'_, CpuImage>]) -> Result<()> {
        let mut device = self.device();
        if let Some(message) = device.fail_next_submit.take() {
            bail!("submission rejected: {message}");
        }
        device.submissions += 1;

        match device.images.get_mut(&mask_image.id) {
            Some(Texels::Mask(texels)) if texels.len() == mask.len() => texels.copy_from_slice(mask),
            Some(_) => bail!("image {} is not a {}-texel mask", mask_image.id, mask.len()),
            None => bail!("image {} was released", mask_image.id),
        }

        for pass in passes {
            device.execute(pass)?;
        }
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        // Submissions complete synchronously.
        Ok(())
    }

    fn read_distance(&mut self, image: &CpuImage) -> Result<DistanceField> {
        let device = self.device();
        match device.images.get(&image.id) {
            Some(Texels::Distance(values)) => Ok(DistanceField::new(image.width, image.height, values.clone())?),
            Some(_) => bail!("image {} is not a distance image", image.id),
            None => bail!("image {} was released", image.id),
        }
    }

    fn read_seeds(&mut self, image: &CpuImage) -> Result<Vec<SeedTexel>> {
        let device = self.device();
        match device.images.get(&image.id) {
            Some(Texels::Seeds(texels)) => Ok(texels.clone()),
            Some(_) => bail!("image {} is not a seed image", image.id),
            None => bail!("image {} was released", image.id),
        }
    }

    fn live_images(&self) -> usize {
        self.device().images.len()
    }

    fn max_representable_distance(&self) -> f32 {
        self.device().distance_format.max_value()
    }
}
