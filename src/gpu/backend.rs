use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, warn};
use vulkano::{
    buffer::{Buffer, BufferCreateInfo, BufferUsage},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
        CopyBufferToImageInfo, PrimaryAutoCommandBuffer,
    },
    descriptor_set::{
        allocator::StandardDescriptorSetAllocator, DescriptorSet, WriteDescriptorSet,
    },
    device::{Device, Queue},
    format::{Format, FormatFeatures},
    image::{
        sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo},
        view::ImageView,
        Image, ImageCreateInfo, ImageType, ImageUsage,
    },
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        compute::ComputePipelineCreateInfo, layout::PipelineDescriptorSetLayoutCreateInfo,
        ComputePipeline, Pipeline, PipelineBindPoint, PipelineLayout,
        PipelineShaderStageCreateInfo,
    },
    shader::ShaderModule,
    sync::{self, future::FenceSignalFuture, GpuFuture},
    Validated,
};

use super::readback::HostCopy;
use super::shaders::{flood_cs, group_counts, init_cs, resolve_r16f_cs, resolve_r32f_cs};
use super::VulkanContext;
use crate::backend::{ComputeBackend, ImageKind, Pass};
use crate::config::{DistanceFormat, SamplerFilter, SdfConfig};
use crate::error::{SdfError, SdfResult};
use crate::sdf::{DistanceField, SeedTexel};

type Builder = AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>;

/// A device-local 2D storage image and its default view.
#[derive(Clone)]
pub struct StorageImage {
    image: Arc<Image>,
    view: Arc<ImageView>,
    kind: ImageKind,
}

impl StorageImage {
    pub fn image(&self) -> &Arc<Image> {
        &self.image
    }

    pub fn view(&self) -> &Arc<ImageView> {
        &self.view
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn extent(&self) -> [u32; 2] {
        let extent = self.image.extent();
        [extent[0], extent[1]]
    }
}

fn vk_distance_format(format: DistanceFormat) -> Format {
    match format {
        DistanceFormat::R32f => Format::R32_SFLOAT,
        DistanceFormat::R16f => Format::R16_SFLOAT,
    }
}

/// Runs the jump flood passes as compute dispatches on one queue.
pub struct VulkanBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    init: Arc<ComputePipeline>,
    flood: Arc<ComputePipeline>,
    resolve: Arc<ComputePipeline>,
    distance_format: DistanceFormat,
    sampler: Arc<Sampler>,
    /// Last submission, until someone waits on it.
    in_flight: Option<FenceSignalFuture<Box<dyn GpuFuture>>>,
    live: usize,
}

impl VulkanBackend {
    /// Build the compute pipelines and sampler for `config`.
    ///
    /// Fails with [`SdfError::UnsupportedFormat`] when the device cannot store
    /// the configured distance format.
    pub fn new(ctx: &VulkanContext, config: &SdfConfig) -> SdfResult<Self> {
        config.validate()?;
        let device = ctx.device.clone();

        let features = device
            .physical_device()
            .format_properties(vk_distance_format(config.distance_format))
            .context("Failed to query distance format")
            .map_err(SdfError::Device)?
            .optimal_tiling_features;

        let storage_supported = features.intersects(FormatFeatures::STORAGE_IMAGE)
            && (config.distance_format == DistanceFormat::R32f
                || device.enabled_features().shader_storage_image_extended_formats);
        if !storage_supported {
            return Err(SdfError::UnsupportedFormat(config.distance_format.name()));
        }

        let filter = match config.filter {
            SamplerFilter::Linear if features.intersects(FormatFeatures::SAMPLED_IMAGE_FILTER_LINEAR) => {
                Filter::Linear
            }
            SamplerFilter::Linear => {
                warn!(
                    format = config.distance_format.name(),
                    "linear filtering unsupported, sampling distances with nearest"
                );
                Filter::Nearest
            }
            SamplerFilter::Nearest => Filter::Nearest,
        };

        let sampler = Sampler::new(
            device.clone(),
            SamplerCreateInfo {
                mag_filter: filter,
                min_filter: filter,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )
        .context("Failed to create sampler")
        .map_err(SdfError::Device)?;

        let [init, flood, resolve] =
            create_pipelines(&device, config.distance_format).map_err(SdfError::Device)?;

        debug!(format = config.distance_format.name(), ?filter, "Vulkan SDF backend ready");

        Ok(Self {
            device,
            queue: ctx.queue.clone(),
            memory_allocator: ctx.memory_allocator.clone(),
            command_buffer_allocator: ctx.command_buffer_allocator.clone(),
            descriptor_set_allocator: ctx.descriptor_set_allocator.clone(),
            init,
            flood,
            resolve,
            distance_format: config.distance_format,
            sampler,
            in_flight: None,
            live: 0,
        })
    }

    pub fn distance_format(&self) -> DistanceFormat {
        self.distance_format
    }

    /// Sampler for reading the distance image from other pipelines.
    pub fn sampler(&self) -> &Arc<Sampler> {
        &self.sampler
    }

    /// Descriptor write binding `image` with this backend's sampler, for a
    /// `sampler2D` in a consumer's shader.
    pub fn sampled_write(&self, binding: u32, image: &StorageImage) -> WriteDescriptorSet {
        WriteDescriptorSet::image_view_sampler(binding, image.view.clone(), self.sampler.clone())
    }

    fn begin(&self) -> Result<Builder> {
        AutoCommandBufferBuilder::primary(
            self.command_buffer_allocator.clone(),
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .context("Failed to create command buffer")
    }

    /// Bind `pipeline` with `source` at binding 0 and `target` at binding 1.
    fn bind(
        &self,
        builder: &mut Builder,
        pipeline: &Arc<ComputePipeline>,
        source: &StorageImage,
        target: &StorageImage,
    ) -> Result<()> {
        let layout = pipeline.layout().clone();

        let descriptor_set = DescriptorSet::new(
            self.descriptor_set_allocator.clone(),
            layout.set_layouts()[0].clone(),
            [
                WriteDescriptorSet::image_view(0, source.view.clone()),
                WriteDescriptorSet::image_view(1, target.view.clone()),
            ],
            [],
        )
        .context("Failed to create descriptor set")?;

        builder
            .bind_pipeline_compute(pipeline.clone())
            .context("Failed to bind compute pipeline")?
            .bind_descriptor_sets(PipelineBindPoint::Compute, layout, 0, descriptor_set)
            .context("Failed to bind descriptor sets")?;

        Ok(())
    }

    fn dispatch(builder: &mut Builder, extent: [u32; 2]) -> Result<()> {
        // SAFETY: every kernel touches only the two images bound at set 0,
        // both `extent` sized, and returns early outside them.
        unsafe {
            builder
                .dispatch(group_counts(extent))
                .context("Failed to dispatch")?;
        }
        Ok(())
    }

    fn record(&self, builder: &mut Builder, pass: &Pass<'_, StorageImage>) -> Result<()> {
        match *pass {
            Pass::Init { mask, seeds } => {
                self.bind(builder, &self.init, mask, seeds)?;
                Self::dispatch(builder, seeds.extent())
            }
            Pass::Flood { read, write, offset } => {
                self.bind(builder, &self.flood, read, write)?;
                let offset = i32::try_from(offset).context("Flood offset out of range")?;
                builder
                    .push_constants(self.flood.layout().clone(), 0, flood_cs::PushConstants { offset })
                    .context("Failed to push flood offset")?;
                Self::dispatch(builder, write.extent())
            }
            Pass::Resolve {
                seeds,
                distance,
                max_distance,
            } => {
                self.bind(builder, &self.resolve, seeds, distance)?;
                let layout = self.resolve.layout().clone();
                match self.distance_format {
                    DistanceFormat::R32f => builder.push_constants(
                        layout,
                        0,
                        resolve_r32f_cs::PushConstants { max_distance },
                    ),
                    DistanceFormat::R16f => builder.push_constants(
                        layout,
                        0,
                        resolve_r16f_cs::PushConstants { max_distance },
                    ),
                }
                .context("Failed to push resolve parameters")?;
                Self::dispatch(builder, distance.extent())
            }
        }
    }

    fn execute_and_wait(&mut self, builder: Builder) -> Result<()> {
        let command_buffer = builder.build().context("Failed to build command buffer")?;

        let future = sync::now(self.device.clone())
            .then_execute(self.queue.clone(), command_buffer)
            .context("Failed to execute")?
            .then_signal_fence_and_flush()
            .map_err(Validated::unwrap)
            .context("Failed to flush")?;

        future.wait(None).context("Failed to wait for GPU")?;
        Ok(())
    }

    fn read_back(&mut self, image: &StorageImage) -> Result<HostCopy> {
        self.wait()?;
        let mut builder = self.begin()?;
        let copy = HostCopy::record(&mut builder, self.memory_allocator.clone(), image.image.clone())?;
        self.execute_and_wait(builder)?;
        Ok(copy)
    }
}

fn create_pipelines(device: &Arc<Device>, distance_format: DistanceFormat) -> Result<[Arc<ComputePipeline>; 3]> {
    let init = init_cs::load(device.clone()).context("Failed to load init shader")?;
    let flood = flood_cs::load(device.clone()).context("Failed to load flood shader")?;
    let resolve = match distance_format {
        DistanceFormat::R32f => resolve_r32f_cs::load(device.clone()),
        DistanceFormat::R16f => resolve_r16f_cs::load(device.clone()),
    }
    .context("Failed to load resolve shader")?;

    Ok([
        compute_pipeline(device, init)?,
        compute_pipeline(device, flood)?,
        compute_pipeline(device, resolve)?,
    ])
}

fn compute_pipeline(device: &Arc<Device>, module: Arc<ShaderModule>) -> Result<Arc<ComputePipeline>> {
    let entry = module.entry_point("main").context("Shader has no main entry point")?;
    let stage = PipelineShaderStageCreateInfo::new(entry);

    let layout = PipelineLayout::new(
        device.clone(),
        PipelineDescriptorSetLayoutCreateInfo::from_stages([&stage])
            .into_pipeline_layout_create_info(device.clone())
            .context("Failed to create pipeline layout info")?,
    )
    .context("Failed to create pipeline layout")?;

    ComputePipeline::new(
        device.clone(),
        None,
        ComputePipelineCreateInfo::stage_layout(stage, layout),
    )
    .context("Failed to create compute pipeline")
}

impl ComputeBackend for VulkanBackend {
    type Image = StorageImage;

    fn allocate(&mut self, kind: ImageKind, width: u32, height: u32) -> Result<StorageImage> {
        let (format, usage) = match kind {
            ImageKind::Mask => (Format::R32_UINT, ImageUsage::STORAGE | ImageUsage::TRANSFER_DST),
            ImageKind::Seeds => (
                Format::R32G32B32A32_SFLOAT,
                ImageUsage::STORAGE | ImageUsage::TRANSFER_SRC,
            ),
            ImageKind::Distance => (
                vk_distance_format(self.distance_format),
                ImageUsage::STORAGE | ImageUsage::SAMPLED | ImageUsage::TRANSFER_SRC,
            ),
        };

        let image = Image::new(
            self.memory_allocator.clone(),
            ImageCreateInfo {
                image_type: ImageType::Dim2d,
                format,
                extent: [width, height, 1],
                usage,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE,
                ..Default::default()
            },
        )
        .with_context(|| format!("Failed to create {kind:?} image"))?;

        let view = ImageView::new_default(image.clone()).context("Failed to create image view")?;

        self.live += 1;
        Ok(StorageImage { image, view, kind })
    }

    fn release(&mut self, image: StorageImage) {
        // Memory is freed once the last command buffer using it retires.
        drop(image);
        self.live = self.live.saturating_sub(1);
    }

    fn submit(&mut self, mask: &[u32], mask_image: &StorageImage, passes: &[Pass<'_, StorageImage>]) -> Result<()> {
        self.wait()?;

        let upload = Buffer::from_iter(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::TRANSFER_SRC,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            mask.iter().copied(),
        )
        .context("Failed to create mask upload buffer")?;

        let mut builder = self.begin()?;
        builder
            .copy_buffer_to_image(CopyBufferToImageInfo::buffer_image(upload, mask_image.image.clone()))
            .context("Failed to copy mask to image")?;

        for pass in passes {
            self.record(&mut builder, pass)?;
        }

        let command_buffer = builder.build().context("Failed to build command buffer")?;

        let future = sync::now(self.device.clone())
            .then_execute(self.queue.clone(), command_buffer)
            .context("Failed to execute passes")?
            .boxed()
            .then_signal_fence_and_flush()
            .map_err(Validated::unwrap)
            .context("Failed to flush passes")?;

        self.in_flight = Some(future);
        Ok(())
    }

    fn wait(&mut self) -> Result<()> {
        if let Some(future) = self.in_flight.take() {
            future.wait(None).context("Failed to wait for compute passes")?;
        }
        Ok(())
    }

    fn read_distance(&mut self, image: &StorageImage) -> Result<DistanceField> {
        let copy = self.read_back(image)?;
        let [width, height] = copy.extent();
        Ok(DistanceField::new(width, height, copy.to_f32()?)?)
    }

    fn read_seeds(&mut self, image: &StorageImage) -> Result<Vec<SeedTexel>> {
        self.read_back(image)?.to_seeds()
    }

    fn live_images(&self) -> usize {
        self.live
    }

    fn max_representable_distance(&self) -> f32 {
        self.distance_format.max_value()
    }
}
