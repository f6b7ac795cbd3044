//! Device image to host copies.

use anyhow::{Context, Result, bail, ensure};
use half::f16;
use std::sync::Arc;
use vulkano::{
    DeviceSize,
    buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{AutoCommandBufferBuilder, CopyImageToBufferInfo, PrimaryAutoCommandBuffer},
    format::Format,
    image::Image,
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
};

use crate::sdf::SeedTexel;

/// Bytes per texel of the formats the pipeline reads back.
fn texel_bytes(format: Format) -> Result<usize> {
    Ok(match format {
        Format::R16_SFLOAT => 2,
        Format::R32_SFLOAT => 4,
        Format::R32G32B32A32_SFLOAT => 16,
        other => bail!("no host decoding for {other:?}"),
    })
}

fn decode_distances(format: Format, bytes: &[u8]) -> Result<Vec<f32>> {
    match format {
        Format::R32_SFLOAT => Ok(bytemuck::pod_collect_to_vec::<u8, f32>(bytes)),
        Format::R16_SFLOAT => Ok(bytes
            .chunks_exact(2)
            .map(|texel| f16::from_le_bytes([texel[0], texel[1]]).to_f32())
            .collect()),
        other => bail!("cannot decode {other:?} as distances"),
    }
}

fn decode_seeds(format: Format, bytes: &[u8]) -> Result<Vec<SeedTexel>> {
    ensure!(
        format == Format::R32G32B32A32_SFLOAT,
        "cannot decode {format:?} as seeds"
    );
    Ok(bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(bytes)
        .into_iter()
        .map(SeedTexel::from_texel)
        .collect())
}

/// Host-visible copy of one storage image. Contents are valid once the
/// command buffer it was recorded into has completed.
pub struct HostCopy {
    buffer: Subbuffer<[u8]>,
    width: u32,
    height: u32,
    format: Format,
}

impl HostCopy {
    /// Allocate a buffer sized for `image` and record the copy into `builder`.
    pub fn record(
        builder: &mut AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>,
        memory_allocator: Arc<StandardMemoryAllocator>,
        image: Arc<Image>,
    ) -> Result<Self> {
        let [width, height, _] = image.extent();
        let format = image.format();
        let len = width as usize * height as usize * texel_bytes(format)?;

        let buffer = Buffer::new_slice::<u8>(
            memory_allocator,
            BufferCreateInfo {
                usage: BufferUsage::TRANSFER_DST,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            len as DeviceSize,
        )
        .with_context(|| format!("Failed to allocate {len} byte readback buffer"))?;

        builder
            .copy_image_to_buffer(CopyImageToBufferInfo::image_buffer(image, buffer.clone()))
            .context("Failed to record image readback")?;

        Ok(Self {
            buffer,
            width,
            height,
            format,
        })
    }

    pub fn extent(&self) -> [u32; 2] {
        [self.width, self.height]
    }

    pub fn to_f32(&self) -> Result<Vec<f32>> {
        let content = self.buffer.read().context("Failed to map readback buffer")?;
        decode_distances(self.format, &content)
    }

    pub fn to_seeds(&self) -> Result<Vec<SeedTexel>> {
        let content = self.buffer.read().context("Failed to map readback buffer")?;
        decode_seeds(self.format, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::Uv;

    #[test]
    fn test_only_pipeline_formats_are_readable() {
        assert_eq!(texel_bytes(Format::R16_SFLOAT).unwrap(), 2);
        assert_eq!(texel_bytes(Format::R32G32B32A32_SFLOAT).unwrap(), 16);
        assert!(texel_bytes(Format::R8G8B8A8_UNORM).is_err());
    }

    #[test]
    fn test_half_distances_decode() {
        let bytes: Vec<u8> = [-1.5_f32, 65504.0]
            .iter()
            .flat_map(|&d| f16::from_f32(d).to_le_bytes())
            .collect();
        assert_eq!(decode_distances(Format::R16_SFLOAT, &bytes).unwrap(), vec![-1.5, 65504.0]);
    }

    #[test]
    fn test_seed_sentinel_decodes_as_absent() {
        let texel = [0.25_f32, 0.5, -1.0, -1.0];
        let seeds = decode_seeds(Format::R32G32B32A32_SFLOAT, bytemuck::cast_slice::<f32, u8>(&texel)).unwrap();
        assert_eq!(seeds, vec![SeedTexel::inside(Uv { u: 0.25, v: 0.5 })]);
        assert!(decode_seeds(Format::R32_SFLOAT, &[0; 16]).is_err());
    }
}
