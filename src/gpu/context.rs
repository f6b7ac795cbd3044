use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use vulkano::{
    command_buffer::allocator::StandardCommandBufferAllocator,
    descriptor_set::allocator::StandardDescriptorSetAllocator,
    device::{
        physical::{PhysicalDevice, PhysicalDeviceType},
        Device, DeviceCreateInfo, DeviceFeatures, Queue, QueueCreateInfo, QueueFlags,
    },
    instance::{Instance, InstanceCreateInfo},
    memory::allocator::StandardMemoryAllocator,
    VulkanLibrary,
};

use crate::config::DevicePreference;
use crate::error::{SdfError, SdfResult};

/// Headless Vulkan context with one compute-capable queue.
///
/// Cheap to share: every field is reference counted, and each
/// [`VulkanBackend`](super::VulkanBackend) keeps its own clones.
#[derive(Clone)]
pub struct VulkanContext {
    pub instance: Arc<Instance>,
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub memory_allocator: Arc<StandardMemoryAllocator>,
    pub command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    pub descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
}

impl VulkanContext {
    /// Open a compute device without any window system integration.
    pub fn headless(preference: DevicePreference) -> SdfResult<Self> {
        Self::create(preference).map_err(SdfError::NoDevice)
    }

    fn create(preference: DevicePreference) -> Result<Self> {
        let library = VulkanLibrary::new().context("No Vulkan library found")?;

        let instance = Instance::new(library, InstanceCreateInfo::default())
            .context("Failed to create Vulkan instance")?;

        let (physical_device, queue_family_index) = instance
            .enumerate_physical_devices()
            .context("Failed to enumerate physical devices")?
            .filter_map(|p| {
                p.queue_family_properties()
                    .iter()
                    .position(|q| q.queue_flags.intersects(QueueFlags::COMPUTE))
                    .map(|i| (p, i as u32))
            })
            .min_by_key(|(p, _)| device_rank(preference, p.properties().device_type))
            .context("No compute-capable device found")?;

        info!(
            device = %physical_device.properties().device_name,
            kind = ?physical_device.properties().device_type,
            "Using Vulkan device"
        );

        let (device, mut queues) = Device::new(
            physical_device.clone(),
            DeviceCreateInfo {
                enabled_features: optional_features(&physical_device),
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .context("Failed to create device")?;

        let queue = queues.next().context("No queue available")?;

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
            device.clone(),
            Default::default(),
        ));
        let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
            device.clone(),
            Default::default(),
        ));

        Ok(Self {
            instance,
            device,
            queue,
            memory_allocator,
            command_buffer_allocator,
            descriptor_set_allocator,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device.physical_device().properties().device_name
    }
}

/// Lower is better.
fn device_rank(preference: DevicePreference, device_type: PhysicalDeviceType) -> u32 {
    let base = match device_type {
        PhysicalDeviceType::DiscreteGpu => 0,
        PhysicalDeviceType::IntegratedGpu => 1,
        PhysicalDeviceType::VirtualGpu => 2,
        PhysicalDeviceType::Cpu => 3,
        PhysicalDeviceType::Other => 4,
        _ => 5,
    };
    let preferred = match preference {
        DevicePreference::Auto => return base,
        DevicePreference::Discrete => PhysicalDeviceType::DiscreteGpu,
        DevicePreference::Integrated => PhysicalDeviceType::IntegratedGpu,
        DevicePreference::Cpu => PhysicalDeviceType::Cpu,
    };
    if device_type == preferred { 0 } else { base + 1 }
}

/// `r16f` storage images need extended storage formats; enable them when
/// the device has them and let backend construction report the rest.
fn optional_features(physical_device: &PhysicalDevice) -> DeviceFeatures {
    DeviceFeatures {
        shader_storage_image_extended_formats: physical_device
            .supported_features()
            .shader_storage_image_extended_formats,
        ..DeviceFeatures::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_prefers_discrete() {
        let discrete = device_rank(DevicePreference::Auto, PhysicalDeviceType::DiscreteGpu);
        let integrated = device_rank(DevicePreference::Auto, PhysicalDeviceType::IntegratedGpu);
        let cpu = device_rank(DevicePreference::Auto, PhysicalDeviceType::Cpu);
        assert!(discrete < integrated);
        assert!(integrated < cpu);
    }

    #[test]
    fn test_explicit_preference_wins() {
        let cpu = device_rank(DevicePreference::Cpu, PhysicalDeviceType::Cpu);
        let discrete = device_rank(DevicePreference::Cpu, PhysicalDeviceType::DiscreteGpu);
        assert!(cpu < discrete);

        let integrated = device_rank(DevicePreference::Integrated, PhysicalDeviceType::IntegratedGpu);
        let discrete = device_rank(DevicePreference::Integrated, PhysicalDeviceType::DiscreteGpu);
        assert!(integrated < discrete);
    }
}
