//! Vulkan compute backend.

mod backend;
mod context;
mod readback;
mod shaders;

pub use backend::{StorageImage, VulkanBackend};
pub use context::VulkanContext;
