//! GPU signed distance fields from binary masks using the Jump Flood Algorithm.
//!
//! A [`Pipeline`] is built for fixed dimensions on a [`ComputeBackend`]. Each
//! [`Pipeline::run`] uploads a `width * height` occupancy mask, seeds two
//! ping-pong seed images, floods them in `floor(log2(max(width, height)))`
//! passes, and resolves a single-channel distance image: negative inside the
//! mask, positive outside, in pixels of the mask.
//!
//! [`VulkanBackend`] runs the passes as vulkano compute shaders;
//! [`CpuBackend`] runs the same kernels on the host and counts allocations.
//!
//! ```no_run
//! use jfa_sdf::{Mask, Pipeline, SdfConfig, VulkanBackend, VulkanContext};
//!
//! # fn main() -> Result<(), jfa_sdf::SdfError> {
//! let config = SdfConfig::default();
//! let ctx = VulkanContext::headless(config.device)?;
//! let backend = VulkanBackend::new(&ctx, &config)?;
//!
//! let mask = Mask::from_fn(64, 64, |x, y| (x as i32 - 32).pow(2) + (y as i32 - 32).pow(2) < 400)?;
//! let mut pipeline = Pipeline::with_config(backend, 64, 64, &config)?;
//! pipeline.run_mask(&mask)?;
//! let field = pipeline.read_distance()?;
//! assert!(field.get(32, 32) < 0.0);
//! pipeline.destroy()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod gpu;
pub mod mask;
pub mod sdf;

pub use backend::{ComputeBackend, CpuBackend, ImageKind, Pass};
pub use config::{DEFAULT_MAX_DISTANCE, DevicePreference, DistanceFormat, SamplerFilter, SdfConfig};
pub use error::{SdfError, SdfResult};
pub use gpu::{StorageImage, VulkanBackend, VulkanContext};
pub use mask::{DEFAULT_COVERAGE_THRESHOLD, Mask};
pub use sdf::{DistanceField, Pipeline, SeedTexel, Uv};
