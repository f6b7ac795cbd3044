//! Signed distance fields by jump flooding.

mod distance;
pub mod kernels;
mod pipeline;
mod schedule;
mod seed;

pub use distance::DistanceField;
pub use pipeline::Pipeline;
pub use schedule::{FloodOffsets, flood_offsets, flood_pass_count};
pub use seed::{NO_SEED, SeedTexel, Uv};
