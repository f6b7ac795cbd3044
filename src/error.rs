//! Error types for distance field generation.
//!
//! Every failure surfaces to the caller. Nothing here is recovered by
//! substituting default data, so a pipeline either produces the field it was
//! asked for or reports why it could not.

use thiserror::Error;

/// Errors raised while constructing or running a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SdfError {
    /// Width or height was zero.
    #[error("invalid pipeline dimensions {width}x{height}: both must be positive")]
    InvalidDimensions {
        /// Requested width in texels.
        width: u32,
        /// Requested height in texels.
        height: u32,
    },

    /// The mask does not hold exactly `width * height` values.
    #[error("mask has {actual} values, expected {expected}")]
    MaskSizeMismatch {
        /// `width * height` of the pipeline.
        expected: usize,
        /// Length of the supplied mask.
        actual: usize,
    },

    /// A [`Mask`](crate::Mask) was built for different dimensions than the pipeline.
    #[error("mask is {mask:?}, pipeline is {pipeline:?}")]
    MaskDimensionMismatch {
        /// Mask `[width, height]`.
        mask: [u32; 2],
        /// Pipeline `[width, height]`.
        pipeline: [u32; 2],
    },

    /// Resource allocation failed while constructing the pipeline.
    #[error("failed to allocate pipeline resources")]
    Allocation(#[source] anyhow::Error),

    /// The device rejected or failed to execute submitted work.
    #[error("device error")]
    Device(#[source] anyhow::Error),

    /// A readback was requested but no run has completed since construction
    /// or since the last failed submission.
    #[error("no completed run to read back")]
    NoResult,

    /// No usable compute device could be opened.
    #[error("no compute device available")]
    NoDevice(#[source] anyhow::Error),

    /// The device cannot use the requested distance format as a storage image.
    #[error("distance format {0} is not supported as a storage image on this device")]
    UnsupportedFormat(&'static str),

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file is not valid JSON for [`SdfConfig`](crate::SdfConfig).
    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),
}

/// Result alias for distance field operations.
pub type SdfResult<T> = Result<T, SdfError>;
