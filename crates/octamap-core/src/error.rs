//! Error types for octamap.

use thiserror::Error;

use crate::device::{PixelDatatype, PixelFormat};

/// The main error type for octamap operations.
#[derive(Error, Debug)]
pub enum OctamapError {
    /// The projected cube map was used after `destroy()`.
    #[error("octahedral projected cube map used after destroy()")]
    Destroyed,

    /// A previous build failed part way; only `destroy()` is valid now.
    #[error("a previous build failed part way; destroy() the instance")]
    IncompleteBuild,

    /// The frame state carries no rendering context.
    #[error("frame state has no rendering context")]
    MissingRenderContext,

    /// No input cube maps were supplied.
    #[error("no input cube maps")]
    NoCubeMaps,

    /// An input cube map cannot be projected.
    #[error("cube map level {level} is invalid: {reason}")]
    InvalidCubeMap { level: usize, reason: String },

    /// The device cannot render to the requested texture format.
    #[error("device cannot render to {format:?}/{datatype:?} textures")]
    UnsupportedFormat {
        format: PixelFormat,
        datatype: PixelDatatype,
    },

    /// The requested level count does not fit into the atlas.
    #[error("{level_count} levels do not fit into an atlas with original size {original_size}")]
    AtlasOverflow {
        original_size: u32,
        level_count: usize,
    },

    /// The requested level count is outside the supported range.
    #[error("level count {0} is outside 1..={max}", max = crate::layout::MAX_LEVELS)]
    InvalidLevelCount(usize),

    /// A GPU resource could not be allocated.
    #[error("{resource} allocation failed: {message}")]
    ResourceAllocation {
        resource: &'static str,
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl OctamapError {
    /// Creates a resource allocation error.
    pub fn allocation(resource: &'static str, message: impl Into<String>) -> Self {
        Self::ResourceAllocation {
            resource,
            message: message.into(),
        }
    }
}

/// A specialized Result type for octamap operations.
pub type Result<T> = std::result::Result<T, OctamapError>;
