//! Rendering error types.

use octamap_core::OctamapError;
use thiserror::Error;

/// Errors that can occur in the wgpu backend.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Shader compilation failed.
    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    /// Pipeline creation failed.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailed(String),

    /// Buffer creation failed.
    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Reading a texture back is not supported for this format.
    #[error("cannot read back {0:?} textures")]
    UnsupportedReadbackFormat(wgpu::TextureFormat),

    /// Failed to map a readback buffer.
    #[error("failed to map readback buffer")]
    BufferMapFailed,

    /// Pixel data does not match the image dimensions.
    #[error("invalid image data")]
    InvalidImageData,

    /// Unsupported image file extension.
    #[error("unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Image encoding or file error.
    #[error("image error: {0}")]
    ImageError(#[from] image::ImageError),
}

impl RenderError {
    /// Maps a captured wgpu error onto the matching variant.
    pub(crate) fn from_scope(error: &wgpu::Error, wrap: fn(String) -> RenderError) -> Self {
        match error {
            wgpu::Error::OutOfMemory { .. } => Self::OutOfMemory,
            other => wrap(other.to_string()),
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            Self::ShaderCompilationFailed(_) => "shader program",
            Self::PipelineCreationFailed(_) => "pipeline",
            Self::BufferCreationFailed(_) => "buffer",
            Self::TextureCreationFailed(_) => "texture",
            Self::OutOfMemory => "gpu memory",
            _ => "device",
        }
    }
}

impl From<RenderError> for OctamapError {
    fn from(error: RenderError) -> Self {
        OctamapError::allocation(error.resource(), error.to_string())
    }
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converts_to_allocation_error() {
        let error: OctamapError = RenderError::BufferCreationFailed("empty".into()).into();
        match error {
            OctamapError::ResourceAllocation { resource, message } => {
                assert_eq!(resource, "buffer");
                assert!(message.contains("empty"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
