//! GPU port consumed by the projected cube map.
//!
//! [`GpuDevice`] is the only way the core allocates GPU objects. Handles are
//! expected to be cheap, reference-counted clones: a command waiting in a
//! frame keeps its resources alive independently of the owner that created
//! them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Channel layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Red,
    Rg,
    Rgba,
}

impl PixelFormat {
    /// Number of channels.
    pub fn components(self) -> u32 {
        match self {
            Self::Red => 1,
            Self::Rg => 2,
            Self::Rgba => 4,
        }
    }
}

/// Numeric type of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelDatatype {
    UnsignedByte,
    HalfFloat,
    Float,
}

impl PixelDatatype {
    /// Size of one channel in bytes.
    pub fn size_in_bytes(self) -> u32 {
        match self {
            Self::UnsignedByte => 1,
            Self::HalfFloat => 2,
            Self::Float => 4,
        }
    }
}

/// Usage hint for buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferUsage {
    /// Written once, never updated.
    #[default]
    Static,
    /// Rewritten from the CPU.
    Dynamic,
}

/// A named float vertex attribute bound to a shader location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub location: u32,
    /// Number of `f32` components.
    pub components: u32,
    /// Byte offset inside one vertex.
    pub offset: u64,
}

/// Everything needed to assemble a vertex array.
pub struct VertexArrayDescriptor<'a, B> {
    pub label: &'a str,
    pub vertex_buffer: B,
    pub stride: u64,
    pub attributes: &'a [VertexAttribute],
    pub index_buffer: B,
    pub index_count: u32,
}

/// Source and bindings of a shader program.
///
/// Programs are cached by `key`: requesting the same key twice returns the
/// already compiled program.
#[derive(Debug, Clone)]
pub struct ShaderProgramDescriptor<'a> {
    pub key: &'a str,
    pub vertex_source: &'a str,
    pub fragment_source: &'a str,
    pub attribute_locations: &'a [VertexAttribute],
}

/// A 2D texture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub pixel_datatype: PixelDatatype,
}

/// Read-only view of an input cube map.
pub trait CubeMapTexture {
    /// Edge length of one face in texels.
    fn width(&self) -> u32;

    fn pixel_format(&self) -> PixelFormat;

    fn pixel_datatype(&self) -> PixelDatatype;
}

impl<T: CubeMapTexture + ?Sized> CubeMapTexture for Arc<T> {
    fn width(&self) -> u32 {
        (**self).width()
    }

    fn pixel_format(&self) -> PixelFormat {
        (**self).pixel_format()
    }

    fn pixel_datatype(&self) -> PixelDatatype {
        (**self).pixel_datatype()
    }
}

/// Allocation services of a rendering backend.
pub trait GpuDevice {
    type Buffer;
    type VertexArray: Clone;
    type ShaderProgram: Clone;
    type Texture: Clone;
    type CubeMap: CubeMapTexture + Clone;

    /// Creates a vertex buffer from float data.
    fn create_vertex_buffer(&self, label: &str, data: &[f32], usage: BufferUsage)
        -> Result<Self::Buffer>;

    /// Creates an index buffer.
    fn create_index_buffer(&self, label: &str, data: &[u32], usage: BufferUsage)
        -> Result<Self::Buffer>;

    /// Binds attributes and an index buffer into a vertex array.
    fn create_vertex_array(
        &self,
        descriptor: VertexArrayDescriptor<'_, Self::Buffer>,
    ) -> Result<Self::VertexArray>;

    /// Compiles a program, or returns the cached one with the same key.
    fn shader_program(&self, descriptor: &ShaderProgramDescriptor<'_>)
        -> Result<Self::ShaderProgram>;

    /// Creates a 2D texture usable as a render target and as a sampled input.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<Self::Texture>;

    /// Whether textures of this format can be rendered to and sampled.
    fn supports_render_target(&self, format: PixelFormat, datatype: PixelDatatype) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Face(u32);

    impl CubeMapTexture for Face {
        fn width(&self) -> u32 {
            self.0
        }

        fn pixel_format(&self) -> PixelFormat {
            PixelFormat::Rgba
        }

        fn pixel_datatype(&self) -> PixelDatatype {
            PixelDatatype::HalfFloat
        }
    }

    #[test]
    fn test_arc_forwards_cube_map_queries() {
        let cube = Arc::new(Face(64));
        assert_eq!(cube.width(), 64);
        assert_eq!(cube.pixel_datatype(), PixelDatatype::HalfFloat);
    }

    #[test]
    fn test_texel_size() {
        let bytes = PixelFormat::Rgba.components() * PixelDatatype::HalfFloat.size_in_bytes();
        assert_eq!(bytes, 8);
        assert_eq!(PixelFormat::Red.components() * PixelDatatype::Float.size_in_bytes(), 4);
    }
}
