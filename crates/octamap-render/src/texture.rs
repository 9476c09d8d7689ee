//! Flat textures and input cube maps.

use glam::Vec4;
use octamap_core::{CubeMapTexture, PixelDatatype, PixelFormat};

/// Maps a channel layout and numeric type onto a wgpu format.
pub fn texture_format(format: PixelFormat, datatype: PixelDatatype) -> wgpu::TextureFormat {
    use wgpu::TextureFormat as F;

    match (format, datatype) {
        (PixelFormat::Red, PixelDatatype::UnsignedByte) => F::R8Unorm,
        (PixelFormat::Red, PixelDatatype::HalfFloat) => F::R16Float,
        (PixelFormat::Red, PixelDatatype::Float) => F::R32Float,
        (PixelFormat::Rg, PixelDatatype::UnsignedByte) => F::Rg8Unorm,
        (PixelFormat::Rg, PixelDatatype::HalfFloat) => F::Rg16Float,
        (PixelFormat::Rg, PixelDatatype::Float) => F::Rg32Float,
        (PixelFormat::Rgba, PixelDatatype::UnsignedByte) => F::Rgba8Unorm,
        (PixelFormat::Rgba, PixelDatatype::HalfFloat) => F::Rgba16Float,
        (PixelFormat::Rgba, PixelDatatype::Float) => F::Rgba32Float,
    }
}

/// A 2D texture with a full view, usable as render target and sampled input.
#[derive(Debug)]
pub struct GpuTexture {
    pub(crate) texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) format: wgpu::TextureFormat,
}

impl GpuTexture {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            format,
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    pub fn height(&self) -> u32 {
        self.texture.height()
    }
}

/// A six-layer texture viewed as a cube.
///
/// Layers follow the wgpu face order: +X, -X, +Y, -Y, +Z, -Z.
#[derive(Debug)]
pub struct GpuCubeMap {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    pixel_format: PixelFormat,
    pixel_datatype: PixelDatatype,
}

impl GpuCubeMap {
    /// Allocates an empty cube map with `width`-texel faces.
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        pixel_format: PixelFormat,
        pixel_datatype: PixelDatatype,
    ) -> Self {
        let format = texture_format(pixel_format, pixel_datatype);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height: width,
                // A cube has 6 sides, so we need 6 layers
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });

        Self {
            texture,
            view,
            pixel_format,
            pixel_datatype,
        }
    }

    /// Creates an RGBA8 cube map whose faces are filled with one color each.
    pub fn from_face_colors(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        width: u32,
        colors: [Vec4; 6],
    ) -> Self {
        let cube = Self::new(device, label, width, PixelFormat::Rgba, PixelDatatype::UnsignedByte);
        for (face, color) in colors.iter().enumerate() {
            let texel = (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
            let texel = [texel.x as u8, texel.y as u8, texel.z as u8, texel.w as u8];
            let data: Vec<u8> = texel.repeat((width * width) as usize);
            cube.write_face(queue, face as u32, &data);
        }
        cube
    }

    /// Uploads tightly packed texel data for one face.
    pub fn write_face(&self, queue: &wgpu::Queue, face: u32, data: &[u8]) {
        let width = self.texture.width();
        let bytes_per_texel = self.pixel_format.components() * self.pixel_datatype.size_in_bytes();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: 0,
                    z: face,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * bytes_per_texel),
                rows_per_image: Some(width),
            },
            wgpu::Extent3d {
                width,
                height: width,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }
}

impl CubeMapTexture for GpuCubeMap {
    fn width(&self) -> u32 {
        self.texture.width()
    }

    fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn pixel_datatype(&self) -> PixelDatatype {
        self.pixel_datatype
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_format_mapping() {
        assert_eq!(
            texture_format(PixelFormat::Rgba, PixelDatatype::HalfFloat),
            wgpu::TextureFormat::Rgba16Float
        );
        assert_eq!(
            texture_format(PixelFormat::Red, PixelDatatype::UnsignedByte),
            wgpu::TextureFormat::R8Unorm
        );
    }

    #[test]
    fn test_texel_sizes_agree_with_wgpu() {
        let formats = [PixelFormat::Red, PixelFormat::Rg, PixelFormat::Rgba];
        let datatypes = [
            PixelDatatype::UnsignedByte,
            PixelDatatype::HalfFloat,
            PixelDatatype::Float,
        ];
        for format in formats {
            for datatype in datatypes {
                let wgpu_size = texture_format(format, datatype).block_copy_size(None);
                assert_eq!(
                    wgpu_size,
                    Some(format.components() * datatype.size_in_bytes()),
                    "{format:?}/{datatype:?}"
                );
            }
        }
    }
}
