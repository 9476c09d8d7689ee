//! Reading textures back to the CPU and saving them as images.

use std::path::Path;

use half::f16;
use image::{ImageBuffer, Rgba};

use crate::buffer;
use crate::device::WgpuDevice;
use crate::error::{RenderError, RenderResult};
use crate::texture::GpuTexture;

/// Rounds a row of `width` texels up to the copy alignment wgpu requires.
pub fn aligned_bytes_per_row(width: u32, bytes_per_texel: u32) -> u32 {
    let unpadded = width * bytes_per_texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Converts tightly packed texels of `format` to RGBA8.
///
/// Float channels are clamped to [0, 1].
pub fn to_rgba8(format: wgpu::TextureFormat, data: &[u8]) -> RenderResult<Vec<u8>> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Ok(data.to_vec()),
        wgpu::TextureFormat::Rgba16Float => Ok(data
            .chunks_exact(2)
            .map(|bytes| unorm8(f16::from_le_bytes([bytes[0], bytes[1]]).to_f32()))
            .collect()),
        wgpu::TextureFormat::Rgba32Float => Ok(data
            .chunks_exact(4)
            .map(|bytes| unorm8(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])))
            .collect()),
        other => Err(RenderError::UnsupportedReadbackFormat(other)),
    }
}

impl WgpuDevice {
    /// Copies `texture` to the CPU and returns it as tightly packed RGBA8 rows.
    ///
    /// Blocks until the GPU has finished every submitted pass.
    pub fn read_texture_rgba8(&self, texture: &GpuTexture) -> RenderResult<Vec<u8>> {
        let format = texture.format();
        let bytes_per_texel = match format {
            wgpu::TextureFormat::Rgba8Unorm
            | wgpu::TextureFormat::Rgba16Float
            | wgpu::TextureFormat::Rgba32Float => format.block_copy_size(None).unwrap_or(4),
            other => return Err(RenderError::UnsupportedReadbackFormat(other)),
        };
        let width = texture.width();
        let height = texture.height();
        let bytes_per_row = aligned_bytes_per_row(width, bytes_per_texel);

        let readback = buffer::create_readback_buffer(
            &self.device,
            u64::from(bytes_per_row) * u64::from(height),
            Some("octamap readback buffer"),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("octamap readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: texture.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::BufferMapFailed)?
            .map_err(|_| RenderError::BufferMapFailed)?;

        // Copy data, removing row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (width * bytes_per_texel) as usize;
        let mut texels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            texels.extend_from_slice(&data[start..start + row_bytes]);
        }
        drop(data);
        readback.unmap();

        to_rgba8(format, &texels)
    }
}

/// Saves RGBA8 pixel data to a `.png`, `.jpg` or `.jpeg` file.
pub fn save_rgba8_image(
    path: impl AsRef<Path>,
    data: &[u8],
    width: u32,
    height: u32,
) -> RenderResult<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, data.to_vec()).ok_or(RenderError::InvalidImageData)?;

    match extension.as_str() {
        "png" => img.save_with_format(path, image::ImageFormat::Png)?,
        "jpg" | "jpeg" => {
            // Convert to RGB for JPEG (no alpha)
            let rgb_img = image::DynamicImage::ImageRgba8(img).to_rgb8();
            rgb_img.save_with_format(path, image::ImageFormat::Jpeg)?;
        }
        _ => return Err(RenderError::UnsupportedImageFormat(extension)),
    }

    log::debug!("saved {width}x{height} image to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_alignment() {
        assert_eq!(aligned_bytes_per_row(64, 4), 256);
        assert_eq!(aligned_bytes_per_row(65, 4), 512);
        assert_eq!(aligned_bytes_per_row(194, 8), 1792);
    }

    #[test]
    fn test_half_float_conversion_clamps() {
        let texel: Vec<u8> = [1.0f32, 0.5, -2.0, 8.0]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect();
        assert_eq!(
            to_rgba8(wgpu::TextureFormat::Rgba16Float, &texel).unwrap(),
            vec![255, 128, 0, 255]
        );
    }

    #[test]
    fn test_float_conversion() {
        let texel: Vec<u8> = [0.0f32, 1.0, 0.25, 1.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(
            to_rgba8(wgpu::TextureFormat::Rgba32Float, &texel).unwrap(),
            vec![0, 255, 64, 255]
        );
    }

    #[test]
    fn test_unsupported_readback_format() {
        assert!(matches!(
            to_rgba8(wgpu::TextureFormat::R8Unorm, &[0]),
            Err(RenderError::UnsupportedReadbackFormat(wgpu::TextureFormat::R8Unorm))
        ));
    }

    #[test]
    fn test_rejects_short_image_data() {
        let result = save_rgba8_image("atlas.png", &[0; 12], 2, 2);
        assert!(matches!(result, Err(RenderError::InvalidImageData)));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        let result = save_rgba8_image("atlas.tga", &[0; 16], 2, 2);
        assert!(matches!(result, Err(RenderError::UnsupportedImageFormat(ext)) if ext == "tga"));
    }
}
