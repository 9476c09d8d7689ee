//! wgpu implementation of the octamap allocation port.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use octamap_core::{
    BufferUsage, GpuDevice, PixelDatatype, PixelFormat, ShaderProgramDescriptor,
    TextureDescriptor, VertexArrayDescriptor,
};
use pollster::FutureExt;

use crate::buffer;
use crate::error::{RenderError, RenderResult};
use crate::executor::{CachedPipeline, PipelineKey};
use crate::shader::{ShaderBuilder, ShaderProgram};
use crate::texture::{texture_format, GpuCubeMap, GpuTexture};

/// Vertex and index buffers with the attribute layout they are read with.
#[derive(Debug)]
pub struct GpuVertexArray {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
    pub(crate) stride: u64,
    pub(crate) attributes: Vec<wgpu::VertexAttribute>,
    pub(crate) attribute_names: Vec<(String, u32)>,
}

impl GpuVertexArray {
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// A wgpu device and queue plus the caches octamap needs to execute passes.
pub struct WgpuDevice {
    pub(crate) device: wgpu::Device,
    pub(crate) queue: wgpu::Queue,
    pub(crate) programs: Mutex<HashMap<String, Arc<ShaderProgram>>>,
    pub(crate) pipelines: Mutex<HashMap<PipelineKey, Arc<CachedPipeline>>>,
    pub(crate) filtering_sampler: wgpu::Sampler,
    pub(crate) non_filtering_sampler: wgpu::Sampler,
}

impl WgpuDevice {
    /// Wraps an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let filtering_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("octamap linear sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let non_filtering_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("octamap nearest sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            device,
            queue,
            programs: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            filtering_sampler,
            non_filtering_sampler,
        }
    }

    /// Creates a device without a surface.
    ///
    /// Requests float32 filtering when the adapter offers it.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("octamap device (headless)"),
                required_features: adapter.features() & wgpu::Features::FLOAT32_FILTERABLE,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::debug!("octamap headless device on {:?}", adapter.get_info().backend);
        Ok(Self::new(device, queue))
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Allocates an empty input cube map on this device.
    pub fn create_cube_map(
        &self,
        label: &str,
        width: u32,
        pixel_format: PixelFormat,
        pixel_datatype: PixelDatatype,
    ) -> RenderResult<Arc<GpuCubeMap>> {
        self.check_texture_size(width, width)?;
        let cube = self
            .scoped(|device| GpuCubeMap::new(device, label, width, pixel_format, pixel_datatype))
            .map_err(|e| RenderError::from_scope(&e, RenderError::TextureCreationFailed))?;
        Ok(Arc::new(cube))
    }

    pub(crate) fn is_filterable(&self, format: wgpu::TextureFormat) -> bool {
        format
            .guaranteed_format_features(self.device.features())
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE)
    }

    /// Runs `create` inside validation and out-of-memory error scopes.
    pub(crate) fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> Result<T, wgpu::Error> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create(&self.device);
        let validation = self.device.pop_error_scope().block_on();
        let out_of_memory = self.device.pop_error_scope().block_on();
        match validation.or(out_of_memory) {
            Some(error) => Err(error),
            None => Ok(value),
        }
    }

    fn check_texture_size(&self, width: u32, height: u32) -> RenderResult<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::TextureCreationFailed(format!(
                "{width}x{height} is outside 1..={max}"
            )));
        }
        Ok(())
    }
}

fn vertex_format(components: u32) -> RenderResult<wgpu::VertexFormat> {
    match components {
        1 => Ok(wgpu::VertexFormat::Float32),
        2 => Ok(wgpu::VertexFormat::Float32x2),
        3 => Ok(wgpu::VertexFormat::Float32x3),
        4 => Ok(wgpu::VertexFormat::Float32x4),
        n => Err(RenderError::BufferCreationFailed(format!(
            "unsupported attribute width {n}"
        ))),
    }
}

impl GpuDevice for WgpuDevice {
    type Buffer = wgpu::Buffer;
    type VertexArray = Arc<GpuVertexArray>;
    type ShaderProgram = Arc<ShaderProgram>;
    type Texture = Arc<GpuTexture>;
    type CubeMap = Arc<GpuCubeMap>;

    fn create_vertex_buffer(
        &self,
        label: &str,
        data: &[f32],
        usage: BufferUsage,
    ) -> octamap_core::Result<wgpu::Buffer> {
        if data.is_empty() {
            return Err(RenderError::BufferCreationFailed(format!("{label} is empty")).into());
        }
        let buffer = self
            .scoped(|device| buffer::create_vertex_buffer(device, data, usage, Some(label)))
            .map_err(|e| RenderError::from_scope(&e, RenderError::BufferCreationFailed))?;
        Ok(buffer)
    }

    fn create_index_buffer(
        &self,
        label: &str,
        data: &[u32],
        usage: BufferUsage,
    ) -> octamap_core::Result<wgpu::Buffer> {
        if data.is_empty() {
            return Err(RenderError::BufferCreationFailed(format!("{label} is empty")).into());
        }
        let buffer = self
            .scoped(|device| buffer::create_index_buffer(device, data, usage, Some(label)))
            .map_err(|e| RenderError::from_scope(&e, RenderError::BufferCreationFailed))?;
        Ok(buffer)
    }

    fn create_vertex_array(
        &self,
        descriptor: VertexArrayDescriptor<'_, wgpu::Buffer>,
    ) -> octamap_core::Result<Arc<GpuVertexArray>> {
        let attributes = descriptor
            .attributes
            .iter()
            .map(|attribute| {
                Ok(wgpu::VertexAttribute {
                    format: vertex_format(attribute.components)?,
                    offset: attribute.offset,
                    shader_location: attribute.location,
                })
            })
            .collect::<RenderResult<Vec<_>>>()?;
        let attribute_names = descriptor
            .attributes
            .iter()
            .map(|attribute| (attribute.name.to_string(), attribute.location))
            .collect();

        log::trace!(
            "{}: vertex array with {} attributes, {} indices",
            descriptor.label,
            attributes.len(),
            descriptor.index_count
        );
        Ok(Arc::new(GpuVertexArray {
            vertex_buffer: descriptor.vertex_buffer,
            index_buffer: descriptor.index_buffer,
            index_count: descriptor.index_count,
            stride: descriptor.stride,
            attributes,
            attribute_names,
        }))
    }

    fn shader_program(
        &self,
        descriptor: &ShaderProgramDescriptor<'_>,
    ) -> octamap_core::Result<Arc<ShaderProgram>> {
        let mut programs = self.programs.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(program) = programs.get(descriptor.key) {
            return Ok(Arc::clone(program));
        }

        let mut builder = ShaderBuilder::new()
            .with_vertex(descriptor.vertex_source)
            .with_fragment(descriptor.fragment_source)
            .with_label(descriptor.key);
        for attribute in descriptor.attribute_locations {
            builder = builder.with_attribute_location(attribute.name, attribute.location);
        }

        let program = self
            .scoped(|device| builder.build_program(device))
            .map_err(|e| RenderError::from_scope(&e, RenderError::ShaderCompilationFailed))??;
        log::debug!("compiled shader program '{}'", descriptor.key);

        let program = Arc::new(program);
        programs.insert(descriptor.key.to_string(), Arc::clone(&program));
        Ok(program)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> octamap_core::Result<Arc<GpuTexture>> {
        self.check_texture_size(descriptor.width, descriptor.height)?;
        let format = texture_format(descriptor.pixel_format, descriptor.pixel_datatype);
        let texture = self
            .scoped(|device| {
                GpuTexture::new(
                    device,
                    &descriptor.label,
                    descriptor.width,
                    descriptor.height,
                    format,
                )
            })
            .map_err(|e| RenderError::from_scope(&e, RenderError::TextureCreationFailed))?;
        Ok(Arc::new(texture))
    }

    fn supports_render_target(&self, format: PixelFormat, datatype: PixelDatatype) -> bool {
        let features = texture_format(format, datatype)
            .guaranteed_format_features(self.device.features());
        features.allowed_usages.contains(
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_formats() {
        assert_eq!(vertex_format(2).unwrap(), wgpu::VertexFormat::Float32x2);
        assert_eq!(vertex_format(3).unwrap(), wgpu::VertexFormat::Float32x3);
        assert!(vertex_format(5).is_err());
    }
}
