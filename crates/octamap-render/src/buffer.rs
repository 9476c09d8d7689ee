//! GPU buffer management.

use octamap_core::BufferUsage;
use wgpu::util::DeviceExt;

fn usages(base: wgpu::BufferUsages, usage: BufferUsage) -> wgpu::BufferUsages {
    match usage {
        BufferUsage::Static => base,
        BufferUsage::Dynamic => base | wgpu::BufferUsages::COPY_DST,
    }
}

/// Creates a vertex buffer from data.
pub fn create_vertex_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &[T],
    usage: BufferUsage,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: usages(wgpu::BufferUsages::VERTEX, usage),
    })
}

/// Creates an index buffer from data.
pub fn create_index_buffer(
    device: &wgpu::Device,
    data: &[u32],
    usage: BufferUsage,
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: usages(wgpu::BufferUsages::INDEX, usage),
    })
}

/// Creates a uniform buffer from data.
pub fn create_uniform_buffer<T: bytemuck::Pod>(
    device: &wgpu::Device,
    data: &[T],
    label: Option<&str>,
) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label,
        contents: bytemuck::cast_slice(data),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

/// Creates a mappable buffer that receives texture copies.
pub fn create_readback_buffer(device: &wgpu::Device, size: u64, label: Option<&str>) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label,
        size,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_buffers_are_writable() {
        let usage = usages(wgpu::BufferUsages::VERTEX, BufferUsage::Dynamic);
        assert!(usage.contains(wgpu::BufferUsages::COPY_DST));
        let usage = usages(wgpu::BufferUsages::INDEX, BufferUsage::Static);
        assert_eq!(usage, wgpu::BufferUsages::INDEX);
    }
}
